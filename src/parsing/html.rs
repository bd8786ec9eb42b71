//! Element tree built by the html5ever tree builder.
//!
//! The parser runs the full HTML5 tree construction algorithm (implicit
//! closes, foster parenting, raw text elements) against a small arena sink.
//! Once parsing finishes the arena is flattened into a [`Document`] that
//! keeps only what attribute-driven extraction needs: element names,
//! attributes, text and nesting. Template contents are not part of the
//! flattened tree.

use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{parse_document, Attribute, ExpandedName, LocalName, Namespace, ParseOpts, QualName};
use std::borrow::Cow;
use std::collections::HashMap;

/// Index of an element inside its [`Document`]. Indices follow document order.
pub type ElementId = usize;

#[derive(Debug, Clone)]
pub enum Child {
    Element(ElementId),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub parent: Option<ElementId>,
    pub children: Vec<Child>,
}

impl Element {
    fn new(name: String, attrs: Vec<(String, String)>, parent: Option<ElementId>) -> Self {
        Self { name, attrs, parent, children: Vec::new() }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.children.iter().filter_map(|child| match child {
            Child::Element(id) => Some(*id),
            Child::Text(_) => None,
        })
    }
}

/// Parsed HTML document. Element 0 is a synthetic root.
#[derive(Debug, Clone)]
pub struct Document {
    elements: Vec<Element>,
    ids: HashMap<String, ElementId>,
}

impl Document {
    pub const ROOT: ElementId = 0;

    pub fn parse(html: &str) -> Self {
        parse_document(TreeArena::new(), ParseOpts::default()).one(html)
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id]
    }

    /// Every real element in document order.
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.elements.iter().enumerate().skip(1)
    }

    /// Element carrying the `id` attribute `id`; the first one wins.
    pub fn by_id(&self, id: &str) -> Option<ElementId> {
        self.ids.get(id).copied()
    }

    /// Concatenated text of the element and its descendants.
    pub fn text_content(&self, id: ElementId) -> String {
        let mut text = String::new();
        let mut pending: Vec<&Child> = self.elements[id].children.iter().rev().collect();
        while let Some(child) = pending.pop() {
            match child {
                Child::Text(value) => text.push_str(value),
                Child::Element(child) => pending.extend(self.elements[*child].children.iter().rev()),
            }
        }
        text
    }

    /// Nearest value of `attr` on the element or one of its ancestors.
    pub fn inherited_attr(&self, id: ElementId, attr: &str) -> Option<&str> {
        let mut current = Some(id);
        while let Some(element_id) = current {
            let element = &self.elements[element_id];
            if let Some(value) = element.attr(attr) {
                return Some(value);
            }
            current = element.parent;
        }
        None
    }

    /// `href` of the first `<base>` element.
    pub fn base_href(&self) -> Option<&str> {
        self.elements()
            .find(|(_, element)| element.name == "base" && element.has_attr("href"))
            .and_then(|(_, element)| element.attr("href"))
    }
}

type NodeId = usize;

#[derive(Debug)]
enum NodeData {
    Document,
    Element { name: QualName, attrs: Vec<Attribute> },
    Text(String),
    Other,
}

#[derive(Debug)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Mutable node arena the tree builder works against.
struct TreeArena {
    nodes: Vec<Node>,
    templates: HashMap<NodeId, NodeId>,
    unnamed: QualName,
}

impl TreeArena {
    const DOCUMENT: NodeId = 0;

    fn new() -> Self {
        Self {
            nodes: vec![Node { data: NodeData::Document, parent: None, children: Vec::new() }],
            templates: HashMap::new(),
            unnamed: QualName::new(None, Namespace::from(""), LocalName::from("#node")),
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node { data, parent: None, children: Vec::new() });
        self.nodes.len() - 1
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node].parent.take() {
            self.nodes[parent].children.retain(|child| *child != node);
        }
    }

    /// Inserts `child` under `parent` at `index`, merging adjacent text.
    fn insert(&mut self, parent: NodeId, index: usize, child: NodeOrText<NodeId>) {
        match child {
            NodeOrText::AppendText(text) => {
                if let Some(previous) = index.checked_sub(1).map(|i| self.nodes[parent].children[i]) {
                    if let NodeData::Text(existing) = &mut self.nodes[previous].data {
                        existing.push_str(&text);
                        return;
                    }
                }
                let node = self.push(NodeData::Text(text.to_string()));
                self.nodes[node].parent = Some(parent);
                self.nodes[parent].children.insert(index, node);
            }
            NodeOrText::AppendNode(node) => {
                self.detach(node);
                let index = index.min(self.nodes[parent].children.len());
                self.nodes[node].parent = Some(parent);
                self.nodes[parent].children.insert(index, node);
            }
        }
    }

    /// Flattens the arena into document order without recursion.
    fn into_document(self) -> Document {
        let mut elements = vec![Element::new("#document".to_string(), Vec::new(), None)];
        let mut pending: Vec<(NodeId, ElementId)> = self.nodes[Self::DOCUMENT]
            .children
            .iter()
            .rev()
            .map(|child| (*child, Document::ROOT))
            .collect();

        while let Some((node, parent)) = pending.pop() {
            match &self.nodes[node].data {
                NodeData::Element { name, attrs } => {
                    let id = elements.len();
                    let attrs = attrs
                        .iter()
                        .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                        .collect();
                    elements.push(Element::new(name.local.to_string(), attrs, Some(parent)));
                    elements[parent].children.push(Child::Element(id));
                    pending.extend(self.nodes[node].children.iter().rev().map(|child| (*child, id)));
                }
                NodeData::Text(text) => match elements[parent].children.last_mut() {
                    Some(Child::Text(existing)) => existing.push_str(text),
                    _ => elements[parent].children.push(Child::Text(text.clone())),
                },
                NodeData::Document | NodeData::Other => {}
            }
        }

        let mut ids = HashMap::new();
        for (index, element) in elements.iter().enumerate() {
            if let Some(id) = element.attr("id") {
                ids.entry(id.to_string()).or_insert(index);
            }
        }
        Document { elements, ids }
    }
}

impl TreeSink for TreeArena {
    type Handle = NodeId;
    type Output = Document;

    fn finish(self) -> Document {
        self.into_document()
    }

    fn parse_error(&mut self, msg: Cow<'static, str>) {
        log::trace!("html parse error: {}", msg);
    }

    fn get_document(&mut self) -> NodeId {
        Self::DOCUMENT
    }

    fn elem_name<'a>(&'a self, target: &'a NodeId) -> ExpandedName<'a> {
        match &self.nodes[*target].data {
            NodeData::Element { name, .. } => name.expanded(),
            _ => self.unnamed.expanded(),
        }
    }

    fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>, flags: ElementFlags) -> NodeId {
        let element = self.push(NodeData::Element { name, attrs });
        if flags.template {
            let contents = self.push(NodeData::Document);
            self.templates.insert(element, contents);
        }
        element
    }

    fn create_comment(&mut self, _text: StrTendril) -> NodeId {
        self.push(NodeData::Other)
    }

    fn create_pi(&mut self, _target: StrTendril, _data: StrTendril) -> NodeId {
        self.push(NodeData::Other)
    }

    fn append(&mut self, parent: &NodeId, child: NodeOrText<NodeId>) {
        let index = self.nodes[*parent].children.len();
        self.insert(*parent, index, child);
    }

    fn append_based_on_parent_node(
        &mut self,
        element: &NodeId,
        prev_element: &NodeId,
        child: NodeOrText<NodeId>,
    ) {
        if self.nodes[*element].parent.is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(&mut self, _name: StrTendril, _public_id: StrTendril, _system_id: StrTendril) {}

    fn get_template_contents(&mut self, target: &NodeId) -> NodeId {
        self.templates.get(target).copied().unwrap_or(*target)
    }

    fn same_node(&self, x: &NodeId, y: &NodeId) -> bool {
        x == y
    }

    fn set_quirks_mode(&mut self, _mode: QuirksMode) {}

    fn append_before_sibling(&mut self, sibling: &NodeId, new_node: NodeOrText<NodeId>) {
        if let NodeOrText::AppendNode(node) = &new_node {
            self.detach(*node);
        }
        let Some(parent) = self.nodes[*sibling].parent else {
            return;
        };
        let index = self.nodes[parent].children.iter().position(|child| child == sibling).unwrap_or(0);
        self.insert(parent, index, new_node);
    }

    fn add_attrs_if_missing(&mut self, target: &NodeId, attrs: Vec<Attribute>) {
        if let NodeData::Element { attrs: existing, .. } = &mut self.nodes[*target].data {
            for attr in attrs {
                if !existing.iter().any(|present| present.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&mut self, target: &NodeId) {
        self.detach(*target);
    }

    fn reparent_children(&mut self, node: &NodeId, new_parent: &NodeId) {
        let children = std::mem::take(&mut self.nodes[*node].children);
        for child in &children {
            self.nodes[*child].parent = Some(*new_parent);
        }
        self.nodes[*new_parent].children.extend(children);
    }
}
