//! Microdata to RDF.

use oxigraph::model::vocab::rdf;
use oxigraph::model::{NamedNode, Term};
use std::collections::{BTreeSet, HashMap};

use super::html::{Document, ElementId};
use super::{is_absolute_iri, Extraction, Resource};
use crate::error::Result;

/// Deepest chain of nested items that is still extracted.
const MAX_ITEM_DEPTH: usize = 128;

pub(super) fn extract(document: &Document, extraction: &mut Extraction) -> Result<()> {
    let mut items = HashMap::new();
    for (id, element) in document.elements() {
        if element.has_attr("itemscope") && !element.has_attr("itemprop") {
            item(document, id, 0, extraction, &mut items)?;
        }
    }
    Ok(())
}

/// Emits the statements of the item rooted at `id` and returns its subject.
fn item(
    document: &Document,
    id: ElementId,
    depth: usize,
    extraction: &mut Extraction,
    items: &mut HashMap<ElementId, Resource>,
) -> Result<Resource> {
    if let Some(subject) = items.get(&id) {
        return Ok(subject.clone());
    }
    let element = document.element(id);

    let subject = match element.attr("itemid") {
        Some(itemid) => match extraction.resolve(itemid)? {
            Some(node) => Resource::Named(node),
            None => extraction.blank(),
        },
        None => extraction.blank(),
    };
    items.insert(id, subject.clone());

    let mut vocabulary = None;
    for item_type in element.attr("itemtype").unwrap_or_default().split_whitespace() {
        if !is_absolute_iri(item_type) {
            extraction.malformed(format!("itemtype {:?} is not an absolute IRI", item_type))?;
            continue;
        }
        if vocabulary.is_none() {
            vocabulary = Some(vocabulary_of(item_type));
        }
        extraction.emit(&subject, rdf::TYPE.into_owned(), NamedNode::new_unchecked(item_type));
    }

    for property in properties(document, id) {
        let Some(value) = property_value(document, property, depth, extraction, items)? else {
            continue;
        };
        let names = document.element(property).attr("itemprop").unwrap_or_default();
        for name in names.split_whitespace() {
            if let Some(predicate) = predicate(name, vocabulary.as_deref(), extraction)? {
                extraction.emit(&subject, predicate, value.clone());
            }
        }
    }
    Ok(subject)
}

/// Types share the namespace of the first one, up to its last `#` or `/`.
fn vocabulary_of(item_type: &str) -> String {
    match item_type.rfind(['#', '/']) {
        Some(position) => item_type[..=position].to_string(),
        None => item_type.to_string(),
    }
}

fn predicate(name: &str, vocabulary: Option<&str>, extraction: &Extraction) -> Result<Option<NamedNode>> {
    if is_absolute_iri(name) {
        return Ok(Some(NamedNode::new_unchecked(name)));
    }
    match vocabulary {
        Some(vocabulary) => match NamedNode::new(format!("{}{}", vocabulary, name)) {
            Ok(node) => Ok(Some(node)),
            Err(e) => {
                extraction.malformed(format!("Invalid property name {:?}: {}", name, e))?;
                Ok(None)
            }
        },
        None => {
            extraction.malformed(format!("Property {:?} belongs to an item without itemtype", name))?;
            Ok(None)
        }
    }
}

/// Elements carrying properties of the item rooted at `root`, in document order.
fn properties(document: &Document, root: ElementId) -> BTreeSet<ElementId> {
    let element = document.element(root);
    let mut pending: Vec<ElementId> = element.child_elements().collect();
    for reference in element.attr("itemref").unwrap_or_default().split_whitespace() {
        if let Some(id) = document.by_id(reference) {
            pending.push(id);
        }
    }

    let mut found = BTreeSet::new();
    let mut visited = BTreeSet::new();
    while let Some(candidate) = pending.pop() {
        if candidate == root || !visited.insert(candidate) {
            continue;
        }
        let element = document.element(candidate);
        if element.has_attr("itemprop") {
            found.insert(candidate);
        }
        if !element.has_attr("itemscope") {
            pending.extend(element.child_elements());
        }
    }
    found
}

fn property_value(
    document: &Document,
    id: ElementId,
    depth: usize,
    extraction: &mut Extraction,
    items: &mut HashMap<ElementId, Resource>,
) -> Result<Option<Term>> {
    let element = document.element(id);
    if element.has_attr("itemscope") {
        if depth + 1 >= MAX_ITEM_DEPTH && !items.contains_key(&id) {
            extraction.malformed(format!("Items nested deeper than {} levels", MAX_ITEM_DEPTH))?;
            return Ok(None);
        }
        return Ok(Some(item(document, id, depth + 1, extraction, items)?.into()));
    }

    let url_attr = match element.name.as_str() {
        "a" | "area" | "link" => Some("href"),
        "audio" | "embed" | "iframe" | "img" | "source" | "track" | "video" => Some("src"),
        "object" => Some("data"),
        _ => None,
    };
    if let Some(attr) = url_attr {
        let Some(reference) = element.attr(attr) else {
            extraction.malformed(format!("<{}> property without {}", element.name, attr))?;
            return Ok(None);
        };
        return Ok(extraction.resolve(reference)?.map(Term::from));
    }

    let text = match element.name.as_str() {
        "meta" => element.attr("content").unwrap_or_default().to_string(),
        "data" | "meter" => element.attr("value").unwrap_or_default().to_string(),
        "time" => match element.attr("datetime") {
            Some(datetime) => datetime.to_string(),
            None => document.text_content(id),
        },
        _ => document.text_content(id),
    };
    let language = document.inherited_attr(id, "lang");
    Ok(Some(extraction.literal(&text, None, language)?.into()))
}
