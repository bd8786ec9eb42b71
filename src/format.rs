//! Normalizes rule results into report objects.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::jsonld::JsonLdSerializer;
use crate::model::TripleSet;

/// Properties stripped from every report object by default.
pub const DEFAULT_IGNORED_PROPERTIES: &[&str] = &["@id"];

/// File name of the public context under the application root.
pub const PUBLIC_CONTEXT_FILE: &str = "context.jsonld";

/// Converts a result graph into a list of JSON-LD objects.
///
/// Each object has its ignored properties removed and its `@context`
/// replaced by the public context URI, so callers receive a dereferenceable
/// reference rather than the full context document.
#[derive(Debug, Clone)]
pub struct ResultFormatter {
    serializer: Arc<JsonLdSerializer>,
    public_context: String,
    ignored: BTreeSet<String>,
}

impl ResultFormatter {
    /// `base_uri` is the application root; the public context lives at
    /// `<base_uri>context.jsonld`.
    pub fn new(serializer: Arc<JsonLdSerializer>, base_uri: &str) -> Self {
        let base = if base_uri.ends_with('/') {
            base_uri.to_string()
        } else {
            format!("{}/", base_uri)
        };
        Self {
            serializer,
            public_context: format!("{}{}", base, PUBLIC_CONTEXT_FILE),
            ignored: DEFAULT_IGNORED_PROPERTIES.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Replaces the ignored property set.
    pub fn with_ignored_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn public_context(&self) -> &str {
        &self.public_context
    }

    pub fn ignored_properties(&self) -> impl Iterator<Item = &str> {
        self.ignored.iter().map(String::as_str)
    }

    pub fn format(&self, graph: &TripleSet) -> Vec<Map<String, Value>> {
        if graph.is_empty() {
            return Vec::new();
        }
        normalize(self.serializer.serialize(graph))
            .into_iter()
            .map(|mut item| {
                item.retain(|key, _| !self.ignored.contains(key));
                item.insert("@context".to_string(), Value::String(self.public_context.clone()));
                item
            })
            .collect()
    }
}

/// Flattens either serialization shape to a list of objects.
fn normalize(document: Value) -> Vec<Map<String, Value>> {
    match document {
        Value::Object(mut map) => match map.remove("@graph") {
            Some(Value::Array(items)) => items.into_iter().filter_map(into_object).collect(),
            Some(Value::Object(item)) => vec![item],
            Some(other) => {
                map.insert("@graph".to_string(), other);
                vec![map]
            }
            None => vec![map],
        },
        Value::Array(items) => items.into_iter().filter_map(into_object).collect(),
        _ => Vec::new(),
    }
}

fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonld::JsonLdContext;
    use oxigraph::model::vocab::rdf;
    use oxigraph::model::{BlankNode, Literal, NamedNode, Triple};
    use serde_json::json;

    fn formatter() -> ResultFormatter {
        let context = JsonLdContext::from_document(&json!({
            "@context": {"@vocab": "http://validator.example.org/vocab#"}
        }))
        .unwrap();
        ResultFormatter::new(Arc::new(JsonLdSerializer::new(context)), "http://validator.example.org")
    }

    fn error_node(id: &str, message: &str) -> Vec<Triple> {
        vec![
            Triple::new(
                BlankNode::new_unchecked(id),
                rdf::TYPE,
                NamedNode::new_unchecked("http://validator.example.org/vocab#Error"),
            ),
            Triple::new(
                BlankNode::new_unchecked(id),
                NamedNode::new_unchecked("http://validator.example.org/vocab#message"),
                Literal::new_simple_literal(message),
            ),
        ]
    }

    #[test]
    fn test_single_object_becomes_one_element_list() {
        let graph: TripleSet = error_node("e1", "Missing name").into_iter().collect();
        let items = formatter().format(&graph);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["message"], "Missing name");
        assert_eq!(items[0]["@context"], "http://validator.example.org/context.jsonld");
        assert!(!items[0].contains_key("@id"));
    }

    #[test]
    fn test_graph_array_is_flattened() {
        let mut triples = error_node("e1", "Missing name");
        triples.extend(error_node("e2", "Missing price"));
        let graph: TripleSet = triples.into_iter().collect();
        let items = formatter().format(&graph);

        assert_eq!(items.len(), 2);
        for item in &items {
            assert!(!item.contains_key("@id"));
            assert_eq!(item["@context"], "http://validator.example.org/context.jsonld");
        }
    }

    #[test]
    fn test_custom_ignored_properties() {
        let graph: TripleSet = error_node("e1", "Missing name").into_iter().collect();
        let items = formatter().with_ignored_properties(["@id", "@type"]).format(&graph);

        assert!(!items[0].contains_key("@type"));
        assert!(items[0].contains_key("message"));
    }

    #[test]
    fn test_empty_graph_formats_to_empty_list() {
        assert!(formatter().format(&TripleSet::new()).is_empty());
    }

    #[test]
    fn test_normalize_shapes() {
        assert_eq!(normalize(json!({"a": 1})).len(), 1);
        assert_eq!(normalize(json!({"@graph": [{"a": 1}, {"b": 2}, 3]})).len(), 2);
        assert_eq!(normalize(json!({"@graph": {"a": 1}})).len(), 1);
        assert!(normalize(json!("scalar")).is_empty());
    }
}
