//! JSON-LD serialization of result graphs.
//!
//! Produces flat, compacted node objects: one object per subject, keys
//! compacted against the context, `rdf:type` as `@type`. A graph with a
//! single subject serializes to that node object carrying `@context`; larger
//! graphs serialize to `{"@context": ..., "@graph": [...]}`.

mod compact;
mod context;

pub use compact::ContextCompactor;
pub use context::{JsonLdContext, TermDefinition, TypeCoercion};

use oxigraph::model::vocab::{rdf, xsd};
use oxigraph::model::{Literal, NamedOrBlankNode, Term, Triple};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::model::TripleSet;

/// Serializes triple sets against one context.
#[derive(Debug, Clone)]
pub struct JsonLdSerializer {
    context: JsonLdContext,
    compactor: ContextCompactor,
}

impl JsonLdSerializer {
    pub fn new(context: JsonLdContext) -> Self {
        let compactor = ContextCompactor::new(&context);
        Self { context, compactor }
    }

    pub fn context(&self) -> &JsonLdContext {
        &self.context
    }

    /// Serializes `graph` to a JSON-LD document.
    pub fn serialize(&self, graph: &TripleSet) -> Value {
        let mut nodes = self.node_objects(graph);
        if nodes.len() == 1 {
            let mut node = nodes.remove(0);
            node.insert("@context".to_string(), self.context.raw().clone());
            return Value::Object(node);
        }
        json!({
            "@context": self.context.raw(),
            "@graph": nodes.into_iter().map(Value::Object).collect::<Vec<_>>()
        })
    }

    /// One node object per subject, in subject order.
    pub fn node_objects(&self, graph: &TripleSet) -> Vec<Map<String, Value>> {
        let mut triples: Vec<&Triple> = graph.iter().collect();
        triples.sort_by_cached_key(|triple| triple.to_string());

        // subject key → property key → values
        let mut subjects: BTreeMap<String, BTreeMap<String, Vec<Value>>> = BTreeMap::new();
        for triple in triples {
            let id = self.subject_id(&triple.subject);
            let properties = subjects.entry(id).or_default();

            if triple.predicate.as_ref() == rdf::TYPE {
                if let Some(type_iri) = node_reference(&triple.object) {
                    let value = Value::String(self.compact_type(&type_iri));
                    properties.entry("@type".to_string()).or_default().push(value);
                    continue;
                }
            }

            let key = self.compactor.compact_vocab(triple.predicate.as_str());
            let value = self.value_object(&key, &triple.object);
            properties.entry(key).or_default().push(value);
        }

        subjects
            .into_iter()
            .map(|(id, properties)| {
                let mut node = Map::new();
                node.insert("@id".to_string(), Value::String(id));
                for (key, mut values) in properties {
                    let value = if values.len() == 1 { values.remove(0) } else { Value::Array(values) };
                    node.insert(key, value);
                }
                node
            })
            .collect()
    }

    fn subject_id(&self, subject: &NamedOrBlankNode) -> String {
        match subject {
            NamedOrBlankNode::NamedNode(node) => self.compactor.compact_id(node.as_str()),
            NamedOrBlankNode::BlankNode(node) => node.to_string(),
        }
    }

    fn compact_type(&self, reference: &str) -> String {
        if reference.starts_with("_:") {
            reference.to_string()
        } else {
            self.compactor.compact_vocab(reference)
        }
    }

    fn value_object(&self, key: &str, object: &Term) -> Value {
        let coercion = self.compactor.definition(key).and_then(|term| term.coercion.as_ref());
        match object {
            Term::NamedNode(node) => match coercion {
                Some(TypeCoercion::Id) => Value::String(self.compactor.compact_id(node.as_str())),
                _ => json!({ "@id": self.compactor.compact_id(node.as_str()) }),
            },
            Term::BlankNode(node) => match coercion {
                Some(TypeCoercion::Id) => Value::String(node.to_string()),
                _ => json!({ "@id": node.to_string() }),
            },
            Term::Literal(literal) => self.literal_object(literal, coercion),
            #[allow(unreachable_patterns)]
            other => Value::String(other.to_string()),
        }
    }

    fn literal_object(&self, literal: &Literal, coercion: Option<&TypeCoercion>) -> Value {
        if let Some(language) = literal.language() {
            return json!({ "@value": literal.value(), "@language": language });
        }
        let datatype = literal.datatype();
        if datatype == xsd::STRING {
            return Value::String(literal.value().to_string());
        }
        match coercion {
            Some(TypeCoercion::Datatype(coerced)) if coerced.as_str() == datatype.as_str() => {
                Value::String(literal.value().to_string())
            }
            _ => json!({
                "@value": literal.value(),
                "@type": self.compactor.compact_vocab(datatype.as_str())
            }),
        }
    }
}

/// IRI or `_:id` of an object that refers to a node.
fn node_reference(term: &Term) -> Option<String> {
    match term {
        Term::NamedNode(node) => Some(node.as_str().to_string()),
        Term::BlankNode(node) => Some(node.to_string()),
        _ => None,
    }
}
