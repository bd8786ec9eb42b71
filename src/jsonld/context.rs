use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Result, ValidatorError};

/// Value coercion declared by a term's `@type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCoercion {
    /// `@id` or `@vocab`: values are IRI references written as plain strings
    Id,
    /// Values of this datatype are written as plain strings
    Datatype(String),
}

/// A single term definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermDefinition {
    pub iri: String,
    pub coercion: Option<TypeCoercion>,
}

/// Parsed `@context` object of the result context document.
///
/// Only the parts that matter for compacting flat result graphs are
/// interpreted: `@vocab`, `@base`, prefix and term definitions with optional
/// `@type` coercion. The raw value is kept for embedding in serialized
/// documents.
#[derive(Debug, Clone)]
pub struct JsonLdContext {
    raw: Value,
    vocab: Option<String>,
    base: Option<String>,
    terms: BTreeMap<String, TermDefinition>,
}

impl JsonLdContext {
    /// Reads a context document (`{"@context": {...}}`) from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ValidatorError::Config(format!("Cannot read context {}: {}", path.display(), e))
        })?;
        let document: Value = serde_json::from_str(&text)?;
        Self::from_document(&document)
    }

    /// Accepts either a full document with an `@context` key or a bare context object.
    pub fn from_document(document: &Value) -> Result<Self> {
        let context = match document.get("@context") {
            Some(context) => context,
            None => document,
        };
        let Value::Object(entries) = context else {
            return Err(ValidatorError::Config(
                "JSON-LD context must be an object".to_string(),
            ));
        };

        let mut parsed = Self {
            raw: context.clone(),
            vocab: string_entry(entries, "@vocab"),
            base: string_entry(entries, "@base"),
            terms: BTreeMap::new(),
        };

        // Plain string definitions first so prefixes are known when expanding
        // the rest; entries arrive in key order, hence the second expansion pass.
        let plain: Vec<(&String, &str)> = entries
            .iter()
            .filter(|(term, _)| !term.starts_with('@'))
            .filter_map(|(term, definition)| definition.as_str().map(|iri| (term, iri)))
            .collect();
        for (term, iri) in &plain {
            let definition = TermDefinition { iri: iri.to_string(), coercion: None };
            parsed.terms.insert(term.to_string(), definition);
        }
        for (term, iri) in &plain {
            let iri = parsed.expand(iri);
            parsed.terms.insert(term.to_string(), TermDefinition { iri, coercion: None });
        }
        for (term, definition) in entries {
            if term.starts_with('@') {
                continue;
            }
            if let Value::Object(fields) = definition {
                let iri = match fields.get("@id").and_then(Value::as_str) {
                    Some(id) => parsed.expand(id),
                    None => parsed.expand(term),
                };
                let coercion = fields.get("@type").and_then(Value::as_str).map(|t| match t {
                    "@id" | "@vocab" => TypeCoercion::Id,
                    datatype => TypeCoercion::Datatype(parsed.expand(datatype)),
                });
                parsed.terms.insert(term.clone(), TermDefinition { iri, coercion });
            }
        }

        Ok(parsed)
    }

    /// Context value as found in the document.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn vocab(&self) -> Option<&str> {
        self.vocab.as_deref()
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&String, &TermDefinition)> {
        self.terms.iter()
    }

    pub fn term(&self, term: &str) -> Option<&TermDefinition> {
        self.terms.get(term)
    }

    /// Expands a compact IRI (`prefix:suffix`) or vocabulary term to a full IRI.
    pub fn expand(&self, value: &str) -> String {
        if let Some((prefix, suffix)) = value.split_once(':') {
            if suffix.starts_with("//") {
                return value.to_string();
            }
            if let Some(definition) = self.terms.get(prefix) {
                return format!("{}{}", definition.iri, suffix);
            }
            return value.to_string();
        }
        match (&self.vocab, self.terms.get(value)) {
            (_, Some(definition)) => definition.iri.clone(),
            (Some(vocab), None) => format!("{}{}", vocab, value),
            (None, None) => value.to_string(),
        }
    }
}

fn string_entry(entries: &Map<String, Value>, key: &str) -> Option<String> {
    entries.get(key).and_then(Value::as_str).map(str::to_string)
}
