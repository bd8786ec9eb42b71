use std::collections::HashMap;

use super::context::{JsonLdContext, TermDefinition};

/// A precomputed lookup table for IRI compaction.
///
/// Namespace IRIs are sorted longest-first so the most specific prefix
/// wins. Build once per context, then call [`compact_vocab`] or
/// [`compact_id`] for each IRI.
///
/// [`compact_vocab`]: ContextCompactor::compact_vocab
/// [`compact_id`]: ContextCompactor::compact_id
#[derive(Debug, Clone)]
pub struct ContextCompactor {
    /// Full IRI → term with that exact IRI
    exact: HashMap<String, String>,
    /// Namespace IRIs (ending in `/` or `#`) paired with their prefix, longest first
    prefixes: Vec<(String, String)>,
    vocab: Option<String>,
    terms: HashMap<String, TermDefinition>,
}

impl ContextCompactor {
    pub fn new(context: &JsonLdContext) -> Self {
        let mut exact = HashMap::new();
        let mut prefixes = Vec::new();
        let mut terms = HashMap::new();

        // Terms iterate in name order, so the first term claiming an IRI wins.
        for (term, definition) in context.terms() {
            if definition.iri.ends_with('/') || definition.iri.ends_with('#') {
                prefixes.push((definition.iri.clone(), term.clone()));
            } else {
                exact.entry(definition.iri.clone()).or_insert_with(|| term.clone());
            }
            terms.insert(term.clone(), definition.clone());
        }
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.1.cmp(&b.1)));

        Self { exact, prefixes, vocab: context.vocab().map(str::to_string), terms }
    }

    /// Compact an IRI in a vocabulary position (property names, `@type` values).
    ///
    /// Tries an exact term, then the longest prefix, then `@vocab`.
    pub fn compact_vocab(&self, iri: &str) -> String {
        if let Some(term) = self.exact.get(iri) {
            return term.clone();
        }
        if let Some(compacted) = self.compact_with_prefix(iri) {
            return compacted;
        }
        if let Some(vocab) = &self.vocab {
            if let Some(suffix) = iri.strip_prefix(vocab.as_str()) {
                if !suffix.is_empty() && !suffix.contains(':') && !self.terms.contains_key(suffix) {
                    return suffix.to_string();
                }
            }
        }
        iri.to_string()
    }

    /// Compact an IRI in an `@id` position. `@vocab` never shortens identifiers.
    pub fn compact_id(&self, iri: &str) -> String {
        self.compact_with_prefix(iri).unwrap_or_else(|| iri.to_string())
    }

    /// Definition of the term a compacted key refers to, if it is a defined term.
    pub fn definition(&self, key: &str) -> Option<&TermDefinition> {
        self.terms.get(key)
    }

    fn compact_with_prefix(&self, iri: &str) -> Option<String> {
        self.prefixes.iter().find_map(|(prefix_iri, prefix)| {
            iri.strip_prefix(prefix_iri.as_str())
                .filter(|suffix| !suffix.is_empty())
                .map(|suffix| format!("{}:{}", prefix, suffix))
        })
    }
}
