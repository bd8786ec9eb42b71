//! Content-addressed graph names.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::model::{GraphIdentifier, TripleSet};

/// Derives graph identifiers from the content of a triple set.
///
/// The name is `namespace + hex(sha256(canonical N-Triples))`, so the same
/// statements always map to the same graph regardless of order.
#[derive(Debug, Clone)]
pub struct GraphNamer {
    namespace: String,
}

impl GraphNamer {
    /// Creates a namer minting identifiers under `namespace`.
    ///
    /// Fails when `namespace` followed by a digest is not a valid IRI.
    pub fn new(namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        GraphIdentifier::new(format!("{}{}", namespace, "0".repeat(64)))?;
        Ok(Self { namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Hex encoded digest of the canonical serialization of `triples`.
    pub fn digest(&self, triples: &TripleSet) -> String {
        let mut hasher = Sha256::new();
        for line in triples.sorted_lines() {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    pub fn name(&self, triples: &TripleSet) -> GraphIdentifier {
        let iri = format!("{}{}", self.namespace, self.digest(triples));
        // The namespace was validated with a digest-shaped suffix in `new`.
        GraphIdentifier::from(oxigraph::model::NamedNode::new_unchecked(iri))
    }
}
