//! Triple sets and the graphs built from them.

use chrono::{DateTime, SecondsFormat, Utc};
use oxigraph::model::vocab::xsd;
use oxigraph::model::{Literal, NamedNode, NamedNodeRef, Triple};
use std::collections::HashSet;
use std::fmt;

/// Dublin Core `issued` property used for the issuance statement.
pub const DCTERMS_ISSUED: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://purl.org/dc/terms/issued");

/// Unordered set of statements produced by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleSet {
    triples: HashSet<Triple>,
}

impl TripleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a statement, returning `false` when it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// N-Triples lines of every statement, sorted bytewise.
    ///
    /// The order is independent of insertion order, which makes this the
    /// canonical form used for content addressing.
    pub fn sorted_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> =
            self.triples.iter().map(|triple| format!("{} .", triple)).collect();
        lines.sort_unstable();
        lines
    }

    /// Canonical N-Triples document of the set.
    pub fn to_ntriples(&self) -> String {
        let mut out = self.sorted_lines().join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

impl FromIterator<Triple> for TripleSet {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self { triples: iter.into_iter().collect() }
    }
}

impl Extend<Triple> for TripleSet {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        self.triples.extend(iter);
    }
}

impl IntoIterator for TripleSet {
    type Item = Triple;
    type IntoIter = std::collections::hash_set::IntoIter<Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}

impl<'a> IntoIterator for &'a TripleSet {
    type Item = &'a Triple;
    type IntoIter = std::collections::hash_set::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}

/// IRI naming a graph in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphIdentifier(NamedNode);

impl GraphIdentifier {
    pub fn new(iri: impl Into<String>) -> Result<Self, oxigraph::model::IriParseError> {
        NamedNode::new(iri).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_named_node(&self) -> &NamedNode {
        &self.0
    }

    /// Angle-bracket form suitable for splicing into SPARQL text.
    pub fn to_sparql(&self) -> String {
        self.0.to_string()
    }
}

impl From<NamedNode> for GraphIdentifier {
    fn from(node: NamedNode) -> Self {
        Self(node)
    }
}

impl fmt::Display for GraphIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Caller data plus one issuance statement, bound to its graph name.
///
/// This is the payload that is actually written to the store.
#[derive(Debug, Clone)]
pub struct TimestampedGraph {
    name: GraphIdentifier,
    data: TripleSet,
    issued: Triple,
}

impl TimestampedGraph {
    /// Stamps `data` with `<name> dcterms:issued "issued_at"^^xsd:dateTime`.
    pub fn issue(name: GraphIdentifier, data: TripleSet, issued_at: DateTime<Utc>) -> Self {
        let issued = Triple::new(
            name.as_named_node().clone(),
            DCTERMS_ISSUED,
            Literal::new_typed_literal(
                issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                xsd::DATE_TIME,
            ),
        );
        Self { name, data, issued }
    }

    pub fn name(&self) -> &GraphIdentifier {
        &self.name
    }

    pub fn data(&self) -> &TripleSet {
        &self.data
    }

    pub fn issued(&self) -> &Triple {
        &self.issued
    }

    /// Every persisted statement: caller data followed by the issuance statement.
    pub fn statements(&self) -> impl Iterator<Item = &Triple> {
        self.data.iter().chain(std::iter::once(&self.issued))
    }
}
