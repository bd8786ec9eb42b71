//! Extraction of RDF statements embedded in HTML.
//!
//! Documents using `itemscope` anywhere are read as Microdata, everything
//! else as RDFa. Blank nodes are numbered in document order (`_:b0`,
//! `_:b1`, ...), so parsing the same markup twice yields identical triple
//! sets and therefore identical graph names.
//!
//! In strict mode any malformed construct fails the whole parse with
//! [`ValidatorError::Parse`]. Otherwise the offending statement is dropped
//! and extraction continues.

pub mod html;
mod microdata;
mod rdfa;

use oxigraph::model::{BlankNode, Literal, NamedNode, Term, Triple};
use std::collections::HashMap;
use url::Url;

use crate::error::{Result, ValidatorError};
use crate::model::TripleSet;
use html::Document;

/// Markup dialect carrying the embedded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Rdfa,
    Microdata,
}

impl Dialect {
    pub fn detect(document: &Document) -> Self {
        if document.elements().any(|(_, element)| element.has_attr("itemscope")) {
            Dialect::Microdata
        } else {
            Dialect::Rdfa
        }
    }
}

/// Parses HTML into a [`TripleSet`].
#[derive(Debug, Clone, Default)]
pub struct EmbeddedDataParser {
    strict: bool,
    base: Option<Url>,
}

impl EmbeddedDataParser {
    pub fn new(strict: bool) -> Self {
        Self { strict, base: None }
    }

    /// Base IRI for relative references when the document has no `<base>`.
    pub fn with_base(mut self, base: &str) -> Result<Self> {
        let url = Url::parse(base)
            .map_err(|e| ValidatorError::Config(format!("Invalid base IRI {}: {}", base, e)))?;
        self.base = Some(url);
        Ok(self)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn parse(&self, html: &str) -> Result<TripleSet> {
        let document = Document::parse(html);
        let dialect = Dialect::detect(&document);
        let mut extraction = Extraction::new(self.strict, self.document_base(&document)?);

        match dialect {
            Dialect::Microdata => microdata::extract(&document, &mut extraction)?,
            Dialect::Rdfa => rdfa::extract(&document, &mut extraction)?,
        }
        log::debug!("extracted {} statements as {:?}", extraction.triples.len(), dialect);
        Ok(extraction.triples)
    }

    fn document_base(&self, document: &Document) -> Result<Option<Url>> {
        let Some(href) = document.base_href() else {
            return Ok(self.base.clone());
        };
        let resolved = match &self.base {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        match resolved {
            Ok(url) => Ok(Some(url)),
            Err(e) if self.strict => {
                Err(ValidatorError::Parse(format!("Invalid <base> href {}: {}", href, e)))
            }
            Err(e) => {
                log::debug!("ignoring invalid <base> href {}: {}", href, e);
                Ok(self.base.clone())
            }
        }
    }
}

/// Subject or object node produced during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Resource {
    Named(NamedNode),
    Blank(BlankNode),
}

impl From<Resource> for Term {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Named(node) => node.into(),
            Resource::Blank(node) => node.into(),
        }
    }
}

/// State shared by one extraction pass.
pub(crate) struct Extraction {
    strict: bool,
    base: Option<Url>,
    triples: TripleSet,
    next_blank: usize,
    labels: HashMap<String, Resource>,
}

impl Extraction {
    fn new(strict: bool, base: Option<Url>) -> Self {
        Self { strict, base, triples: TripleSet::new(), next_blank: 0, labels: HashMap::new() }
    }

    pub(crate) fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    pub(crate) fn blank(&mut self) -> Resource {
        let node = BlankNode::new_unchecked(format!("b{}", self.next_blank));
        self.next_blank += 1;
        Resource::Blank(node)
    }

    /// Same fresh node for every use of a document blank node label.
    pub(crate) fn labelled_blank(&mut self, label: &str) -> Resource {
        if let Some(node) = self.labels.get(label) {
            return node.clone();
        }
        let node = self.blank();
        self.labels.insert(label.to_string(), node.clone());
        node
    }

    /// Fails in strict mode, otherwise logs and lets the caller skip.
    pub(crate) fn malformed(&self, message: String) -> Result<()> {
        if self.strict {
            return Err(ValidatorError::Parse(message));
        }
        log::debug!("skipping malformed embedded data: {}", message);
        Ok(())
    }

    /// Resolves `reference` against the base; `None` when it was skipped.
    pub(crate) fn resolve(&self, reference: &str) -> Result<Option<NamedNode>> {
        let reference = reference.trim();
        let resolved = match &self.base {
            Some(base) => base.join(reference),
            None => Url::parse(reference),
        };
        match resolved.ok().and_then(|url| NamedNode::new(String::from(url)).ok()) {
            Some(node) => Ok(Some(node)),
            None => {
                self.malformed(format!("Cannot resolve IRI reference {:?}", reference))?;
                Ok(None)
            }
        }
    }

    /// Builds a literal, falling back to a plain one for bad language tags.
    pub(crate) fn literal(
        &self,
        value: &str,
        datatype: Option<NamedNode>,
        language: Option<&str>,
    ) -> Result<Literal> {
        if let Some(datatype) = datatype {
            return Ok(Literal::new_typed_literal(value, datatype));
        }
        match language.filter(|lang| !lang.is_empty()) {
            Some(lang) => match Literal::new_language_tagged_literal(value, lang) {
                Ok(literal) => Ok(literal),
                Err(e) => {
                    self.malformed(format!("Invalid language tag {:?}: {}", lang, e))?;
                    Ok(Literal::new_simple_literal(value))
                }
            },
            None => Ok(Literal::new_simple_literal(value)),
        }
    }

    pub(crate) fn emit(&mut self, subject: &Resource, predicate: NamedNode, object: impl Into<Term>) {
        let triple = match subject {
            Resource::Named(node) => Triple::new(node.clone(), predicate, object),
            Resource::Blank(node) => Triple::new(node.clone(), predicate, object),
        };
        self.triples.insert(triple);
    }
}

/// True for values that parse as an absolute IRI.
pub(crate) fn is_absolute_iri(value: &str) -> bool {
    Url::parse(value).is_ok() && NamedNode::new(value).is_ok()
}
