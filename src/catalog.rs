//! Validation rules and the graph placeholder substitution.
//!
//! A rule is a SPARQL graph query stored in its own file. Wherever the rule
//! text contains the placeholder `?validatedGraph` (matched
//! case-insensitively), the IRI of the graph under validation is spliced in
//! as `<iri>` before the query is sent to the store. A non-empty result means
//! the rule found a violation.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ValidatorError};
use crate::model::GraphIdentifier;

/// Placeholder standing for the graph under validation.
pub const GRAPH_PLACEHOLDER: &str = "?validatedGraph";

fn placeholder_regex() -> Result<Regex> {
    Regex::new(r"(?i)\?validatedGraph\b").map_err(|e| ValidatorError::Config(e.to_string()))
}

/// One query template of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRule {
    name: String,
    template: String,
    /// Template text split at each placeholder occurrence.
    segments: Vec<String>,
}

impl ValidationRule {
    /// Builds a rule, rejecting templates whose placeholder sits inside a
    /// string literal or a comment, where substitution would corrupt the query.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let template = template.into();
        let placeholder = placeholder_regex()?;

        for found in placeholder.find_iter(&template) {
            if let Some(context) = quoted_context(&template, found.start()) {
                return Err(ValidatorError::Config(format!(
                    "rule {} has placeholder {} inside a {}",
                    name,
                    found.as_str(),
                    context
                )));
            }
        }
        let segments: Vec<String> = placeholder.split(&template).map(str::to_string).collect();
        if segments.len() == 1 {
            log::warn!("rule {} does not reference {}", name, GRAPH_PLACEHOLDER);
        }

        Ok(Self { name, template, segments })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Query text with every placeholder replaced by `<graph>`.
    pub fn bind(&self, graph: &GraphIdentifier) -> String {
        self.segments.join(&graph.to_sparql())
    }
}

/// Returns the kind of lexical region enclosing byte offset `at`, if it is
/// a string literal or a comment.
fn quoted_context(text: &str, at: usize) -> Option<&'static str> {
    let mut chars = text.char_indices().peekable();
    let mut in_iri = false;

    while let Some((idx, c)) = chars.next() {
        if idx >= at {
            return None;
        }
        match c {
            '<' if !in_iri => {
                // `<` opens an IRI only when it is not a comparison operator
                in_iri = matches!(chars.peek(), Some((_, next)) if !next.is_whitespace() && *next != '=');
            }
            '>' if in_iri => in_iri = false,
            '#' if !in_iri => {
                let end = text[idx..].find('\n').map_or(text.len(), |offset| idx + offset);
                if at < end {
                    return Some("comment");
                }
                while matches!(chars.peek(), Some((next, _)) if *next < end) {
                    chars.next();
                }
            }
            '"' | '\'' if !in_iri => {
                let long = text[idx..].starts_with(&format!("{c}{c}{c}"));
                let end = if long {
                    let delimiter = format!("{c}{c}{c}");
                    text[idx + 3..].find(&delimiter).map(|offset| idx + 3 + offset + 3)
                } else {
                    closing_quote(text, idx, c)
                }
                .unwrap_or(text.len());
                if at < end {
                    return Some("string literal");
                }
                while matches!(chars.peek(), Some((next, _)) if *next < end) {
                    chars.next();
                }
            }
            _ => {}
        }
    }
    None
}

fn closing_quote(text: &str, open: usize, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (offset, c) in text[open + 1..].char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            c if c == quote && !escaped => return Some(open + 1 + offset + 1),
            '\n' => return Some(open + 1 + offset),
            _ => escaped = false,
        }
    }
    None
}

/// Fixed set of rules loaded once from a directory.
#[derive(Debug, Clone, Default)]
pub struct TestCatalog {
    rules: Vec<ValidationRule>,
}

impl TestCatalog {
    /// Loads every regular, non-hidden file of `dir` as one rule.
    ///
    /// Rules are ordered by file name so runs are reproducible.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ValidatorError::Config(format!(
                "Invalid path to test directory: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if entry.file_type()?.is_file() && !hidden {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut rules = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let template = fs::read_to_string(&path)?;
            rules.push(ValidationRule::new(name, template)?);
        }

        log::debug!("loaded {} validation rules from {}", rules.len(), dir.display());
        Ok(Self { rules })
    }

    pub fn from_rules(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
