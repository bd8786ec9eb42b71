//! # Structured Data Validator
//!
//! Validates RDFa and Microdata embedded in HTML against a catalog of SPARQL
//! rules evaluated by a triple store.
//!
//! A validation run names the extracted statements after their content,
//! loads them as a temporary named graph, runs every rule against that graph
//! and removes the graph again, whatever the outcome. Triples produced by a
//! rule are findings; they are returned as compacted JSON-LD objects.
//!
//! ## Example
//!
//! ```rust
//! use sd_validator::model::TripleSet;
//! use sd_validator::naming::GraphNamer;
//! use sd_validator::Result;
//!
//! fn example() -> Result<()> {
//!     let namer = GraphNamer::new("http://validator.example.org/graph/")?;
//!     let name = namer.name(&TripleSet::new());
//!     assert!(name.as_str().starts_with("http://validator.example.org/graph/"));
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]

/// SPARQL rule files and placeholder substitution
pub mod catalog;

pub mod config;

pub mod error;

/// Rule results as report objects
pub mod format;

pub mod jsonld;

/// Triple sets, graph identifiers and timestamped graphs
pub mod model;

pub mod naming;

/// RDFa and Microdata extraction
pub mod parsing;

pub mod store;

pub mod validator;

pub use config::ValidatorConfig;
pub use error::{Result, StoreError, ValidatorError};
pub use model::{GraphIdentifier, TimestampedGraph, TripleSet};
pub use parsing::EmbeddedDataParser;
pub use store::StoreClient;
pub use validator::{ValidationOrchestrator, ValidationReport};
