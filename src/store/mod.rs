//! Triple-store clients.
//!
//! The validator talks to a store through [`StoreClient`]: insert a named
//! graph, run a graph query, clear a named graph. [`HttpStoreClient`] speaks
//! the SPARQL 1.1 protocol to a remote store; [`MemoryStoreClient`] runs the
//! same operations against an in-process Oxigraph store.

pub mod http;
pub mod memory;

use crate::error::StoreError;
use crate::model::{GraphIdentifier, TimestampedGraph, TripleSet};

pub use http::{HttpStoreClient, SparqlEndpoints, UpdateProtocol};
pub use memory::MemoryStoreClient;

/// Query and update operations against a triple store.
pub trait StoreClient {
    /// Stores every statement of `graph` under its name.
    fn insert(&self, graph: &TimestampedGraph) -> Result<(), StoreError>;

    /// Executes a graph query (CONSTRUCT or DESCRIBE) and returns its statements.
    fn query(&self, query: &str) -> Result<TripleSet, StoreError>;

    /// Deletes every statement of the named graph. Clearing a missing graph succeeds.
    fn clear(&self, name: &GraphIdentifier) -> Result<(), StoreError>;
}

impl<S: StoreClient + ?Sized> StoreClient for &S {
    fn insert(&self, graph: &TimestampedGraph) -> Result<(), StoreError> {
        (**self).insert(graph)
    }

    fn query(&self, query: &str) -> Result<TripleSet, StoreError> {
        (**self).query(query)
    }

    fn clear(&self, name: &GraphIdentifier) -> Result<(), StoreError> {
        (**self).clear(name)
    }
}

/// `INSERT DATA` update writing `graph` into its named graph.
pub fn insert_data_update(graph: &TimestampedGraph) -> String {
    let mut update = format!("INSERT DATA {{\n  GRAPH {} {{\n", graph.name().to_sparql());
    for triple in graph.statements() {
        update.push_str("    ");
        update.push_str(&triple.to_string());
        update.push_str(" .\n");
    }
    update.push_str("  }\n}");
    update
}

/// Idempotent `CLEAR` update for the named graph.
pub fn clear_graph_update(name: &GraphIdentifier) -> String {
    format!("CLEAR SILENT GRAPH {}", name.to_sparql())
}
