//! In-process store client backed by Oxigraph.
//!
//! Evaluates the same operations as [`super::HttpStoreClient`] without a
//! network round trip. Used for local runs and for exercising the
//! validation pipeline in tests.
//!
//! # Example
//!
//! ```
//! use sd_validator::store::{MemoryStoreClient, StoreClient};
//!
//! let store = MemoryStoreClient::new().unwrap();
//! let triples = store.query("CONSTRUCT WHERE { ?s ?p ?o }").unwrap();
//! assert!(triples.is_empty());
//! ```

use oxigraph::model::{GraphNameRef, Quad};
use oxigraph::sparql::{QueryResults, SparqlEvaluator};
use oxigraph::store::Store;

use super::StoreClient;
use crate::error::StoreError;
use crate::model::{GraphIdentifier, TimestampedGraph, TripleSet};

pub struct MemoryStoreClient {
    store: Store,
}

impl MemoryStoreClient {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self { store: Store::new()? })
    }

    /// Number of quads currently held across all graphs.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.store.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.store.is_empty()?)
    }

    /// Whether the named graph currently holds at least one statement.
    pub fn contains_graph(&self, name: &GraphIdentifier) -> Result<bool, StoreError> {
        let graph = GraphNameRef::NamedNode(name.as_named_node().as_ref());
        match self.store.quads_for_pattern(None, None, None, Some(graph)).next() {
            Some(quad) => quad.map(|_| true).map_err(StoreError::from),
            None => Ok(false),
        }
    }
}

impl StoreClient for MemoryStoreClient {
    fn insert(&self, graph: &TimestampedGraph) -> Result<(), StoreError> {
        let graph_name = graph.name().as_named_node().clone();
        for triple in graph.statements() {
            let quad = Quad::new(
                triple.subject.clone(),
                triple.predicate.clone(),
                triple.object.clone(),
                graph_name.clone(),
            );
            self.store.insert(&quad)?;
        }
        Ok(())
    }

    fn query(&self, query: &str) -> Result<TripleSet, StoreError> {
        let parsed_query = SparqlEvaluator::new()
            .parse_query(query)
            .map_err(|e| StoreError::Query(e.to_string()))?;

        match parsed_query.on_store(&self.store).execute()? {
            QueryResults::Graph(triples) => {
                let mut result = TripleSet::new();
                for triple in triples {
                    result.insert(triple?);
                }
                Ok(result)
            }
            QueryResults::Solutions(_) => {
                Err(StoreError::UnsupportedResultForm("solutions".to_string()))
            }
            _ => Err(StoreError::UnsupportedResultForm("boolean".to_string())),
        }
    }

    fn clear(&self, name: &GraphIdentifier) -> Result<(), StoreError> {
        self.store.clear_graph(name.as_named_node().as_ref())?;
        Ok(())
    }
}
