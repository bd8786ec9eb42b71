//! Load, test and clean up a validated graph.
//!
//! A validation run inserts the timestamped data under its content-derived
//! name, evaluates every rule of the catalog against that graph and clears
//! the graph again. Once the insert succeeded the clear happens exactly once
//! on every exit path, including rule failures.
//!
//! Graph names depend only on content, so two concurrent runs over the same
//! data share one remote graph and the first to finish clears it under the
//! other. Within one process this can be avoided with
//! [`ValidationOrchestrator::with_graph_leases`]; runs in separate processes
//! sharing a store must not validate identical data concurrently.
//!
//! If a rule fails and the following clear fails too, the rule error is
//! returned and the clear failure is logged.

use chrono::Utc;
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::catalog::{TestCatalog, ValidationRule};
use crate::config::ValidatorConfig;
use crate::error::{Result, StoreError, ValidatorError};
use crate::format::ResultFormatter;
use crate::jsonld::{JsonLdContext, JsonLdSerializer};
use crate::model::{GraphIdentifier, TimestampedGraph, TripleSet};
use crate::naming::GraphNamer;
use crate::parsing::EmbeddedDataParser;
use crate::store::{HttpStoreClient, SparqlEndpoints, StoreClient};

/// One formatted object produced by a failing rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub rule: String,
    pub object: Map<String, Value>,
}

/// Flattened findings of every rule that matched, in catalog order.
///
/// Serializes as a plain JSON array of the formatted objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn objects(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.findings.iter().map(|finding| &finding.object)
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.objects().cloned().map(Value::Object).collect())
    }
}

impl Serialize for ValidationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.objects())
    }
}

/// Number of runs holding one graph, locked across its insert and clear.
#[derive(Debug, Default)]
struct Lease {
    holders: Mutex<usize>,
}

/// In-process count of runs currently holding each graph.
///
/// Inserting a graph and clearing it for the last holder both happen under
/// the per-graph lock, so a run cannot insert into a graph another run is
/// about to clear.
#[derive(Debug, Default)]
pub struct GraphLeases {
    leases: Mutex<HashMap<GraphIdentifier, Arc<Lease>>>,
}

impl GraphLeases {
    fn lease(&self, name: &GraphIdentifier) -> Arc<Lease> {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(leases.entry(name.clone()).or_default())
    }

    /// Runs `insert` under the graph lock and takes a hold if it succeeds.
    fn acquire<E>(
        &self,
        name: &GraphIdentifier,
        insert: impl FnOnce() -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        let lease = self.lease(name);
        let mut holders = lease.holders.lock().unwrap_or_else(PoisonError::into_inner);
        let inserted = insert();
        if inserted.is_ok() {
            *holders += 1;
        }
        drop(holders);
        self.prune(name, lease);
        inserted
    }

    /// Drops one hold and runs `clear` under the graph lock if it was the last.
    fn release<E>(
        &self,
        name: &GraphIdentifier,
        clear: impl FnOnce() -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        let lease = self.lease(name);
        let mut holders = lease.holders.lock().unwrap_or_else(PoisonError::into_inner);
        *holders = holders.saturating_sub(1);
        let cleared = if *holders == 0 {
            clear()
        } else {
            log::debug!("graph {} still leased by {} concurrent run(s), not clearing", name, *holders);
            Ok(())
        };
        drop(holders);
        self.prune(name, lease);
        cleared
    }

    /// Forgets an idle graph nobody else is waiting on.
    fn prune(&self, name: &GraphIdentifier, lease: Arc<Lease>) {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only handed out under the map lock, so the count is stable here.
        if Arc::strong_count(&lease) == 2
            && *lease.holders.lock().unwrap_or_else(PoisonError::into_inner) == 0
        {
            leases.remove(name);
        }
    }

    pub fn holders(&self, name: &GraphIdentifier) -> usize {
        let leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        leases
            .get(name)
            .map_or(0, |lease| *lease.holders.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of graphs currently tracked.
    pub fn len(&self) -> usize {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A graph inserted into the store that must be cleared again.
///
/// [`LoadedGraph::release`] clears it and reports the outcome. If the guard
/// is dropped without being released (a panic unwinding through the rule
/// loop), the clear is attempted from `Drop` and failures are logged.
struct LoadedGraph<'a, S: StoreClient> {
    store: &'a S,
    leases: Option<&'a GraphLeases>,
    name: GraphIdentifier,
    released: bool,
}

impl<'a, S: StoreClient> LoadedGraph<'a, S> {
    fn insert(
        store: &'a S,
        leases: Option<&'a GraphLeases>,
        graph: &TimestampedGraph,
    ) -> std::result::Result<Self, StoreError> {
        match leases {
            Some(leases) => leases.acquire(graph.name(), || store.insert(graph))?,
            None => store.insert(graph)?,
        }
        Ok(Self { store, leases, name: graph.name().clone(), released: false })
    }

    fn name(&self) -> &GraphIdentifier {
        &self.name
    }

    fn release(mut self) -> std::result::Result<(), StoreError> {
        self.released = true;
        self.clear()
    }

    fn clear(&self) -> std::result::Result<(), StoreError> {
        match self.leases {
            Some(leases) => leases.release(&self.name, || self.store.clear(&self.name)),
            None => self.store.clear(&self.name),
        }
    }
}

impl<S: StoreClient> Drop for LoadedGraph<'_, S> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.clear() {
                log::warn!("failed to clear graph {} while unwinding: {}", self.name, err);
            }
        }
    }
}

/// Runs the catalog of rules against parsed data held in a triple store.
pub struct ValidationOrchestrator<S: StoreClient> {
    store: S,
    parser: EmbeddedDataParser,
    namer: GraphNamer,
    catalog: TestCatalog,
    formatter: ResultFormatter,
    leases: Option<GraphLeases>,
}

impl ValidationOrchestrator<HttpStoreClient> {
    /// Builds a validator talking to the remote store named in `config`.
    pub fn from_config(config: ValidatorConfig) -> Result<Self> {
        let config = config.validate()?;
        let store = HttpStoreClient::new(
            SparqlEndpoints::new(&config.sparql_query_endpoint, &config.sparql_update_endpoint),
            config.update_protocol,
            config.timeout(),
        )?
        .with_auth_token(config.auth_token.clone());
        Self::with_store(&config, store)
    }
}

impl<S: StoreClient> ValidationOrchestrator<S> {
    pub fn new(
        store: S,
        parser: EmbeddedDataParser,
        namer: GraphNamer,
        catalog: TestCatalog,
        formatter: ResultFormatter,
    ) -> Self {
        Self { store, parser, namer, catalog, formatter, leases: None }
    }

    /// Builds every component from a validated `config` around `store`.
    pub fn with_store(config: &ValidatorConfig, store: S) -> Result<Self> {
        let context = JsonLdContext::load(Path::new(&config.context_path))?;
        let formatter =
            ResultFormatter::new(Arc::new(JsonLdSerializer::new(context)), &config.base_uri)
                .with_ignored_properties(config.ignored_properties.iter().cloned());
        let parser = EmbeddedDataParser::new(config.strict).with_base(&config.base_uri)?;
        let orchestrator = Self::new(
            store,
            parser,
            GraphNamer::new(&config.namespace)?,
            TestCatalog::load(&config.test_dir)?,
            formatter,
        );
        Ok(if config.graph_leases { orchestrator.with_graph_leases() } else { orchestrator })
    }

    /// Only the last of several concurrent runs over identical data clears the shared graph.
    pub fn with_graph_leases(mut self) -> Self {
        self.leases = Some(GraphLeases::default());
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &TestCatalog {
        &self.catalog
    }

    pub fn namer(&self) -> &GraphNamer {
        &self.namer
    }

    pub fn leases(&self) -> Option<&GraphLeases> {
        self.leases.as_ref()
    }

    /// Extracts RDFa or Microdata statements from `html`.
    pub fn parse(&self, html: &str) -> Result<TripleSet> {
        self.parser.parse(html)
    }

    /// Validates `data` against every rule of the catalog.
    pub fn validate(&self, data: &TripleSet) -> Result<ValidationReport> {
        let name = self.namer.name(data);
        let graph = TimestampedGraph::issue(name, data.clone(), Utc::now());

        let loaded = LoadedGraph::insert(&self.store, self.leases.as_ref(), &graph)?;
        log::info!("validating {} statements in graph {}", data.len(), loaded.name());

        let outcome = self.run_rules(loaded.name());
        let graph_name = loaded.name().to_string();
        let cleared = loaded.release();

        match (outcome, cleared) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(source)) => Err(ValidatorError::Cleanup { graph: graph_name, source }),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(clear_err)) => {
                log::warn!("failed to clear graph {} after rule failure: {}", graph_name, clear_err);
                Err(err)
            }
        }
    }

    fn run_rules(&self, name: &GraphIdentifier) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        for rule in self.catalog.iter() {
            let results = self.run_rule(rule, name)?;
            log::debug!("rule {} matched {} statements", rule.name(), results.len());
            if results.is_empty() {
                continue;
            }
            report.findings.extend(
                self.formatter
                    .format(&results)
                    .into_iter()
                    .map(|object| Finding { rule: rule.name().to_string(), object }),
            );
        }
        Ok(report)
    }

    fn run_rule(&self, rule: &ValidationRule, name: &GraphIdentifier) -> Result<TripleSet> {
        self.store
            .query(&rule.bind(name))
            .map_err(|source| ValidatorError::Rule { rule: rule.name().to_string(), source })
    }
}
