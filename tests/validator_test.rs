use oxigraph::model::{Literal, NamedNode, Triple};
use sd_validator::catalog::{TestCatalog, ValidationRule};
use sd_validator::format::ResultFormatter;
use sd_validator::jsonld::{JsonLdContext, JsonLdSerializer};
use sd_validator::model::{TimestampedGraph, TripleSet, DCTERMS_ISSUED};
use sd_validator::naming::GraphNamer;
use sd_validator::store::{MemoryStoreClient, StoreClient};
use sd_validator::{
    EmbeddedDataParser, GraphIdentifier, StoreError, ValidationOrchestrator, ValidatorConfig,
    ValidatorError,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Barrier, Mutex};
use std::time::{Duration, Instant};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn config() -> ValidatorConfig {
    ValidatorConfig::new(
        "http://validator.example.org",
        "http://validator.example.org/graph/",
        "http://localhost:3030/validator/query",
        "http://localhost:3030/validator/update",
        fixtures().join("rules"),
        fixtures().join("error_context.jsonld"),
    )
    .validate()
    .unwrap()
}

fn html(name: &str) -> String {
    std::fs::read_to_string(fixtures().join("html").join(name)).unwrap()
}

/// Which store operations fail.
#[derive(Default)]
struct Faults {
    insert: bool,
    query: bool,
    clear: bool,
}

/// Store wrapper counting calls and injecting failures.
struct RecordingStore {
    inner: MemoryStoreClient,
    faults: Faults,
    barrier: Option<Barrier>,
    inserts: AtomicUsize,
    queries: AtomicUsize,
    clears: AtomicUsize,
}

impl RecordingStore {
    fn new(faults: Faults) -> Self {
        Self {
            inner: MemoryStoreClient::new().unwrap(),
            faults,
            barrier: None,
            inserts: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        }
    }

    /// Every query waits until `parties` queries are in flight.
    fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some(Barrier::new(parties));
        self
    }

    fn rejected(operation: &str) -> StoreError {
        StoreError::Rejected { status: 500, body: format!("{} failed", operation) }
    }
}

impl StoreClient for RecordingStore {
    fn insert(&self, graph: &TimestampedGraph) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.faults.insert {
            return Err(Self::rejected("insert"));
        }
        self.inner.insert(graph)
    }

    fn query(&self, query: &str) -> Result<TripleSet, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        if self.faults.query {
            return Err(Self::rejected("query"));
        }
        self.inner.query(query)
    }

    fn clear(&self, name: &GraphIdentifier) -> Result<(), StoreError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        if self.faults.clear {
            return Err(Self::rejected("clear"));
        }
        self.inner.clear(name)
    }
}

fn validator(store: RecordingStore) -> ValidationOrchestrator<RecordingStore> {
    ValidationOrchestrator::with_store(&config(), store).unwrap()
}

fn validator_with_rules<S: StoreClient>(
    store: S,
    rules: Vec<ValidationRule>,
) -> ValidationOrchestrator<S> {
    let config = config();
    let context = JsonLdContext::load(&config.context_path).unwrap();
    ValidationOrchestrator::new(
        store,
        EmbeddedDataParser::new(false),
        GraphNamer::new(&config.namespace).unwrap(),
        TestCatalog::from_rules(rules),
        ResultFormatter::new(Arc::new(JsonLdSerializer::new(context)), &config.base_uri),
    )
}

fn products_rule() -> ValidationRule {
    ValidationRule::new(
        "products.rq",
        "PREFIX schema: <http://schema.org/>\n\
         CONSTRUCT { ?p a schema:Product } WHERE { GRAPH ?validatedGraph { ?p a schema:Product } }",
    )
    .unwrap()
}

fn product_data() -> TripleSet {
    let product = NamedNode::new("http://shop.example/products/kettle").unwrap();
    vec![
        Triple::new(
            product.clone(),
            NamedNode::new("http://www.w3.org/1999/02/22-rdf-syntax-ns#type").unwrap(),
            NamedNode::new("http://schema.org/Product").unwrap(),
        ),
        Triple::new(
            product,
            NamedNode::new("http://schema.org/name").unwrap(),
            Literal::new_simple_literal("Electric kettle"),
        ),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_valid_document_has_no_findings() {
    let validator = validator(RecordingStore::new(Faults::default()));
    let data = validator.parse(&html("product_microdata.html")).unwrap();
    assert!(!data.is_empty());

    let report = validator.validate(&data).unwrap();
    assert!(report.is_empty(), "unexpected findings: {}", report.to_json());
    assert_eq!(validator.store().inserts.load(Ordering::SeqCst), 1);
    assert_eq!(validator.store().queries.load(Ordering::SeqCst), 3);
    assert_eq!(validator.store().clears.load(Ordering::SeqCst), 1);
    assert!(validator.store().inner.is_empty().unwrap());
}

#[test]
fn test_findings_follow_catalog_order() {
    let validator = validator(RecordingStore::new(Faults::default()));
    let data = validator.parse(&html("product_rdfa.html")).unwrap();

    let report = validator.validate(&data).unwrap();
    let rules: Vec<&str> = report.findings().iter().map(|f| f.rule.as_str()).collect();
    assert_eq!(rules, vec!["offer-price.rq", "product-name.rq"]);

    let missing_name = &report.findings()[1].object;
    assert_eq!(missing_name["@type"], "Error");
    assert_eq!(missing_name["focus"], "http://shop.example/products/kettle");
    assert_eq!(
        missing_name["message"],
        json!({"@value": "Product is missing schema:name", "@language": "en"})
    );
    assert_eq!(missing_name["@context"], "http://validator.example.org/context.jsonld");
    assert!(report.objects().all(|object| !object.contains_key("@id")));
}

#[test]
fn test_one_matching_rule_yields_one_object() {
    let rules = vec![
        ValidationRule::new(
            "never.rq",
            "CONSTRUCT { ?s ?p ?o } WHERE { GRAPH ?validatedGraph { ?s ?p ?o } FILTER(false) }",
        )
        .unwrap(),
        ValidationRule::new(
            "products.rq",
            "PREFIX schema: <http://schema.org/>\n\
             CONSTRUCT { ?p a schema:Product } WHERE { GRAPH ?validatedGraph { ?p a schema:Product } }",
        )
        .unwrap(),
    ];
    let validator = validator_with_rules(RecordingStore::new(Faults::default()), rules);

    let report = validator.validate(&product_data()).unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.findings()[0].rule, "products.rq");
    assert_eq!(report.findings()[0].object["@type"], "schema:Product");
}

#[test]
fn test_empty_data_gives_empty_report() {
    let validator = validator(RecordingStore::new(Faults::default()));
    let report = validator.validate(&TripleSet::new()).unwrap();

    assert!(report.is_empty());
    assert_eq!(validator.store().clears.load(Ordering::SeqCst), 1);
    assert!(validator.store().inner.is_empty().unwrap());
}

#[test]
fn test_round_trip_returns_data_and_issuance() {
    let store = MemoryStoreClient::new().unwrap();
    let data = product_data();
    let name = GraphNamer::new("http://validator.example.org/graph/").unwrap().name(&data);
    let graph = TimestampedGraph::issue(name.clone(), data.clone(), chrono::Utc::now());
    store.insert(&graph).unwrap();

    let everything = ValidationRule::new(
        "all.rq",
        "CONSTRUCT { ?s ?p ?o } WHERE { GRAPH ?validatedGraph { ?s ?p ?o } }",
    )
    .unwrap();
    let results = store.query(&everything.bind(&name)).unwrap();

    assert_eq!(results.len(), data.len() + 1);
    assert!(data.iter().all(|triple| results.contains(triple)));
    let issued: Vec<&Triple> =
        results.iter().filter(|t| t.predicate.as_ref() == DCTERMS_ISSUED).collect();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].subject.to_string(), name.to_sparql());

    store.clear(&name).unwrap();
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_rule_failure_still_clears_once() {
    let validator = validator(RecordingStore::new(Faults { query: true, ..Faults::default() }));
    let err = validator.validate(&product_data()).unwrap_err();

    match err {
        ValidatorError::Rule { rule, source } => {
            assert_eq!(rule, "offer-price.rq");
            assert!(matches!(source, StoreError::Rejected { status: 500, .. }));
        }
        other => panic!("expected rule error, got {:?}", other),
    }
    assert_eq!(validator.store().queries.load(Ordering::SeqCst), 1);
    assert_eq!(validator.store().clears.load(Ordering::SeqCst), 1);
    assert!(validator.store().inner.is_empty().unwrap());
}

/// Store whose queries fail once the named rule's query is reached.
struct FailingRule {
    inner: MemoryStoreClient,
    marker: &'static str,
    queries: AtomicUsize,
    clears: AtomicUsize,
}

impl StoreClient for FailingRule {
    fn insert(&self, graph: &TimestampedGraph) -> Result<(), StoreError> {
        self.inner.insert(graph)
    }

    fn query(&self, query: &str) -> Result<TripleSet, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if query.contains(self.marker) {
            return Err(RecordingStore::rejected("query"));
        }
        self.inner.query(query)
    }

    fn clear(&self, name: &GraphIdentifier) -> Result<(), StoreError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear(name)
    }
}

#[test]
fn test_later_rule_failure_discards_findings_and_clears_once() {
    let rules = vec![
        products_rule(),
        ValidationRule::new(
            "zz-broken.rq",
            "# broken\nCONSTRUCT { ?s ?p ?o } WHERE { GRAPH ?validatedGraph { ?s ?p ?o } }",
        )
        .unwrap(),
    ];
    let store = FailingRule {
        inner: MemoryStoreClient::new().unwrap(),
        marker: "# broken",
        queries: AtomicUsize::new(0),
        clears: AtomicUsize::new(0),
    };
    let validator = validator_with_rules(store, rules);

    match validator.validate(&product_data()).unwrap_err() {
        ValidatorError::Rule { rule, source } => {
            assert_eq!(rule, "zz-broken.rq");
            assert!(matches!(source, StoreError::Rejected { status: 500, .. }));
        }
        other => panic!("expected rule error, got {:?}", other),
    }
    assert_eq!(validator.store().queries.load(Ordering::SeqCst), 2);
    assert_eq!(validator.store().clears.load(Ordering::SeqCst), 1);
    assert!(validator.store().inner.is_empty().unwrap());
}

#[test]
fn test_insert_failure_runs_nothing_else() {
    let validator = validator(RecordingStore::new(Faults { insert: true, ..Faults::default() }));
    let err = validator.validate(&product_data()).unwrap_err();

    assert!(matches!(err, ValidatorError::Store(StoreError::Rejected { .. })));
    assert_eq!(validator.store().queries.load(Ordering::SeqCst), 0);
    assert_eq!(validator.store().clears.load(Ordering::SeqCst), 0);
}

#[test]
fn test_clear_failure_is_reported() {
    let validator = validator(RecordingStore::new(Faults { clear: true, ..Faults::default() }));
    let data = product_data();
    let err = validator.validate(&data).unwrap_err();

    assert!(matches!(err.store_error(), Some(StoreError::Rejected { .. })));
    match err {
        ValidatorError::Cleanup { graph, .. } => {
            assert_eq!(graph, validator.namer().name(&data).to_string());
        }
        other => panic!("expected cleanup error, got {:?}", other),
    }
}

#[test]
fn test_rule_error_wins_over_clear_error() {
    let validator =
        validator(RecordingStore::new(Faults { query: true, clear: true, ..Faults::default() }));
    let err = validator.validate(&product_data()).unwrap_err();

    assert!(matches!(err, ValidatorError::Rule { .. }));
    assert_eq!(validator.store().clears.load(Ordering::SeqCst), 1);
}

#[test]
fn test_leases_clear_shared_graph_once() {
    let rules = vec![products_rule()];
    let store = RecordingStore::new(Faults::default()).with_barrier(2);
    let validator = validator_with_rules(store, rules).with_graph_leases();
    let data = product_data();

    std::thread::scope(|scope| {
        let first = scope.spawn(|| validator.validate(&data));
        let second = scope.spawn(|| validator.validate(&data));
        for handle in [first, second] {
            let report = handle.join().unwrap().unwrap();
            assert_eq!(report.len(), 1);
        }
    });

    assert_eq!(validator.store().inserts.load(Ordering::SeqCst), 2);
    assert_eq!(validator.store().clears.load(Ordering::SeqCst), 1);
    assert_eq!(validator.leases().unwrap().holders(&validator.namer().name(&data)), 0);
    assert!(validator.store().inner.is_empty().unwrap());
}

/// Store that holds the first clear open until another insert arrives or a
/// timeout passes, recording the order of inserts and clears.
struct SlowClear {
    inner: MemoryStoreClient,
    events: Mutex<Vec<&'static str>>,
    clearing: Mutex<Option<Sender<()>>>,
}

impl SlowClear {
    fn record(&self, event: &'static str) {
        self.events.lock().unwrap().push(event);
    }

    fn inserts(&self) -> usize {
        self.events.lock().unwrap().iter().filter(|e| **e == "insert").count()
    }
}

impl StoreClient for SlowClear {
    fn insert(&self, graph: &TimestampedGraph) -> Result<(), StoreError> {
        self.inner.insert(graph)?;
        self.record("insert");
        Ok(())
    }

    fn query(&self, query: &str) -> Result<TripleSet, StoreError> {
        self.inner.query(query)
    }

    fn clear(&self, name: &GraphIdentifier) -> Result<(), StoreError> {
        self.record("clear-start");
        let clearing = self.clearing.lock().unwrap().take();
        if let Some(clearing) = clearing {
            clearing.send(()).unwrap();
            let deadline = Instant::now() + Duration::from_millis(300);
            while self.inserts() < 2 && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        self.inner.clear(name)?;
        self.record("clear-end");
        Ok(())
    }
}

#[test]
fn test_leases_keep_insert_out_of_a_running_clear() {
    let (clearing, clear_started) = mpsc::channel();
    let store = SlowClear {
        inner: MemoryStoreClient::new().unwrap(),
        events: Mutex::new(Vec::new()),
        clearing: Mutex::new(Some(clearing)),
    };
    let validator = validator_with_rules(store, vec![products_rule()]).with_graph_leases();
    let data = product_data();

    std::thread::scope(|scope| {
        let first = scope.spawn(|| validator.validate(&data));
        clear_started.recv().unwrap();
        let second = scope.spawn(|| validator.validate(&data));

        assert_eq!(first.join().unwrap().unwrap().len(), 1);
        assert_eq!(second.join().unwrap().unwrap().len(), 1);
    });

    let events = validator.store().events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["insert", "clear-start", "clear-end", "insert", "clear-start", "clear-end"]
    );
    assert!(validator.leases().unwrap().is_empty());
    assert!(validator.store().inner.is_empty().unwrap());
}

#[test]
fn test_identical_content_shares_a_name() {
    let validator = validator(RecordingStore::new(Faults::default()));
    let microdata = html("product_microdata.html");

    let first = validator.namer().name(&validator.parse(&microdata).unwrap());
    let second = validator.namer().name(&validator.parse(&microdata).unwrap());
    let other = validator.namer().name(&validator.parse(&html("product_rdfa.html")).unwrap());

    assert_eq!(first, second);
    assert_ne!(first, other);
    assert!(first.as_str().starts_with("http://validator.example.org/graph/"));
}

#[test]
fn test_strict_parsing_rejects_malformed_markup() {
    let malformed = html("malformed_rdfa.html");

    let lenient = validator(RecordingStore::new(Faults::default()));
    let triples = lenient.parse(&malformed).unwrap();
    assert_eq!(triples.len(), 2);

    let strict = ValidationOrchestrator::with_store(
        &config().with_strict(true),
        RecordingStore::new(Faults::default()),
    )
    .unwrap();
    assert!(matches!(strict.parse(&malformed), Err(ValidatorError::Parse(_))));
}

#[test]
fn test_from_config_builds_http_validator() {
    let validator = ValidationOrchestrator::from_config(config()).unwrap();
    assert_eq!(validator.catalog().len(), 3);
    assert_eq!(validator.store().endpoints().query, "http://localhost:3030/validator/query");
}

#[test]
fn test_from_config_rejects_invalid_settings() {
    let mut config = config();
    config.namespace = "graph/".to_string();
    assert!(matches!(
        ValidationOrchestrator::from_config(config),
        Err(ValidatorError::Config(_))
    ));
}
