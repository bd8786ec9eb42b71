//! SPARQL 1.1 protocol client for remote stores (Apache Jena Fuseki, Oxigraph server, etc.)

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Triple;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{clear_graph_update, insert_data_update, StoreClient};
use crate::error::StoreError;
use crate::model::{GraphIdentifier, TimestampedGraph, TripleSet};

const NTRIPLES_MEDIA_TYPE: &str = "application/n-triples";
const SPARQL_RESULTS_PREFIX: &str = "application/sparql-results";

/// How query and update text is carried in the POST body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateProtocol {
    /// `application/x-www-form-urlencoded` with a `query=` or `update=` field
    #[default]
    Form,
    /// Raw `application/sparql-query` or `application/sparql-update` body
    Direct,
}

/// Read and write endpoints of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparqlEndpoints {
    pub query: String,
    pub update: String,
}

impl SparqlEndpoints {
    pub fn new(query: impl Into<String>, update: impl Into<String>) -> Self {
        Self { query: query.into(), update: update.into() }
    }
}

/// Blocking HTTP client for a remote triple store.
#[derive(Debug, Clone)]
pub struct HttpStoreClient {
    endpoints: SparqlEndpoints,
    protocol: UpdateProtocol,
    auth_token: Option<String>,
    client: Client,
}

impl HttpStoreClient {
    pub fn new(
        endpoints: SparqlEndpoints,
        protocol: UpdateProtocol,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoints, protocol, auth_token: None, client })
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn endpoints(&self) -> &SparqlEndpoints {
        &self.endpoints
    }

    pub fn protocol(&self) -> UpdateProtocol {
        self.protocol
    }

    /// Executes a SPARQL update against the update endpoint.
    pub fn update(&self, update: &str) -> Result<(), StoreError> {
        let request = self.add_auth_header(self.client.post(&self.endpoints.update));
        let request = match self.protocol {
            UpdateProtocol::Form => request.form(&[("update", update)]),
            UpdateProtocol::Direct => request
                .header(CONTENT_TYPE, "application/sparql-update")
                .body(update.to_string()),
        };

        log::trace!("POST {}: {}", self.endpoints.update, update);
        check_status(request.send()?)?;
        Ok(())
    }

    fn query_request(&self, query: &str) -> RequestBuilder {
        let request = self
            .add_auth_header(self.client.post(&self.endpoints.query))
            .header(ACCEPT, NTRIPLES_MEDIA_TYPE);
        match self.protocol {
            UpdateProtocol::Form => request.form(&[("query", query)]),
            UpdateProtocol::Direct => request
                .header(CONTENT_TYPE, "application/sparql-query")
                .body(query.to_string()),
        }
    }

    fn add_auth_header(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.auth_token {
            request.header(AUTHORIZATION, format!("Bearer {}", token))
        } else {
            request
        }
    }
}

impl StoreClient for HttpStoreClient {
    fn insert(&self, graph: &TimestampedGraph) -> Result<(), StoreError> {
        self.update(&insert_data_update(graph))
    }

    fn query(&self, query: &str) -> Result<TripleSet, StoreError> {
        log::trace!("POST {}: {}", self.endpoints.query, query);
        let response = check_status(self.query_request(query).send()?)?;

        let format = response_format(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or(NTRIPLES_MEDIA_TYPE),
        )?;

        let body = response.text()?;
        parse_graph(&body, format)
    }

    fn clear(&self, name: &GraphIdentifier) -> Result<(), StoreError> {
        self.update(&clear_graph_update(name))
    }
}

fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_else(|_| "Unknown error".to_string());
    Err(StoreError::Rejected { status: status.as_u16(), body })
}

/// RDF syntax of a response body from its `Content-Type`.
pub fn response_format(content_type: &str) -> Result<RdfFormat, StoreError> {
    if content_type.trim_start().starts_with(SPARQL_RESULTS_PREFIX) {
        return Err(StoreError::UnsupportedResultForm(content_type.to_string()));
    }
    RdfFormat::from_media_type(content_type)
        .ok_or_else(|| StoreError::UnsupportedResultForm(content_type.to_string()))
}

/// Parses a response body into a triple set; graph names of quad formats are dropped.
pub fn parse_graph(body: &str, format: RdfFormat) -> Result<TripleSet, StoreError> {
    let mut triples = TripleSet::new();
    for quad in RdfParser::from_format(format).for_reader(body.as_bytes()) {
        let quad = quad?;
        triples.insert(Triple::new(quad.subject, quad.predicate, quad.object));
    }
    Ok(triples)
}
