//! Validator configuration.
//!
//! Loaded from a TOML file or built in code, then checked once with
//! [`ValidatorConfig::validate`] before any component is constructed.

use oxigraph::model::NamedNode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Result, ValidatorError};
use crate::format::DEFAULT_IGNORED_PROPERTIES;
use crate::store::UpdateProtocol;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatorConfig {
    /// Application root; normalized to end with `/`
    pub base_uri: String,
    /// Prefix under which graph identifiers are minted
    pub namespace: String,
    pub sparql_query_endpoint: String,
    pub sparql_update_endpoint: String,
    /// Directory holding one SPARQL rule per file
    pub test_dir: PathBuf,
    /// Static JSON-LD document whose `@context` shapes result objects
    pub context_path: PathBuf,
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_ignored_properties")]
    pub ignored_properties: Vec<String>,
    #[serde(default)]
    pub update_protocol: UpdateProtocol,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Reference-count concurrent validations of identical content in this process
    #[serde(default)]
    pub graph_leases: bool,
}

fn default_ignored_properties() -> Vec<String> {
    DEFAULT_IGNORED_PROPERTIES.iter().map(|p| p.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
    30
}

impl ValidatorConfig {
    pub fn new(
        base_uri: impl Into<String>,
        namespace: impl Into<String>,
        sparql_query_endpoint: impl Into<String>,
        sparql_update_endpoint: impl Into<String>,
        test_dir: impl Into<PathBuf>,
        context_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            base_uri: base_uri.into(),
            namespace: namespace.into(),
            sparql_query_endpoint: sparql_query_endpoint.into(),
            sparql_update_endpoint: sparql_update_endpoint.into(),
            test_dir: test_dir.into(),
            context_path: context_path.into(),
            strict: false,
            ignored_properties: default_ignored_properties(),
            update_protocol: UpdateProtocol::default(),
            timeout_secs: default_timeout_secs(),
            auth_token: None,
            graph_leases: false,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ValidatorError::Config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks every required argument and normalizes `base_uri`.
    pub fn validate(mut self) -> Result<Self> {
        for (key, value) in [
            ("base_uri", &self.base_uri),
            ("namespace", &self.namespace),
            ("sparql_query_endpoint", &self.sparql_query_endpoint),
            ("sparql_update_endpoint", &self.sparql_update_endpoint),
        ] {
            check_uri(key, value)?;
        }

        if !self.test_dir.is_dir() {
            return Err(ValidatorError::Config(format!(
                "Invalid path to test directory: {}",
                self.test_dir.display()
            )));
        }
        if !self.context_path.is_file() {
            return Err(ValidatorError::Config(format!(
                "Invalid path to JSON-LD context: {}",
                self.context_path.display()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ValidatorError::Config("timeout_secs must be positive".to_string()));
        }

        if !self.base_uri.ends_with('/') {
            self.base_uri.push('/');
        }
        Ok(self)
    }
}

fn check_uri(key: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ValidatorError::Config(format!("Missing argument {}", key)));
    }
    let valid = Url::parse(value).is_ok() && NamedNode::new(value).is_ok();
    if !valid {
        return Err(ValidatorError::Config(format!(
            "Invalid URI provided for {} argument: {}",
            key, value
        )));
    }
    Ok(())
}
