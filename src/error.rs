//! Error types for validation runs

use thiserror::Error;

/// Result type alias for validator operations
pub type Result<T> = std::result::Result<T, ValidatorError>;

/// Failure raised by a triple-store client
#[derive(Error, Debug)]
pub enum StoreError {
    /// The request never reached the store or the response could not be read
    #[error("Transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success status
    #[error("Store rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The store answered with a payload that is not valid N-Triples
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The query answered with solutions, a boolean or an unreadable media type
    #[error("Unsupported result form: {0}")]
    UnsupportedResultForm(String),

    /// Query syntax or evaluation error reported by an in-process engine
    #[error("Query error: {0}")]
    Query(String),

    /// Storage error reported by an in-process engine
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

impl From<oxigraph::store::StorageError> for StoreError {
    fn from(err: oxigraph::store::StorageError) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<oxigraph::sparql::QueryEvaluationError> for StoreError {
    fn from(err: oxigraph::sparql::QueryEvaluationError) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<oxigraph::io::RdfParseError> for StoreError {
    fn from(err: oxigraph::io::RdfParseError) -> Self {
        StoreError::MalformedResponse(err.to_string())
    }
}

/// Main error type for the validator
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// Missing or malformed initialization argument
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed embedded data under strict parsing
    #[error("Parse error: {0}")]
    Parse(String),

    /// Store failure outside of rule execution (insertion)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Store failure while executing a named rule
    #[error("Rule {rule} failed: {source}")]
    Rule {
        rule: String,
        #[source]
        source: StoreError,
    },

    /// Clearing the validated graph failed after every rule succeeded
    #[error("Failed to clear graph {graph}: {source}")]
    Cleanup {
        graph: String,
        #[source]
        source: StoreError,
    },

    /// JSON or TOML (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidatorError {
    /// Store error underlying this failure, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ValidatorError::Store(err)
            | ValidatorError::Rule { source: err, .. }
            | ValidatorError::Cleanup { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ValidatorError {
    fn from(err: serde_json::Error) -> Self {
        ValidatorError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ValidatorError {
    fn from(err: toml::de::Error) -> Self {
        ValidatorError::Config(err.to_string())
    }
}

impl From<oxigraph::model::IriParseError> for ValidatorError {
    fn from(err: oxigraph::model::IriParseError) -> Self {
        ValidatorError::Config(format!("Invalid IRI: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidatorError::Parse("dangling prefix".to_string());
        assert_eq!(err.to_string(), "Parse error: dangling prefix");
    }

    #[test]
    fn test_rule_error_keeps_store_source() {
        let err = ValidatorError::Rule {
            rule: "missing-name.rq".to_string(),
            source: StoreError::Rejected { status: 400, body: "bad query".to_string() },
        };
        assert!(err.to_string().contains("missing-name.rq"));
        assert!(matches!(err.store_error(), Some(StoreError::Rejected { status: 400, .. })));
    }

    #[test]
    fn test_config_error_has_no_store_source() {
        let err = ValidatorError::Config("test_dir".to_string());
        assert!(err.store_error().is_none());
    }
}
