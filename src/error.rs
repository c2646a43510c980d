//! Error taxonomy for the ingestion pipeline.
//!
//! Every failure that can happen while processing a single catalog item is
//! an [`IngestError`]. The batch orchestrator catches these at the item
//! boundary, logs them, and moves on. Only
//! [`IngestError::Configuration`] is fatal: it is raised before any item is
//! processed and aborts the run with a non-zero exit.

use thiserror::Error;

/// Errors raised by sources, classifiers, and the upsert engine.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Retryable network or HTTP failure talking to an external catalog.
    #[error("fetch failed for {url}: {message}")]
    TransientFetch { url: String, message: String },

    /// The catalog answered with a structured error payload.
    #[error("catalog API error {code}: {info}")]
    Api { code: String, info: String },

    /// The classifier could not produce a valid 3-digit code.
    #[error("classification failed: {0}")]
    Classification(String),

    /// A store write failed for a reason other than a uniqueness violation.
    #[error("store write failed for {key}: {message}")]
    Persistence { key: String, message: String },

    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A raw record carries no usable natural key.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl IngestError {
    pub fn transient(url: impl Into<String>, message: impl ToString) -> Self {
        IngestError::TransientFetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn persistence(key: impl Into<String>, message: impl ToString) -> Self {
        IngestError::Persistence {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Configuration(_))
    }

    /// Short label used in logs and JSON progress output.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::TransientFetch { .. } => "transient_fetch",
            IngestError::Api { .. } => "api",
            IngestError::Classification(_) => "classification",
            IngestError::Persistence { .. } => "persistence",
            IngestError::Configuration(_) => "configuration",
            IngestError::InvalidRecord(_) => "invalid_record",
        }
    }
}
