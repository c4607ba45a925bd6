//! Error taxonomy for the collection pipeline
//!
//! Provider failures are scoped to a single region and never abort a run,
//! configuration failures are fatal before any network activity, and write
//! failures are reported per output representation.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::domain::region::SourceKind;

/// Failure of a single paginated request against a provider.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status}: {url}")]
    Http { status: u16, url: String },

    #[error("Authentication rejected ({status}): {url}")]
    Auth { status: u16, url: String },

    #[error("Rate limited by provider: {url}")]
    RateLimited { url: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Build from a transport error, keeping timeouts distinguishable.
    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }

    /// Map a non-success HTTP status to the matching variant.
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            401 | 403 => Self::Auth {
                status,
                url: url.to_string(),
            },
            429 => Self::RateLimited {
                url: url.to_string(),
            },
            _ => Self::Http {
                status,
                url: url.to_string(),
            },
        }
    }
}

/// Invalid or incomplete configuration. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Missing credential '{key}' for source {kind}")]
    MissingCredential { kind: SourceKind, key: String },

    #[error("Environment variable '{variable}' referenced by {kind}.{key} is not set")]
    UnresolvedCredential {
        kind: SourceKind,
        key: String,
        variable: String,
    },

    #[error("Missing provider identifier for source {0}")]
    MissingProviderId(SourceKind),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("No sources are enabled")]
    NoSources,
}

impl ConfigurationError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure to persist one output representation.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV serialization failed for {}: {message}", .path.display())]
    Csv { path: PathBuf, message: String },

    #[error("JSON serialization failed for {}: {message}", .path.display())]
    Json { path: PathBuf, message: String },
}

/// Top-level error for a collection run.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to initialize HTTP client: {0}")]
    HttpClient(String),
}
