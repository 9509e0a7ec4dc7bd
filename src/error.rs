use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Failures of a single page request against the species endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned status {0}")]
    Server(u16),

    #[error("failed to decode species response: {0}")]
    Decoding(String),
}

impl FetchError {
    /// Decoding failures need a server-side fix; retrying will not help.
    pub fn retryable(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Server(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum StoreError {
    #[error("failed to write species store: {0}")]
    WriteFailed(String),

    #[error("failed to read species store: {0}")]
    ReadFailed(String),

    #[error("unable to resolve store location: {0}")]
    Location(String),
}

#[derive(Debug, Error, Diagnostic)]
pub enum SpeciesError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("species not found locally: {0}")]
    SpeciesNotFound(i64),

    #[error("invalid conservation status: {0}")]
    InvalidStatus(String),
}
