//! Error types for draft persistence.

use thiserror::Error;

/// Errors that can occur during draft persistence.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DraftError {
    /// Local draft slot could not be read or written.
    #[error("local draft storage failed: {0}")]
    Storage(#[from] StoreError),

    /// Remote draft store rejected or never answered the request.
    #[error("remote draft save failed: {0}")]
    Gateway(#[from] GatewayError),
}

/// Failures of a [`LocalDraftStore`](crate::LocalDraftStore).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// Storage is disabled or over quota.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of a [`RemoteDraftGateway`](crate::RemoteDraftGateway).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    /// Network failure or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Server refused the draft (validation, auth).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Draft does not exist on the server.
    #[error("draft not found: {0}")]
    NotFound(String),
}

impl From<DraftError> for draftkeep_common::DraftkeepError {
    fn from(e: DraftError) -> Self {
        draftkeep_common::DraftkeepError::Engine(e.to_string())
    }
}
