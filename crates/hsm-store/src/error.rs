use thiserror::Error;

/// Storage-layer error kinds (§7: NotFound / Conflict / Infrastructure
/// propagate from here; Validation is caught earlier by `hsm-domain`).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}
