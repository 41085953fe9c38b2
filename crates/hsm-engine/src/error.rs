use thiserror::Error;

/// The engine-wide error enum. Every crate below this one contributes its
/// own error kind (§7 groups them by taxonomy: Validation, NotFound,
/// Conflict, Credentials, Upstream, Infrastructure); this wraps them so
/// callers (the REST layer, tests) see one type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] hsm_domain::DomainError),

    #[error(transparent)]
    Store(#[from] hsm_store::StoreError),

    #[error(transparent)]
    Graph(#[from] hsm_graph::GraphError),

    #[error(transparent)]
    Redfish(#[from] hsm_redfish::RedfishError),

    #[error(transparent)]
    Event(#[from] hsm_events::EventError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal engine error: {0}")]
    Internal(String),
}
