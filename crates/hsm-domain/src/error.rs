use thiserror::Error;

/// The error taxonomy from §7, shared across the core so every layer
/// speaks the same kinds. Higher crates (`hsm-store`, `hsm-events`,
/// `hsm-engine`) define their own error types for concerns scoped to them,
/// and wrap `DomainError` with `#[from]` where a domain-level validation
/// failure can surface through them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    // ── Validation ──────────────────────────────────────────────────────────
    #[error("malformed component id: {0}")]
    BadId(String),

    #[error("update request carried no component ids")]
    NoIds,

    #[error("update type accepts at most one component id")]
    TooManyIds,

    #[error("StateData update requires a state")]
    NoState,

    #[error("update requires a flag")]
    NoFlag,

    #[error("Enabled update requires a boolean value")]
    NoEnabled,

    #[error("SoftwareStatus update requires a value")]
    NoSwStatus,

    #[error("Role update requires a role")]
    NoRole,

    #[error("NID update requires a value")]
    NoNid,

    #[error("unrecognized update type: {0}")]
    BadUpdateType(String),

    #[error("component id in payload does not match path id")]
    IdMismatch,

    // ── Conflict ────────────────────────────────────────────────────────────
    #[error("illegal state transition for {id}: {from} -> {to}")]
    IllegalTransition { id: String, from: String, to: String },

    #[error("internal domain error: {0}")]
    Internal(String),
}
