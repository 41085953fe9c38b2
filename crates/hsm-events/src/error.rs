use thiserror::Error;

/// Upstream (§7) error kinds for the event-ingest path. Every variant
/// here means "drop this event", matching §4.1 Failure semantics: any
/// error in the normalizer pipeline is logged and drops the event, no
/// retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("event payload was empty")]
    EmptyPayload,

    #[error("failed to decode event payload: {0}")]
    BusDecodeError(String),

    #[error("event registry '{0}' is filtered")]
    FilteredRegistry(String),

    #[error("ignored power state change: {0}")]
    IgnoredStateChange(String),

    #[error("no controller endpoint id could be resolved from event context")]
    NoEndpointId,

    #[error("no recognized parser for message id '{0}'")]
    NoParser(String),

    #[error("event carried no URI argument or origin-of-condition")]
    MissingUri,
}
