use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid bus spec '{0}': expected exactly 3 colon-separated fields host:port:topic")]
    InvalidBusSpecShape(String),

    #[error("invalid bus spec '{0}': port must be numeric")]
    InvalidBusSpecPort(String),

    #[error("invalid bus spec '{0}': host and topic must be non-empty")]
    InvalidBusSpecField(String),
}
