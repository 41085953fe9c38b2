use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// A parsed `msgbusListen` value: `host:port:topic` (§6 External
/// Interfaces). Exactly three colon-separated fields; the port must be
/// numeric; host and topic must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusSpec {
    pub host: String,
    pub port: u16,
    pub topic: String,
}

impl FromStr for BusSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [host, port, topic] = parts[..] else {
            return Err(ConfigError::InvalidBusSpecShape(s.to_string()));
        };
        if host.is_empty() || topic.is_empty() {
            return Err(ConfigError::InvalidBusSpecField(s.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::InvalidBusSpecPort(s.to_string()))?;
        Ok(BusSpec { host: host.to_string(), port, topic: topic.to_string() })
    }
}

impl fmt::Display for BusSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.topic)
    }
}
