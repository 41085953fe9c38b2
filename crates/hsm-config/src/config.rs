use std::path::PathBuf;

use clap::Args;

use crate::busspec::BusSpec;
use crate::error::ConfigError;

/// Every configuration knob enumerated in §6, collected in one place.
///
/// A flat `clap::Args` struct with `env`-backed defaults for every field,
/// covering the whole server's settings since the core has no YAML-tree
/// config to load, only scalar knobs.
#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// `host:port:topic`; absent disables message-bus event ingest.
    #[arg(long = "msgbus-listen", env = "HSM_MSGBUS_LISTEN")]
    pub msgbus_listen: Option<String>,

    /// JSON Web Key Set URL; absent disables auth.
    #[arg(long = "jwks-url", env = "HSM_JWKS_URL")]
    pub jwks_url: Option<String>,

    /// Read BMC credentials through the secure credential store instead of
    /// the endpoint record.
    #[arg(long = "read-vault", env = "HSM_READ_VAULT", default_value_t = false)]
    pub read_vault: bool,

    /// Write BMC credentials through the secure credential store.
    #[arg(long = "write-vault", env = "HSM_WRITE_VAULT", default_value_t = false)]
    pub write_vault: bool,

    /// TLS certificate path; self-signed is generated if missing.
    #[arg(long = "cert-path", env = "HSM_CERT_PATH")]
    pub cert_path: Option<PathBuf>,

    /// TLS key path; self-signed is generated if missing.
    #[arg(long = "key-path", env = "HSM_KEY_PATH")]
    pub key_path: Option<PathBuf>,

    /// PostgreSQL connection string; absent uses the in-memory store.
    #[arg(long = "store-url", env = "HSM_STORE_URL")]
    pub store_url: Option<String>,

    /// Address the REST API binds to.
    #[arg(long = "bind", env = "HSM_BIND", default_value = "0.0.0.0:27779")]
    pub bind: String,

    /// Worker-pool size for event processing (§5).
    #[arg(long = "event-workers", env = "HSM_EVENT_WORKERS", default_value_t = 8)]
    pub event_workers: usize,

    /// Worker-pool size for notification delivery (§5).
    #[arg(long = "notification-workers", env = "HSM_NOTIFICATION_WORKERS", default_value_t = 8)]
    pub notification_workers: usize,

    /// Polling scheduler initial delay after entering Standby (§4.7).
    #[arg(long = "poll-initial-delay-secs", env = "HSM_POLL_INITIAL_DELAY_SECS", default_value_t = 30)]
    pub poll_initial_delay_secs: u64,

    /// Polling scheduler tick interval (§4.7).
    #[arg(long = "poll-interval-secs", env = "HSM_POLL_INTERVAL_SECS", default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Polling job keep-alive heartbeat interval (§4.7).
    #[arg(long = "poll-keepalive-secs", env = "HSM_POLL_KEEPALIVE_SECS", default_value_t = 30)]
    pub poll_keepalive_secs: u64,

    /// Notification POST attempts before giving up (§4.5).
    #[arg(long = "notification-retries", env = "HSM_NOTIFICATION_RETRIES", default_value_t = 3)]
    pub notification_retries: u32,

    /// Delay between notification POST attempts, seconds (§4.5).
    #[arg(long = "notification-retry-delay-secs", env = "HSM_NOTIFICATION_RETRY_DELAY_SECS", default_value_t = 5)]
    pub notification_retry_delay_secs: u64,

    /// Redfish/notification HTTP transport timeout, seconds (§5).
    #[arg(long = "transport-timeout-secs", env = "HSM_TRANSPORT_TIMEOUT_SECS", default_value_t = 15)]
    pub transport_timeout_secs: u64,

    /// Reservation-expiry sweep interval, seconds (§4.3 SweepExpired).
    #[arg(long = "reservation-sweep-interval-secs", env = "HSM_RESERVATION_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub reservation_sweep_interval_secs: u64,
}

impl AppConfig {
    /// Parse [`msgbus_listen`] into a [`BusSpec`]; `None` if ingest is
    /// disabled or the field is empty.
    pub fn bus_spec(&self) -> Result<Option<BusSpec>, ConfigError> {
        match self.msgbus_listen.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some),
        }
    }

    /// `true` when a `jwksURL` is configured (§6: "empty disables auth").
    pub fn auth_enabled(&self) -> bool {
        self.jwks_url.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        config: AppConfig,
    }

    #[test]
    fn defaults_disable_bus_and_auth() {
        let w = Wrapper::parse_from(["hsmd"]);
        assert_eq!(w.config.bus_spec().unwrap(), None);
        assert!(!w.config.auth_enabled());
    }

    #[test]
    fn bus_listen_is_parsed() {
        let w = Wrapper::parse_from(["hsmd", "--msgbus-listen", "kafka:9092:hsm-events"]);
        let spec = w.config.bus_spec().unwrap().unwrap();
        assert_eq!(spec.port, 9092);
        assert_eq!(spec.topic, "hsm-events");
    }
}
