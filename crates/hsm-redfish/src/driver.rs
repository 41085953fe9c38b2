use std::time::Duration;

use async_trait::async_trait;
use hsm_domain::RedfishEndpoint;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::RedfishError;

/// Basic-auth credentials resolved for one Redfish endpoint. Never
/// constructed with the secret baked in at rest — only ever held
/// transiently for the duration of one outbound call (§4 Non-goals:
/// "credential-store lookups" are an abstract interface here, not a real
/// vault client).
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Resolves [`Credentials`] for a [`RedfishEndpoint`]. Two backends are
/// selected by the `readVault`/`writeVault` config flags (§6); behind
/// this one interface they are indistinguishable to callers (Design Notes
/// "Credential source abstraction").
#[async_trait]
pub trait CredentialSource: Send + Sync + 'static {
    async fn resolve(&self, endpoint: &RedfishEndpoint) -> Result<Credentials, RedfishError>;
}

/// Resolves credentials from the endpoint's own `credentials_ref`, encoded
/// as `username:password`. Used when `readVault` is disabled — the
/// simplest possible backend, and the one exercised by tests.
#[derive(Debug, Default, Clone)]
pub struct RecordCredentialSource;

#[async_trait]
impl CredentialSource for RecordCredentialSource {
    async fn resolve(&self, endpoint: &RedfishEndpoint) -> Result<Credentials, RedfishError> {
        let raw = endpoint
            .credentials_ref
            .as_deref()
            .ok_or_else(|| RedfishError::NoCredentials(endpoint.id.as_str().to_string()))?;
        let (username, password) = raw
            .split_once(':')
            .ok_or_else(|| RedfishError::NoCredentials(endpoint.id.as_str().to_string()))?;
        Ok(Credentials { username: username.to_string(), password: password.to_string() })
    }
}

/// Resolves credentials through a secure vault client keyed by
/// `credentials_ref`. Used when `readVault` is enabled. The actual vault
/// transport is out of scope (§1 Non-goals: "credential-store
/// lookups"); this wraps whatever lookup function the deployment plugs in.
pub struct VaultCredentialSource {
    lookup: Box<dyn Fn(&str) -> Result<Credentials, RedfishError> + Send + Sync>,
}

impl VaultCredentialSource {
    pub fn new(lookup: impl Fn(&str) -> Result<Credentials, RedfishError> + Send + Sync + 'static) -> Self {
        Self { lookup: Box::new(lookup) }
    }
}

#[async_trait]
impl CredentialSource for VaultCredentialSource {
    async fn resolve(&self, endpoint: &RedfishEndpoint) -> Result<Credentials, RedfishError> {
        let key = endpoint
            .credentials_ref
            .as_deref()
            .ok_or_else(|| RedfishError::NoCredentials(endpoint.id.as_str().to_string()))?;
        (self.lookup)(key)
    }
}

/// A component's reported Redfish `PowerState`, normalized case-insensitively
/// (§4.2 `ResourcePowerStateChanged`: `"off"` and `"Off"` are the same
/// signal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "on" => Some(PowerState::On),
            "off" => Some(PowerState::Off),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PowerStateBody {
    #[serde(rename = "PowerState")]
    power_state: Option<String>,
}

/// Outbound Redfish GET, abstracted behind a trait so the event parsers
/// (hsm-events) and the Polling Scheduler (hsm-engine) can be tested
/// against a mock instead of a live BMC (§6 "Outbound Redfish").
#[async_trait]
pub trait RedfishTransport: Send + Sync + 'static {
    /// GET `<fqdn><uri>` with HTTP basic auth and return the decoded JSON
    /// body. Retries are the implementation's responsibility (§6:
    /// "Retry policy: up to 3 attempts with backoff handled by the Redfish
    /// client").
    async fn get(&self, fqdn: &str, uri: &str, credentials: &Credentials) -> Result<serde_json::Value, RedfishError>;

    /// Convenience wrapper used by the `AlertSystemPower` parser and the
    /// Polling Scheduler: GET `uri` and extract `PowerState`, failing with
    /// `RedfishNoInfo` if the field is absent or unrecognized.
    async fn power_state(
        &self,
        fqdn: &str,
        uri: &str,
        credentials: &Credentials,
    ) -> Result<PowerState, RedfishError> {
        let body = self.get(fqdn, uri, credentials).await?;
        let parsed: PowerStateBody = serde_json::from_value(body).map_err(|_| RedfishError::RedfishNoInfo {
            fqdn: fqdn.to_string(),
            uri: uri.to_string(),
            field: "PowerState".to_string(),
        })?;
        parsed
            .power_state
            .as_deref()
            .and_then(PowerState::parse)
            .ok_or_else(|| RedfishError::RedfishNoInfo {
                fqdn: fqdn.to_string(),
                uri: uri.to_string(),
                field: "PowerState".to_string(),
            })
    }
}

/// Real [`RedfishTransport`] backed by `reqwest`, used outside tests.
pub struct HttpRedfishTransport {
    client: reqwest::Client,
    max_attempts: u32,
}

impl HttpRedfishTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a fixed timeout");
        Self { client, max_attempts: 3 }
    }
}

#[async_trait]
impl RedfishTransport for HttpRedfishTransport {
    async fn get(&self, fqdn: &str, uri: &str, credentials: &Credentials) -> Result<serde_json::Value, RedfishError> {
        let url = format!("{fqdn}{uri}");
        let mut last_err = None;
        for attempt in 1..=self.max_attempts {
            let result = self
                .client
                .get(&url)
                .basic_auth(&credentials.username, Some(&credentials.password))
                .send()
                .await
                .and_then(|resp| resp.error_for_status());

            match result {
                Ok(resp) => {
                    return resp.json::<serde_json::Value>().await.map_err(|source| RedfishError::RedfishFail {
                        fqdn: fqdn.to_string(),
                        uri: uri.to_string(),
                        source,
                    });
                }
                Err(e) => {
                    warn!(%url, attempt, error = %e, "redfish GET failed");
                    last_err = Some(e);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
                    }
                }
            }
        }
        debug!(%url, "redfish GET exhausted retries");
        Err(RedfishError::RedfishFail {
            fqdn: fqdn.to_string(),
            uri: uri.to_string(),
            source: last_err.expect("loop ran at least once"),
        })
    }
}
