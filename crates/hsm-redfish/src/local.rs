use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::driver::{Credentials, RedfishTransport};
use crate::error::RedfishError;

/// A stub [`RedfishTransport`] that serves canned JSON bodies keyed by
/// `<fqdn><uri>`, performing no I/O. A synthetic stand-in for the real
/// transport, used by tests and local demos instead of a live BMC.
#[derive(Default)]
pub struct LocalTransport {
    responses: Mutex<HashMap<String, serde_json::Value>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the body the transport will return for `<fqdn><uri>`.
    pub fn stub(&self, fqdn: &str, uri: &str, body: serde_json::Value) {
        self.responses.lock().expect("lock poisoned").insert(format!("{fqdn}{uri}"), body);
    }
}

#[async_trait]
impl RedfishTransport for LocalTransport {
    async fn get(&self, fqdn: &str, uri: &str, _credentials: &Credentials) -> Result<serde_json::Value, RedfishError> {
        let key = format!("{fqdn}{uri}");
        debug!(%key, "LocalTransport: get");
        self.responses
            .lock()
            .expect("lock poisoned")
            .get(&key)
            .cloned()
            .ok_or_else(|| RedfishError::RedfishNoInfo { fqdn: fqdn.to_string(), uri: uri.to_string(), field: "<stub>".to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::PowerState;
    use serde_json::json;

    fn creds() -> Credentials {
        Credentials { username: "root".into(), password: "hunter2".into() }
    }

    #[tokio::test]
    async fn returns_stubbed_body() {
        let transport = LocalTransport::new();
        transport.stub("https://bmc1", "/redfish/v1/Systems/Self", json!({"PowerState": "On"}));
        let body = transport.get("https://bmc1", "/redfish/v1/Systems/Self", &creds()).await.unwrap();
        assert_eq!(body["PowerState"], "On");
    }

    #[tokio::test]
    async fn power_state_parses_case_insensitively() {
        let transport = LocalTransport::new();
        transport.stub("https://bmc1", "/redfish/v1/Systems/Self", json!({"PowerState": "off"}));
        let state = transport.power_state("https://bmc1", "/redfish/v1/Systems/Self", &creds()).await.unwrap();
        assert_eq!(state, PowerState::Off);
    }

    #[tokio::test]
    async fn missing_stub_is_redfish_no_info() {
        let transport = LocalTransport::new();
        let err = transport.get("https://bmc1", "/redfish/v1/Systems/Self", &creds()).await.unwrap_err();
        assert!(matches!(err, RedfishError::RedfishNoInfo { .. }));
    }
}
