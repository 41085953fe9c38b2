use thiserror::Error;

/// Upstream (§7) error kinds for the outbound Redfish path:
/// `RedfishFail` (transport-level failure), `RedfishNoInfo` (decodable
/// response missing the field we needed), `NoCredentials` /
/// `CredentialsStoreError` (Credentials kind).
#[derive(Debug, Error)]
pub enum RedfishError {
    #[error("redfish request to {fqdn}{uri} failed: {source}")]
    RedfishFail {
        fqdn: String,
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("redfish response from {fqdn}{uri} did not contain the expected field: {field}")]
    RedfishNoInfo { fqdn: String, uri: String, field: String },

    #[error("no credentials available for endpoint {0}")]
    NoCredentials(String),

    #[error("credential store error: {0}")]
    CredentialsStoreError(String),

    #[error("internal redfish client error: {0}")]
    Internal(String),
}
