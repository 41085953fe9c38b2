pub mod driver;
pub mod error;
pub mod local;

pub use driver::{
    CredentialSource, Credentials, HttpRedfishTransport, PowerState, RecordCredentialSource,
    RedfishTransport, VaultCredentialSource,
};
pub use error::RedfishError;
pub use local::LocalTransport;
