//! Event Normalizer (§4.1): decodes raw Redfish event payloads,
//! filters by registry, resolves each record's controller endpoint-ID, and
//! dispatches to the right vendor-power parser. Pure and synchronous — the
//! asynchronous pieces (resolving `(endpointID, URI)` to a component,
//! fetching live `PowerState` over Redfish, applying the resulting
//! `Update`) live in `hsm-engine`, which consumes this crate's types.

pub mod dispatch;
pub mod error;
pub mod model;
pub mod normalize;
pub mod parsers;

pub use dispatch::{resolve_parser, ParserKind};
pub use error::EventError;
pub use model::{decode, Event, EventRecord, MessageId, ProcessedEvent};
pub use normalize::{normalize, resolve_endpoint, FilterOutcome};
pub use parsers::{
    parse_alert_system_power, parse_alert_system_power_off, parse_alert_system_power_on,
    parse_resource_power_state_changed, PowerIntent,
};
