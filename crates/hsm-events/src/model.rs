use serde::Deserialize;

use crate::error::EventError;

/// Registries the normalizer drops outright before any other processing
/// (§4.1 "current filter-set: `CrayTelemetry`").
const FILTERED_REGISTRIES: &[&str] = &["craytelemetry"];

/// A decoded `(registry, version, messageID)` triple, extracted from a raw
/// Redfish `MessageId` field such as `ResourceEvent.1.0.ResourcePowerStateChanged`
/// or the shorter `Alert.1.0.PowerStatusChange`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageId {
    pub raw: String,
    pub registry: String,
    pub major: String,
    pub minor: String,
    pub key: String,
}

impl MessageId {
    /// Parse `raw` by splitting on `.`: the first segment is the registry,
    /// the last is the message key, and (when present) the two segments in
    /// between are the major/minor version. Shorter forms like
    /// `Registry.Key` are accepted with an empty version.
    pub fn parse(raw: &str) -> Self {
        let parts: Vec<&str> = raw.split('.').collect();
        match parts.as_slice() {
            [] => MessageId { raw: raw.to_string(), registry: String::new(), major: String::new(), minor: String::new(), key: String::new() },
            [only] => MessageId { raw: raw.to_string(), registry: String::new(), major: String::new(), minor: String::new(), key: only.to_string() },
            [registry, key] => MessageId {
                raw: raw.to_string(),
                registry: registry.to_string(),
                major: String::new(),
                minor: String::new(),
                key: key.to_string(),
            },
            [registry, major, key] => MessageId {
                raw: raw.to_string(),
                registry: registry.to_string(),
                major: major.to_string(),
                minor: String::new(),
                key: key.to_string(),
            },
            [registry, major, minor, rest @ ..] => MessageId {
                raw: raw.to_string(),
                registry: registry.to_string(),
                major: major.to_string(),
                minor: minor.to_string(),
                key: rest.join("."),
            },
        }
    }

    pub fn version(&self) -> String {
        if self.minor.is_empty() {
            self.major.clone()
        } else {
            format!("{}.{}", self.major, self.minor)
        }
    }

    /// The four lookup keys of §4.1, least specific first, case-folded.
    pub fn lookup_keys(&self) -> [String; 4] {
        let key = self.key.to_ascii_lowercase();
        let registry = self.registry.to_ascii_lowercase();
        [
            key.clone(),
            format!("{key}:{registry}"),
            format!("{key}:{registry}:{}", self.major.to_ascii_lowercase()),
            format!("{key}:{registry}:{}", self.version().to_ascii_lowercase()),
        ]
    }

    pub fn is_filtered_registry(&self) -> bool {
        FILTERED_REGISTRIES.contains(&self.registry.to_ascii_lowercase().as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct WireOdataRef {
    #[serde(rename = "@odata.id")]
    odata_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WireEventRecord {
    #[serde(rename = "MessageId")]
    message_id: String,
    #[serde(rename = "MessageArgs", default)]
    message_args: Vec<String>,
    #[serde(rename = "OriginOfCondition", default)]
    origin_of_condition: Option<WireOdataRef>,
    #[serde(rename = "Context", default)]
    context: Option<String>,
    #[serde(rename = "Severity", default)]
    severity: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireEvent {
    #[serde(rename = "Context", default)]
    context: Option<String>,
    #[serde(rename = "Events", default)]
    events: Vec<WireEventRecord>,
}

/// One decoded Redfish event record, before registry filtering or endpoint
/// resolution.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub message_id: MessageId,
    pub message_args: Vec<String>,
    pub origin_of_condition: Option<String>,
    /// Record-level context field — one of the two colon-separated context
    /// strings the endpoint-ID resolver considers (§4.1).
    pub record_context: Option<String>,
    pub severity: Option<String>,
}

/// A fully-decoded event: the event-level context plus zero or more
/// records, each still carrying its own record-level context (§4.1
/// Input).
#[derive(Debug, Clone)]
pub struct Event {
    pub event_context: Option<String>,
    pub records: Vec<EventRecord>,
}

/// Decode a raw event payload (§4.1 Input). An empty payload is
/// `EmptyPayload`; anything that doesn't parse as the expected JSON shape
/// is `BusDecodeError`.
pub fn decode(payload: &[u8]) -> Result<Event, EventError> {
    if payload.is_empty() {
        return Err(EventError::EmptyPayload);
    }
    let wire: WireEvent = serde_json::from_slice(payload).map_err(|e| EventError::BusDecodeError(e.to_string()))?;
    let records = wire
        .events
        .into_iter()
        .map(|r| EventRecord {
            message_id: MessageId::parse(&r.message_id),
            message_args: r.message_args,
            origin_of_condition: r.origin_of_condition.map(|o| o.odata_id),
            record_context: r.context,
            severity: r.severity,
        })
        .collect();
    Ok(Event { event_context: wire.context, records })
}

/// One normalized record: registry-filter applied, endpoint-ID resolved
/// (§4.1 Output "`ProcessedEvent`"). `endpoint_id` is `None` when
/// neither context field yielded a controller xname — the caller drops
/// such records (logged, per §4.1 Failure semantics).
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    pub endpoint_id: Option<hsm_domain::XName>,
    pub message_id: MessageId,
    pub severity: Option<String>,
    pub origin_of_condition: Option<String>,
    pub message_args: Vec<String>,
    pub sub_labels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_rejected() {
        assert_eq!(decode(b""), Err(EventError::EmptyPayload));
    }

    #[test]
    fn message_id_parses_four_part_form() {
        let mid = MessageId::parse("ResourceEvent.1.0.ResourcePowerStateChanged");
        assert_eq!(mid.registry, "ResourceEvent");
        assert_eq!(mid.major, "1");
        assert_eq!(mid.minor, "0");
        assert_eq!(mid.key, "ResourcePowerStateChanged");
        assert_eq!(mid.version(), "1.0");
    }

    #[test]
    fn message_id_parses_short_form() {
        let mid = MessageId::parse("Alert");
        assert_eq!(mid.key, "Alert");
        assert_eq!(mid.registry, "");
    }

    #[test]
    fn lookup_keys_are_case_folded_and_ordered_least_specific_first() {
        let mid = MessageId::parse("ResourceEvent.1.0.ResourcePowerStateChanged");
        let keys = mid.lookup_keys();
        assert_eq!(keys[0], "resourcepowerstatechanged");
        assert_eq!(keys[1], "resourcepowerstatechanged:resourceevent");
        assert_eq!(keys[2], "resourcepowerstatechanged:resourceevent:1");
        assert_eq!(keys[3], "resourcepowerstatechanged:resourceevent:1.0");
    }

    #[test]
    fn craytelemetry_registry_is_filtered() {
        let mid = MessageId::parse("CrayTelemetry.1.0.SensorReading");
        assert!(mid.is_filtered_registry());
    }

    #[test]
    fn decode_extracts_records() {
        let payload = br#"{
            "Context": "x1c4b0",
            "Events": [
                {"MessageId": "ResourceEvent.1.0.ResourcePowerStateChanged",
                 "MessageArgs": ["/redfish/v1/Chassis/Blade4", "Off"],
                 "Severity": "OK"}
            ]
        }"#;
        let event = decode(payload).unwrap();
        assert_eq!(event.event_context.as_deref(), Some("x1c4b0"));
        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].message_id.key, "ResourcePowerStateChanged");
        assert_eq!(event.records[0].message_args, vec!["/redfish/v1/Chassis/Blade4", "Off"]);
    }
}
