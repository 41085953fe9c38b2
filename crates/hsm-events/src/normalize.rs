use hsm_domain::XName;

use crate::model::{Event, EventRecord, ProcessedEvent};

/// Resolve the endpoint-ID for one record out of the event-level and
/// record-level context fields (§4.1 "Decoding rules").
///
/// Each context is a colon-separated list. First pass: accept a
/// controller-type xname only if it is the *leading* field of either
/// context. Fallback pass: if neither yielded a controller xname, retry
/// accepting a controller xname *anywhere* in either context. Every field
/// that isn't the chosen endpoint-ID becomes a sub-label.
pub fn resolve_endpoint(event_context: Option<&str>, record_context: Option<&str>) -> (Option<XName>, Vec<String>) {
    let event_fields: Vec<&str> = event_context.map(split_context).unwrap_or_default();
    let record_fields: Vec<&str> = record_context.map(split_context).unwrap_or_default();

    let endpoint = leading_controller(&event_fields)
        .or_else(|| leading_controller(&record_fields))
        .or_else(|| any_controller(&event_fields))
        .or_else(|| any_controller(&record_fields));

    let sub_labels = event_fields
        .iter()
        .chain(record_fields.iter())
        .filter(|f| !f.is_empty())
        .filter(|f| match &endpoint {
            Some(x) => x.as_str() != XName::normalize(f).map(|n| n.as_str().to_string()).unwrap_or_default(),
            None => true,
        })
        .map(|f| f.to_string())
        .collect();

    (endpoint, sub_labels)
}

fn split_context(s: &str) -> Vec<&str> {
    s.split(':').collect()
}

fn leading_controller(fields: &[&str]) -> Option<XName> {
    let leading = fields.first()?;
    let x = XName::normalize(leading).ok()?;
    x.is_controller().then_some(x)
}

fn any_controller(fields: &[&str]) -> Option<XName> {
    fields.iter().find_map(|f| {
        let x = XName::normalize(f).ok()?;
        x.is_controller().then_some(x)
    })
}

/// Apply registry filtering and endpoint-ID resolution to every record of
/// `event`, producing the normalizer's `ProcessedEvent` output (§4.1).
/// Records whose registry is filtered are silently dropped from the
/// result; the caller is expected to log that at INFO per-record if it
/// wants visibility (kept out of this pure function so it stays testable
/// without a tracing subscriber).
pub fn normalize(event: &Event) -> Vec<(ProcessedEvent, FilterOutcome)> {
    event
        .records
        .iter()
        .map(|record| normalize_record(event.event_context.as_deref(), record))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Kept,
    FilteredRegistry,
}

fn normalize_record(event_context: Option<&str>, record: &EventRecord) -> (ProcessedEvent, FilterOutcome) {
    let outcome = if record.message_id.is_filtered_registry() { FilterOutcome::FilteredRegistry } else { FilterOutcome::Kept };
    let (endpoint_id, sub_labels) = resolve_endpoint(event_context, record.record_context.as_deref());
    (
        ProcessedEvent {
            endpoint_id,
            message_id: record.message_id.clone(),
            severity: record.severity.clone(),
            origin_of_condition: record.origin_of_condition.clone(),
            message_args: record.message_args.clone(),
            sub_labels,
        },
        outcome,
    )
}
