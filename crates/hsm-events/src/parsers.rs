use crate::error::EventError;
use crate::model::ProcessedEvent;

/// The power-related effect of one event record, resolved from its
/// message arguments (and, failing that, its origin-of-condition).
///
/// `power_on = None` only happens for [`crate::dispatch::ParserKind::AlertSystemPower`]
/// when neither an `on`/`off` argument nor a recognizable power-state
/// argument was present — the caller (the event-processing stage in
/// `hsm-engine`) must then fetch the component's live `PowerState` over
/// Redfish to resolve it (§4.1 "AlertSystemPower").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerIntent {
    pub uri: String,
    pub power_on: Option<bool>,
}

/// Scan `args` for a `/`-prefixed URI and an `on`/`off` power-state
/// argument, in either order (§4.1). `PoweringOn`/`PoweringOff` are
/// recognized-but-unsupported transitional states and short-circuit with
/// `IgnoredStateChange`. Any other unrecognized argument is ignored.
fn parse_args(args: &[String]) -> Result<(Option<String>, Option<bool>), EventError> {
    let mut uri = None;
    let mut power_on = None;
    for arg in args {
        let trimmed = arg.trim();
        if trimmed.starts_with('/') {
            uri = Some(trimmed.to_string());
            continue;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "on" => power_on = Some(true),
            "off" => power_on = Some(false),
            "poweringon" | "poweringoff" => {
                return Err(EventError::IgnoredStateChange(trimmed.to_string()));
            }
            _ => {}
        }
    }
    Ok((uri, power_on))
}

fn resolve_uri(args: &[String], origin: Option<&str>) -> Result<(String, Option<bool>), EventError> {
    let (uri, power_on) = parse_args(args)?;
    let uri = uri.or_else(|| origin.map(str::to_string)).ok_or(EventError::MissingUri)?;
    Ok((uri, power_on))
}

/// §4.1 "ResourcePowerStateChanged semantics": requires a concrete
/// `on`/`off` argument — anything else (including an ignored transitional
/// state) drops the event.
pub fn parse_resource_power_state_changed(event: &ProcessedEvent) -> Result<PowerIntent, EventError> {
    let (uri, power_on) = resolve_uri(&event.message_args, event.origin_of_condition.as_deref())?;
    let power_on = power_on.ok_or_else(|| EventError::IgnoredStateChange("no on/off argument present".to_string()))?;
    Ok(PowerIntent { uri, power_on: Some(power_on) })
}

/// The message key itself (`SystemPowerOn`/`ServerPoweredOn`) dictates the
/// direction; only the URI needs resolving.
pub fn parse_alert_system_power_on(event: &ProcessedEvent) -> Result<PowerIntent, EventError> {
    let (uri, _) = resolve_uri(&event.message_args, event.origin_of_condition.as_deref())?;
    Ok(PowerIntent { uri, power_on: Some(true) })
}

pub fn parse_alert_system_power_off(event: &ProcessedEvent) -> Result<PowerIntent, EventError> {
    let (uri, _) = resolve_uri(&event.message_args, event.origin_of_condition.as_deref())?;
    Ok(PowerIntent { uri, power_on: Some(false) })
}

/// §4.1 "AlertSystemPower (vendor variant)": same URI/state parsing,
/// but `power_on: None` is a valid result — the caller must fetch the
/// component's live `PowerState` to resolve it.
pub fn parse_alert_system_power(event: &ProcessedEvent) -> Result<PowerIntent, EventError> {
    let (uri, power_on) = resolve_uri(&event.message_args, event.origin_of_condition.as_deref())?;
    Ok(PowerIntent { uri, power_on })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageId;

    fn event(args: &[&str], origin: Option<&str>) -> ProcessedEvent {
        ProcessedEvent {
            endpoint_id: None,
            message_id: MessageId::parse("ResourceEvent.1.0.ResourcePowerStateChanged"),
            severity: None,
            origin_of_condition: origin.map(str::to_string),
            message_args: args.iter().map(|s| s.to_string()).collect(),
            sub_labels: Vec::new(),
        }
    }

    #[test]
    fn accepts_args_in_either_order() {
        let e1 = event(&["/redfish/v1/Chassis/Blade4", "Off"], None);
        let e2 = event(&["Off", "/redfish/v1/Chassis/Blade4"], None);
        assert_eq!(parse_resource_power_state_changed(&e1).unwrap(), parse_resource_power_state_changed(&e2).unwrap());
    }

    #[test]
    fn falls_back_to_origin_of_condition_for_uri() {
        let e = event(&["On"], Some("/redfish/v1/Systems/SelfOn"));
        let intent = parse_resource_power_state_changed(&e).unwrap();
        assert_eq!(intent.uri, "/redfish/v1/Systems/SelfOn");
        assert_eq!(intent.power_on, Some(true));
    }

    #[test]
    fn poweringon_is_ignored() {
        let e = event(&["/redfish/v1/Chassis/Blade4", "PoweringOn"], None);
        assert_eq!(parse_resource_power_state_changed(&e), Err(EventError::IgnoredStateChange("PoweringOn".to_string())));
    }

    #[test]
    fn missing_on_off_is_ignored_state_change() {
        let e = event(&["/redfish/v1/Chassis/Blade4"], None);
        assert!(matches!(parse_resource_power_state_changed(&e), Err(EventError::IgnoredStateChange(_))));
    }

    #[test]
    fn vendor_alert_without_power_state_needs_fetch() {
        let e = event(&["/redfish/v1/Systems/SelfOn"], None);
        let intent = parse_alert_system_power(&e).unwrap();
        assert_eq!(intent.power_on, None);
        assert_eq!(intent.uri, "/redfish/v1/Systems/SelfOn");
    }

    #[test]
    fn missing_uri_is_an_error() {
        let e = event(&["On"], None);
        assert_eq!(parse_resource_power_state_changed(&e), Err(EventError::MissingUri));
    }
}
