/// Sealed set of vendor-event parsers the core recognizes (§4.1
/// "Event action lookup" table). Design Notes call for "a sealed sum of
/// parser kinds plus a static table keyed by the normalized lookup
/// string", generalizing the source's string-keyed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    ResourcePowerStateChanged,
    AlertSystemPowerOn,
    AlertSystemPowerOff,
    AlertSystemPower,
}

/// One dispatch-table entry: `None` is a "nil" sentinel meaning "retry
/// with the next more-specific key" rather than "no parser".
type TableEntry = Option<ParserKind>;

/// Look up the entry for one of the four case-folded keys
/// (`messageID`, `messageID:registry`, `messageID:registry:major`,
/// `messageID:registry:major.minor`), or `None` if the key isn't
/// registered at all.
fn table_lookup(key: &str) -> Option<TableEntry> {
    use ParserKind::*;
    match key {
        "resourcepowerstatechanged" => Some(Some(ResourcePowerStateChanged)),
        "resourcepowerstatechanged:resourceevent" => Some(Some(ResourcePowerStateChanged)),
        "resourcepowerstatechanged:crayalerts" => Some(Some(ResourcePowerStateChanged)),
        "systempoweron" => Some(Some(AlertSystemPowerOn)),
        "serverpoweredon" => Some(Some(AlertSystemPowerOn)),
        "systempoweroff" => Some(Some(AlertSystemPowerOff)),
        "serverpoweredoff" => Some(Some(AlertSystemPowerOff)),
        "alert" => Some(Some(AlertSystemPower)),
        "powerstatuschange" => Some(Some(AlertSystemPower)),
        _ => None,
    }
}

/// Resolve a [`ParserKind`] for the four specificity-ordered lookup keys
/// of a message-id (§4.1): try the least-specific key first; a
/// registered-but-nil entry means retry at the next more-specific key; an
/// unregistered key means stop immediately with no parser.
pub fn resolve_parser(lookup_keys: &[String; 4]) -> Option<ParserKind> {
    for key in lookup_keys {
        match table_lookup(key) {
            Some(Some(kind)) => return Some(kind),
            Some(None) => continue,
            None => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageId;

    #[test]
    fn resource_power_state_changed_resolves_from_bare_message_id() {
        let mid = MessageId::parse("ResourceEvent.1.0.ResourcePowerStateChanged");
        assert_eq!(resolve_parser(&mid.lookup_keys()), Some(ParserKind::ResourcePowerStateChanged));
    }

    #[test]
    fn alert_system_power_on_variants_resolve() {
        let mid = MessageId::parse("Alert.1.0.SystemPowerOn");
        assert_eq!(resolve_parser(&mid.lookup_keys()), Some(ParserKind::AlertSystemPowerOn));
        let mid2 = MessageId::parse("Alert.1.0.ServerPoweredOn");
        assert_eq!(resolve_parser(&mid2.lookup_keys()), Some(ParserKind::AlertSystemPowerOn));
    }

    #[test]
    fn unrecognized_message_id_has_no_parser() {
        let mid = MessageId::parse("SomeRegistry.1.0.TotallyUnknownEvent");
        assert_eq!(resolve_parser(&mid.lookup_keys()), None);
    }

    #[test]
    fn generic_alert_resolves_to_vendor_variant() {
        let mid = MessageId::parse("Alert.1.0.PowerStatusChange");
        assert_eq!(resolve_parser(&mid.lookup_keys()), Some(ParserKind::AlertSystemPower));
    }
}
