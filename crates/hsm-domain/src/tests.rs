use crate::error::DomainError;
use crate::types::*;
use chrono::Utc;

#[test]
fn component_meta_touch_increments_generation() {
    let now = Utc::now();
    let mut meta = ComponentMeta::new(now);
    assert_eq!(meta.generation, 0);
    meta.touch(now);
    assert_eq!(meta.generation, 1);
    meta.touch(now);
    assert_eq!(meta.generation, 2);
}

#[test]
fn new_component_defaults_enabled_and_unknown() {
    let id = XName::normalize("x1c4s4b0n0").unwrap();
    let c = Component::new(id, ComponentType::Node, Utc::now());
    assert!(c.enabled);
    assert_eq!(c.state, State::Unknown);
    assert_eq!(c.flag, Flag::OK);
    assert!(!c.locked);
    assert!(!c.reservations_disabled);
}

#[test]
fn update_type_round_trips_through_json() {
    for ty in [
        UpdateType::StateData,
        UpdateType::FlagOnly,
        UpdateType::Enabled,
        UpdateType::SoftwareStatus,
        UpdateType::Role,
        UpdateType::Nid,
    ] {
        let json = serde_json::to_string(&ty).unwrap();
        let back: UpdateType = serde_json::from_str(&json).unwrap();
        assert_eq!(ty, back);
    }
}

#[test]
fn illegal_transition_error_names_both_states() {
    let err = DomainError::IllegalTransition {
        id: "x1c4s4b0n0".into(),
        from: State::Empty.to_string(),
        to: State::On.to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("Empty"));
    assert!(msg.contains("On"));
}

#[test]
fn bad_id_error_carries_original_string() {
    let err = XName::normalize("  ").unwrap_err();
    assert!(matches!(err, DomainError::BadId(_)));
}
