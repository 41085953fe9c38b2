use std::sync::Arc;

use chrono::Utc;
use hsm_domain::{DomainError, Flag, State, TriggerType, Update, UpdatePayload, UpdateType, XName};
use hsm_store::Persistence;
use tracing::{debug, warn};

use crate::error::EngineError;

/// What a successful [`StateEngine::apply_update`] actually did, enough for
/// a caller to drive the side effects §4.2 describes without
/// re-deriving them from the raw `Update`.
#[derive(Debug, Clone, Default)]
pub struct TransitionOutcome {
    pub update_type: Option<UpdateType>,
    /// IDs whose stored value actually changed — the idempotent subset of
    /// the input set.
    pub changed: Vec<XName>,
    /// IDs among `changed` whose `state` transitioned into `Standby`.
    pub entered_standby: Vec<XName>,
    /// IDs among `changed` whose `state` transitioned out of `Standby`.
    pub left_standby: Vec<XName>,
    /// The trigger a notification should fire under for this update, or
    /// `None` for `FlagOnly`/`NID` (§4.2 side effect 1). Computed once
    /// from the payload rather than per-component, since it's the same for
    /// every id in one `Update`.
    pub notify_trigger: Option<TriggerType>,
    /// The new value to route notifications by, case-folded.
    pub notify_value: Option<String>,
    /// Set alongside a `Role` update when `sub_role` was also provided —
    /// the dispatcher routes this as a second, independent `SubRole`
    /// trigger (§4.5 trigger types).
    pub notify_sub_role: Option<String>,
}

fn update_type_of(payload: &UpdatePayload) -> UpdateType {
    match payload {
        UpdatePayload::StateData { .. } => UpdateType::StateData,
        UpdatePayload::FlagOnly { .. } => UpdateType::FlagOnly,
        UpdatePayload::Enabled { .. } => UpdateType::Enabled,
        UpdatePayload::SoftwareStatus { .. } => UpdateType::SoftwareStatus,
        UpdatePayload::Role { .. } => UpdateType::Role,
        UpdatePayload::Nid { .. } => UpdateType::Nid,
    }
}

/// The `(trigger, value, sub_role)` a successful update of `payload` should
/// notify under. `None` trigger means no notification (§4.2: "unless
/// the update type is `FlagOnly` or `NID`").
fn notify_fields_of(payload: &UpdatePayload) -> (Option<TriggerType>, Option<String>, Option<String>) {
    match payload {
        UpdatePayload::StateData { state, .. } => (Some(TriggerType::State), Some(state.to_string().to_lowercase()), None),
        UpdatePayload::Enabled { enabled } => (Some(TriggerType::Enabled), Some(enabled.to_string()), None),
        UpdatePayload::SoftwareStatus { software_status } => {
            (Some(TriggerType::SoftwareStatus), Some(software_status.0.to_lowercase()), None)
        }
        UpdatePayload::Role { role, sub_role } => {
            (Some(TriggerType::Role), Some(role.0.to_lowercase()), sub_role.as_ref().map(|s| s.0.to_lowercase()))
        }
        UpdatePayload::FlagOnly { .. } | UpdatePayload::Nid { .. } => (None, None, None),
    }
}

/// State Transition Engine (§4.2): applies an [`Update`] to one or more
/// components, enforcing the legal-transition matrix unless `force` is set,
/// and reporting only the IDs whose stored value actually changed.
pub struct StateEngine {
    store: Arc<dyn Persistence>,
}

impl StateEngine {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// Apply `update` to every component it names. Persistence failures and
    /// a malformed request abort before any write (§4.2 "Failure
    /// semantics"); everything else — not-found IDs, illegal transitions
    /// under `force=false` — is a non-error omission from the changed set.
    pub async fn apply_update(&self, update: Update) -> Result<TransitionOutcome, EngineError> {
        if update.component_ids.is_empty() {
            return Err(DomainError::NoIds.into());
        }
        let update_type = update_type_of(&update.payload);
        if update_type == UpdateType::Nid && update.component_ids.len() > 1 {
            return Err(DomainError::TooManyIds.into());
        }

        let now = Utc::now();
        let (notify_trigger, notify_value, notify_sub_role) = notify_fields_of(&update.payload);
        let mut outcome = TransitionOutcome {
            update_type: Some(update_type.clone()),
            notify_trigger,
            notify_value,
            notify_sub_role,
            ..Default::default()
        };
        let mut to_write = Vec::new();

        for id in &update.component_ids {
            let mut component = match self.store.get_component(id).await? {
                Some(c) => c,
                None => {
                    warn!(id = id.as_str(), "update target not found, omitted from changed set");
                    continue;
                }
            };
            let old_state = component.state;
            let mut did_change = false;
            let mut new_state = old_state;

            match &update.payload {
                UpdatePayload::StateData { state, flag } => {
                    new_state = *state;
                    let new_flag = flag.unwrap_or(Flag::OK);
                    if !update.force && !component.state.legal_transition(new_state) {
                        debug!(id = id.as_str(), from = %component.state, to = %new_state, "illegal transition, omitted");
                        continue;
                    }
                    if component.state != new_state || component.flag != new_flag {
                        component.state = new_state;
                        component.flag = new_flag;
                        did_change = true;
                    }
                }
                UpdatePayload::FlagOnly { flag } => {
                    if component.flag != *flag {
                        component.flag = *flag;
                        did_change = true;
                    }
                }
                UpdatePayload::Enabled { enabled } => {
                    if component.enabled != *enabled {
                        component.enabled = *enabled;
                        did_change = true;
                    }
                }
                UpdatePayload::SoftwareStatus { software_status } => {
                    if &component.software_status != software_status {
                        component.software_status = software_status.clone();
                        did_change = true;
                    }
                }
                UpdatePayload::Role { role, sub_role } => {
                    if component.role.as_ref() != Some(role) || component.sub_role.as_ref() != sub_role.as_ref() {
                        component.role = Some(role.clone());
                        component.sub_role = sub_role.clone();
                        did_change = true;
                    }
                }
                UpdatePayload::Nid { nid } => {
                    if component.nid != Some(*nid) {
                        component.nid = Some(*nid);
                        did_change = true;
                    }
                }
            }

            if !did_change {
                continue;
            }

            component.meta.touch(now);
            outcome.changed.push(id.clone());
            if old_state != State::Standby && new_state == State::Standby {
                outcome.entered_standby.push(id.clone());
            } else if old_state == State::Standby && new_state != State::Standby {
                outcome.left_standby.push(id.clone());
            }
            to_write.push(component);
        }

        if !to_write.is_empty() {
            self.store.bulk_put_components(to_write).await?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_domain::{Component, ComponentType, Role, SoftwareStatus};
    use hsm_store::InMemoryStore;

    fn xn(s: &str) -> XName {
        XName::normalize(s).unwrap()
    }

    async fn seeded(id: &str, state: State) -> (Arc<InMemoryStore>, XName) {
        let store = Arc::new(InMemoryStore::new());
        let id = xn(id);
        let mut c = Component::new(id.clone(), ComponentType::Node, Utc::now());
        c.state = state;
        store.put_component(c).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn legal_transition_is_applied_and_reported_changed() {
        let (store, id) = seeded("x1c4s4b0n0", State::On).await;
        let engine = StateEngine::new(store.clone());
        let outcome = engine
            .apply_update(Update {
                component_ids: vec![id.clone()],
                payload: UpdatePayload::StateData { state: State::Off, flag: None },
                force: false,
            })
            .await
            .unwrap();
        assert_eq!(outcome.changed, vec![id.clone()]);
        let stored = store.get_component(&id).await.unwrap().unwrap();
        assert_eq!(stored.state, State::Off);
        assert_eq!(stored.meta.generation, 1);
    }

    #[tokio::test]
    async fn illegal_transition_without_force_is_omitted_not_errored() {
        let (store, id) = seeded("x1c4s4b0n0", State::Empty).await;
        let engine = StateEngine::new(store.clone());
        let outcome = engine
            .apply_update(Update {
                component_ids: vec![id.clone()],
                payload: UpdatePayload::StateData { state: State::Standby, flag: None },
                force: false,
            })
            .await
            .unwrap();
        assert!(outcome.changed.is_empty());
        let stored = store.get_component(&id).await.unwrap().unwrap();
        assert_eq!(stored.state, State::Empty);
    }

    #[tokio::test]
    async fn force_bypasses_the_legal_transition_matrix() {
        let (store, id) = seeded("x1c4s4b0n0", State::Empty).await;
        let engine = StateEngine::new(store.clone());
        let outcome = engine
            .apply_update(Update {
                component_ids: vec![id.clone()],
                payload: UpdatePayload::StateData { state: State::Standby, flag: None },
                force: true,
            })
            .await
            .unwrap();
        assert_eq!(outcome.changed, vec![id]);
    }

    #[tokio::test]
    async fn idempotent_write_is_not_reported_as_changed() {
        let (store, id) = seeded("x1c4s4b0n0", State::On).await;
        let engine = StateEngine::new(store);
        let outcome = engine
            .apply_update(Update {
                component_ids: vec![id],
                payload: UpdatePayload::StateData { state: State::On, flag: None },
                force: false,
            })
            .await
            .unwrap();
        assert!(outcome.changed.is_empty());
    }

    #[tokio::test]
    async fn transition_into_standby_is_tracked() {
        let (store, id) = seeded("x1c4s4b0n0", State::On).await;
        let engine = StateEngine::new(store);
        let outcome = engine
            .apply_update(Update {
                component_ids: vec![id.clone()],
                payload: UpdatePayload::StateData { state: State::Standby, flag: None },
                force: false,
            })
            .await
            .unwrap();
        assert_eq!(outcome.entered_standby, vec![id]);
        assert!(outcome.left_standby.is_empty());
    }

    #[tokio::test]
    async fn transition_out_of_standby_is_tracked() {
        let (store, id) = seeded("x1c4s4b0n0", State::Standby).await;
        let engine = StateEngine::new(store);
        let outcome = engine
            .apply_update(Update {
                component_ids: vec![id.clone()],
                payload: UpdatePayload::StateData { state: State::Off, flag: None },
                force: false,
            })
            .await
            .unwrap();
        assert_eq!(outcome.left_standby, vec![id]);
        assert!(outcome.entered_standby.is_empty());
    }

    #[tokio::test]
    async fn nid_update_rejects_more_than_one_id() {
        let (store, id) = seeded("x1c4s4b0n0", State::On).await;
        let engine = StateEngine::new(store);
        let err = engine
            .apply_update(Update {
                component_ids: vec![id.clone(), id],
                payload: UpdatePayload::Nid { nid: hsm_domain::Nid(7) },
                force: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Domain(DomainError::TooManyIds)));
    }

    #[tokio::test]
    async fn empty_id_list_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let engine = StateEngine::new(store);
        let err = engine
            .apply_update(Update { component_ids: vec![], payload: UpdatePayload::Enabled { enabled: false }, force: false })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Domain(DomainError::NoIds)));
    }

    #[tokio::test]
    async fn role_update_changes_role_and_sub_role_together() {
        let (store, id) = seeded("x1c4s4b0n0", State::On).await;
        let engine = StateEngine::new(store.clone());
        engine
            .apply_update(Update {
                component_ids: vec![id.clone()],
                payload: UpdatePayload::Role { role: Role("Compute".to_string()), sub_role: None },
                force: false,
            })
            .await
            .unwrap();
        let stored = store.get_component(&id).await.unwrap().unwrap();
        assert_eq!(stored.role, Some(Role("Compute".to_string())));
    }

    #[tokio::test]
    async fn software_status_update_is_idempotent() {
        let (store, id) = seeded("x1c4s4b0n0", State::On).await;
        let engine = StateEngine::new(store.clone());
        engine
            .apply_update(Update {
                component_ids: vec![id.clone()],
                payload: UpdatePayload::SoftwareStatus { software_status: SoftwareStatus("booted".to_string()) },
                force: false,
            })
            .await
            .unwrap();
        let outcome = engine
            .apply_update(Update {
                component_ids: vec![id],
                payload: UpdatePayload::SoftwareStatus { software_status: SoftwareStatus("booted".to_string()) },
                force: false,
            })
            .await
            .unwrap();
        assert!(outcome.changed.is_empty());
    }
}
