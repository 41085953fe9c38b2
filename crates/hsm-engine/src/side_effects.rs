use std::sync::Arc;

use hsm_domain::{TriggerType, Update};

use crate::error::EngineError;
use crate::notification::NotificationDispatcher;
use crate::polling::PollingScheduler;
use crate::transition::{StateEngine, TransitionOutcome};

/// Applies `update` through the State Transition Engine and drives the two
/// side effects §4.2 attaches to every successful update: enqueue a
/// notification (unless the update type is `FlagOnly`/`NID`), and
/// start/cancel Polling Scheduler jobs for IDs crossing into or out of
/// `Standby`. Every write path — direct REST writes, the event pipeline,
/// and the poller's own tick — funnels through this one function so the
/// side effects apply the same way regardless of who changed the state.
pub async fn apply_update(
    engine: &StateEngine,
    dispatcher: &NotificationDispatcher,
    polling: &Arc<PollingScheduler>,
    update: Update,
) -> Result<TransitionOutcome, EngineError> {
    let outcome = engine.apply_update(update).await?;

    if !outcome.changed.is_empty() {
        if let Some(trigger) = outcome.notify_trigger {
            let value = outcome.notify_value.clone().unwrap_or_default();
            dispatcher.dispatch(outcome.changed.clone(), trigger, value).await?;
            if let Some(sub_role) = &outcome.notify_sub_role {
                debug_assert_eq!(trigger, TriggerType::Role);
                dispatcher.dispatch(outcome.changed.clone(), TriggerType::SubRole, sub_role.clone()).await?;
            }
        }
    }

    polling.handle_transition(&outcome).await?;
    Ok(outcome)
}
