use std::sync::Arc;

use hsm_engine::{ComponentEndpointIndex, EventPipeline, NotificationDispatcher, PollingScheduler, ReservationManager, StateEngine};
use hsm_store::Persistence;

use crate::auth::AuthVerifier;

/// Everything a handler needs, gathered once at startup (§6). Handlers
/// never reach into the store directly for anything the engine layer
/// already owns — one `hsm-engine` call per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Persistence>,
    pub index: Arc<ComponentEndpointIndex>,
    pub engine: Arc<StateEngine>,
    pub reservations: Arc<ReservationManager>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub polling: Arc<PollingScheduler>,
    pub pipeline: Arc<EventPipeline>,
    pub auth: Arc<dyn AuthVerifier>,
}
