pub mod component_index;
pub mod error;
pub mod ingest;
pub mod notification;
pub mod polling;
pub mod reservation;
pub mod side_effects;
pub mod transition;
pub mod worker_pool;

pub use component_index::ComponentEndpointIndex;
pub use error::EngineError;
pub use ingest::{DiscoveryTrigger, EventPipeline, NoopDiscoveryTrigger};
pub use notification::{HttpNotificationTransport, NotificationDispatcher, NotificationPayload, NotificationTransport};
pub use polling::{PollingConfig, PollingScheduler};
pub use reservation::{BatchOutcome, ProcessingModel, ReservationManager};
pub use side_effects::apply_update;
pub use transition::{StateEngine, TransitionOutcome};
pub use worker_pool::WorkerPool;
