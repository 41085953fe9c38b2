use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hsm_domain::{Flag, Job, JobStatus, JobType, State, Update, UpdatePayload, XName};
use hsm_redfish::{CredentialSource, PowerState, RedfishTransport};
use hsm_store::Persistence;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::component_index::ComponentEndpointIndex;
use crate::error::EngineError;
use crate::notification::NotificationDispatcher;
use crate::side_effects;
use crate::transition::StateEngine;

#[derive(Debug, Clone, Copy)]
pub struct PollingConfig {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub keep_alive_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { initial_delay: Duration::from_secs(30), interval: Duration::from_secs(10), keep_alive_interval: Duration::from_secs(30) }
    }
}

/// Per-job cancel signal. Buffered to capacity 1 per Design Notes on the
/// polling/keep-alive pair: an unbuffered channel would let a cancel race a
/// tick's own send and deadlock the sender.
struct JobHandle {
    cancel: mpsc::Sender<()>,
}

#[derive(Default)]
struct Registry {
    by_job_id: HashMap<String, JobHandle>,
    by_component: HashMap<XName, String>,
}

impl Registry {
    fn insert(&mut self, component_id: XName, job_id: String, handle: JobHandle) {
        self.by_component.insert(component_id, job_id.clone());
        self.by_job_id.insert(job_id, handle);
    }

    fn job_for(&self, component_id: &XName) -> Option<String> {
        self.by_component.get(component_id).cloned()
    }

    fn remove(&mut self, job_id: &str) -> Option<JobHandle> {
        if let Some(component) = self.by_component.iter().find(|(_, j)| j.as_str() == job_id).map(|(c, _)| c.clone()) {
            self.by_component.remove(&component);
        }
        self.by_job_id.remove(job_id)
    }
}

/// Polling Scheduler (§4.7): when a component enters `Standby`, polls
/// its Redfish power endpoint until the BMC confirms `Off`, bridging lost
/// power-off events. Maintains a dual-index job registry (by job ID and by
/// component ID) behind one mutex, matching the store-layer pattern for
/// avoiding lookup races between the two (§9 Design Notes).
pub struct PollingScheduler {
    store: Arc<dyn Persistence>,
    index: Arc<ComponentEndpointIndex>,
    redfish: Arc<dyn RedfishTransport>,
    credentials: Arc<dyn CredentialSource>,
    engine: Arc<StateEngine>,
    dispatcher: Arc<NotificationDispatcher>,
    config: PollingConfig,
    registry: Mutex<Registry>,
}

impl PollingScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Persistence>,
        index: Arc<ComponentEndpointIndex>,
        redfish: Arc<dyn RedfishTransport>,
        credentials: Arc<dyn CredentialSource>,
        engine: Arc<StateEngine>,
        dispatcher: Arc<NotificationDispatcher>,
        config: PollingConfig,
    ) -> Arc<Self> {
        Arc::new(Self { store, index, redfish, credentials, engine, dispatcher, config, registry: Mutex::new(Registry::default()) })
    }

    /// Drives §4.2 side effects #2/#3: start a job for every ID that
    /// just entered `Standby` (unless one is already active for it), cancel
    /// any active job for every ID that just left it.
    pub async fn handle_transition(self: &Arc<Self>, outcome: &crate::transition::TransitionOutcome) -> Result<(), EngineError> {
        for id in &outcome.entered_standby {
            self.start_if_needed(id.clone()).await?;
        }
        for id in &outcome.left_standby {
            self.cancel_for_component(id).await?;
        }
        Ok(())
    }

    /// Register and start the polling/keep-alive task pair for `component_id`,
    /// unless one is already running.
    pub async fn start_if_needed(self: &Arc<Self>, component_id: XName) -> Result<(), EngineError> {
        {
            let registry = self.registry.lock().await;
            if registry.job_for(&component_id).is_some() {
                return Ok(());
            }
        }

        let job_id = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let job = Job {
            job_id: job_id.clone(),
            job_type: JobType::StateRedfishPoll,
            component_id: component_id.clone(),
            status: JobStatus::Queued,
            keep_alive_interval_secs: self.config.keep_alive_interval.as_secs(),
            last_keep_alive: now,
            data: serde_json::Value::Null,
        };
        self.store.put_job(job).await?;

        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        {
            let mut registry = self.registry.lock().await;
            registry.insert(component_id.clone(), job_id.clone(), JobHandle { cancel: cancel_tx.clone() });
        }

        let poller = self.clone();
        let poll_job_id = job_id.clone();
        let poll_component = component_id.clone();
        tokio::spawn(async move {
            poller.run_poll_loop(poll_job_id, poll_component, cancel_rx).await;
        });

        let keeper = self.clone();
        tokio::spawn(async move {
            keeper.run_keep_alive_loop(job_id, component_id, cancel_tx).await;
        });

        Ok(())
    }

    async fn run_poll_loop(self: Arc<Self>, job_id: String, component_id: XName, mut cancel_rx: mpsc::Receiver<()>) {
        tokio::time::sleep(self.config.initial_delay).await;
        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    debug!(job_id, component = component_id.as_str(), "poll job cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.config.interval) => {
                    if let Err(e) = self.tick(&job_id, &component_id).await {
                        warn!(job_id, component = component_id.as_str(), error = %e, "poll tick failed, marking job error");
                        if let Ok(Some(mut job)) = self.store.get_job(&job_id).await {
                            job.status = JobStatus::Error;
                            let _ = self.store.put_job(job).await;
                        }
                    }
                    // A tick that detected Off already ran the side effect
                    // that cancels and deregisters this very job; a missing
                    // registration here means stop ticking a dead job.
                    let still_registered = {
                        let registry = self.registry.lock().await;
                        registry.job_for(&component_id).as_deref() == Some(job_id.as_str())
                    };
                    if !still_registered {
                        return;
                    }
                }
            }
        }
    }

    async fn run_keep_alive_loop(self: Arc<Self>, job_id: String, component_id: XName, cancel_tx: mpsc::Sender<()>) {
        loop {
            tokio::time::sleep(self.config.keep_alive_interval).await;
            let component = self.store.get_component(&component_id).await.ok().flatten();
            let still_standby = matches!(&component, Some(c) if c.state == State::Standby);
            if !still_standby {
                // Left Standby through another path, or the component
                // disappeared entirely — stop the poll loop too.
                let _ = cancel_tx.try_send(());
                self.deregister(&job_id).await;
                return;
            }
            match self.store.get_job(&job_id).await {
                Ok(Some(mut job)) => {
                    job.status = JobStatus::InProgress;
                    job.last_keep_alive = Utc::now();
                    let _ = self.store.put_job(job).await;
                }
                _ => return,
            }
        }
    }

    async fn tick(self: &Arc<Self>, job_id: &str, component_id: &XName) -> Result<(), EngineError> {
        let ce = self
            .index
            .get_by_component(component_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(component_id.as_str().to_string()))?;
        let endpoint = self
            .store
            .get_endpoint(&ce.endpoint_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(ce.endpoint_id.as_str().to_string()))?;
        let credentials = self.credentials.resolve(&endpoint).await?;
        let power = self.redfish.power_state(&endpoint.fqdn, &ce.odata_id, &credentials).await?;

        if power == PowerState::Off {
            let update = Update {
                component_ids: vec![component_id.clone()],
                payload: UpdatePayload::StateData { state: State::Off, flag: Some(Flag::OK) },
                force: false,
            };
            side_effects::apply_update(&self.engine, &self.dispatcher, self, update).await?;
        }
        let _ = job_id;
        Ok(())
    }

    pub async fn cancel_for_component(&self, component_id: &XName) -> Result<(), EngineError> {
        let job_id = {
            let registry = self.registry.lock().await;
            registry.job_for(component_id)
        };
        let Some(job_id) = job_id else { return Ok(()) };
        self.cancel_job(&job_id).await
    }

    pub async fn cancel_job(&self, job_id: &str) -> Result<(), EngineError> {
        let handle = {
            let mut registry = self.registry.lock().await;
            registry.remove(job_id)
        };
        if let Some(handle) = handle {
            let _ = handle.cancel.try_send(());
        }
        self.store.delete_job(job_id).await?;
        Ok(())
    }

    async fn deregister(&self, job_id: &str) {
        let mut registry = self.registry.lock().await;
        registry.remove(job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hsm_domain::{Component, ComponentEndpoint, ComponentType, RedfishEndpoint};
    use hsm_redfish::{Credentials, RedfishError};
    use hsm_store::InMemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    fn xn(s: &str) -> XName {
        XName::normalize(s).unwrap()
    }

    struct FixedCredentials;
    #[async_trait]
    impl CredentialSource for FixedCredentials {
        async fn resolve(&self, _endpoint: &RedfishEndpoint) -> Result<Credentials, RedfishError> {
            Ok(Credentials { username: "admin".to_string(), password: "pw".to_string() })
        }
    }

    struct ScriptedTransport {
        calls: AtomicU32,
    }
    #[async_trait]
    impl RedfishTransport for ScriptedTransport {
        async fn get(&self, _fqdn: &str, _uri: &str, _credentials: &Credentials) -> Result<serde_json::Value, RedfishError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let state = if n == 0 { "On" } else { "Off" };
            Ok(serde_json::json!({ "PowerState": state }))
        }
    }

    struct NullNotificationTransport;
    #[async_trait]
    impl crate::notification::NotificationTransport for NullNotificationTransport {
        async fn post(&self, _url: &str, _payload: &crate::notification::NotificationPayload) -> bool {
            true
        }
    }

    async fn seed(store: &InMemoryStore, id: &XName, endpoint_id: &XName, state: State) {
        let mut c = Component::new(id.clone(), ComponentType::Node, Utc::now());
        c.state = state;
        store.put_component(c).await.unwrap();
        store
            .put_component_endpoint(ComponentEndpoint {
                id: id.clone(),
                endpoint_id: endpoint_id.clone(),
                odata_id: "/redfish/v1/Systems/Self".to_string(),
                redfish_info: serde_json::Value::Null,
            })
            .await
            .unwrap();
        store
            .put_endpoint(RedfishEndpoint {
                id: endpoint_id.clone(),
                fqdn: "bmc.example".to_string(),
                credentials_ref: None,
                discovery_status: hsm_domain::DiscoveryStatus::DiscoverOK,
                last_discovery_at: None,
                enabled: true,
            })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn tick_detects_off_and_cancels_its_own_job() {
        let store = Arc::new(InMemoryStore::new());
        let id = xn("x1c4s4b0n0");
        let endpoint_id = xn("x1c4s4b0");
        seed(&store, &id, &endpoint_id, State::Standby).await;

        let index = Arc::new(ComponentEndpointIndex::new(store.clone()));
        let redfish = Arc::new(ScriptedTransport { calls: AtomicU32::new(0) });
        let credentials = Arc::new(FixedCredentials);
        let engine = Arc::new(StateEngine::new(store.clone()));
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), Arc::new(NullNotificationTransport)));
        let config = PollingConfig {
            initial_delay: StdDuration::from_millis(0),
            interval: StdDuration::from_millis(10),
            keep_alive_interval: StdDuration::from_secs(3600),
        };
        let scheduler = PollingScheduler::new(store.clone(), index, redfish, credentials, engine, dispatcher, config);

        scheduler.start_if_needed(id.clone()).await.unwrap();
        tokio::time::advance(StdDuration::from_millis(15)).await;
        tokio::time::advance(StdDuration::from_millis(15)).await;
        tokio::task::yield_now().await;

        let registry = scheduler.registry.lock().await;
        assert!(registry.job_for(&id).is_none());
    }

    #[tokio::test]
    async fn start_if_needed_is_idempotent_per_component() {
        let store = Arc::new(InMemoryStore::new());
        let id = xn("x1c4s4b0n0");
        let endpoint_id = xn("x1c4s4b0");
        seed(&store, &id, &endpoint_id, State::Standby).await;

        let index = Arc::new(ComponentEndpointIndex::new(store.clone()));
        let redfish = Arc::new(ScriptedTransport { calls: AtomicU32::new(0) });
        let credentials = Arc::new(FixedCredentials);
        let engine = Arc::new(StateEngine::new(store.clone()));
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), Arc::new(NullNotificationTransport)));
        let config = PollingConfig {
            initial_delay: StdDuration::from_secs(3600),
            interval: StdDuration::from_secs(3600),
            keep_alive_interval: StdDuration::from_secs(3600),
        };
        let scheduler = PollingScheduler::new(store.clone(), index, redfish, credentials, engine, dispatcher, config);

        scheduler.start_if_needed(id.clone()).await.unwrap();
        let first_job = scheduler.registry.lock().await.job_for(&id);
        scheduler.start_if_needed(id.clone()).await.unwrap();
        let second_job = scheduler.registry.lock().await.job_for(&id);

        assert_eq!(first_job, second_job);
        assert!(store.get_job_by_component(&id).await.unwrap().is_some());
    }
}
