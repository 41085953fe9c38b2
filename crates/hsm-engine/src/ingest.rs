use std::sync::Arc;

use async_trait::async_trait;
use hsm_domain::{ComponentFilter, State, Update, UpdatePayload, XName};
use hsm_events::{
    decode, normalize, parse_alert_system_power, parse_alert_system_power_off, parse_alert_system_power_on,
    parse_resource_power_state_changed, resolve_parser, FilterOutcome, ParserKind, ProcessedEvent,
};
use hsm_graph::{propagation_targets, ComponentGraph};
use hsm_redfish::{CredentialSource, RedfishTransport};
use hsm_store::Persistence;
use tracing::{debug, info, warn};

use crate::component_index::ComponentEndpointIndex;
use crate::error::EngineError;
use crate::notification::NotificationDispatcher;
use crate::polling::PollingScheduler;
use crate::side_effects::apply_update;
use crate::transition::{StateEngine, TransitionOutcome};
use crate::worker_pool::WorkerPool;

/// Hook for the asynchronous follow-up work a successful power-state update
/// can trigger (§4.1 Propagation rules): re-running discovery against a
/// controller that just came back on, or refreshing one node's hardware
/// inventory. Discovery itself is out of scope here, so this is a pure
/// notification point — the default implementation does nothing, and a real
/// deployment plugs in whatever queues the actual discovery pass.
#[async_trait]
pub trait DiscoveryTrigger: Send + Sync + 'static {
    async fn trigger_discovery(&self, controller: &XName);
    async fn queue_hw_inventory_refresh(&self, node: &XName);
}

#[derive(Debug, Default, Clone)]
pub struct NoopDiscoveryTrigger;

#[async_trait]
impl DiscoveryTrigger for NoopDiscoveryTrigger {
    async fn trigger_discovery(&self, controller: &XName) {
        debug!(controller = controller.as_str(), "discovery trigger is a no-op");
    }

    async fn queue_hw_inventory_refresh(&self, node: &XName) {
        debug!(node = node.as_str(), "hw-inventory refresh trigger is a no-op");
    }
}

/// Wires together the Event Normalizer (hsm-events) and the State Transition
/// Engine side effects (§4.1 Propagation rules): decode each bus
/// message, resolve it to a component through the Component-Endpoint Index,
/// dispatch to the right vendor parser, fetch live power state over Redfish
/// when the parser can't determine it itself, compute the propagation set
/// through the component graph, and apply the resulting [`Update`].
///
/// Every record is handled independently. Per §4.1 Failure semantics:
/// a failure anywhere in the normalizer pipeline (decode, filter, endpoint
/// resolution, parser dispatch, component-index lookup, Redfish fetch) is
/// logged at INFO and drops that record with no retry. A failure in the
/// downstream state engine is logged at WARN without blocking the records
/// still queued behind it.
/// Default concurrent-record cap when a pipeline is built without an
/// explicit pool size (test helpers, mainly); `serve()` wires the
/// configured `--event-workers` value instead.
const DEFAULT_EVENT_WORKERS: usize = 8;

#[derive(Clone)]
pub struct EventPipeline {
    store: Arc<dyn Persistence>,
    index: Arc<ComponentEndpointIndex>,
    engine: Arc<StateEngine>,
    dispatcher: Arc<NotificationDispatcher>,
    polling: Arc<PollingScheduler>,
    redfish: Arc<dyn RedfishTransport>,
    credentials: Arc<dyn CredentialSource>,
    discovery: Arc<dyn DiscoveryTrigger>,
    pool: Arc<WorkerPool>,
}

impl EventPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Persistence>,
        index: Arc<ComponentEndpointIndex>,
        engine: Arc<StateEngine>,
        dispatcher: Arc<NotificationDispatcher>,
        polling: Arc<PollingScheduler>,
        redfish: Arc<dyn RedfishTransport>,
        credentials: Arc<dyn CredentialSource>,
        discovery: Arc<dyn DiscoveryTrigger>,
    ) -> Self {
        Self::with_pool_size(store, index, engine, dispatcher, polling, redfish, credentials, discovery, DEFAULT_EVENT_WORKERS)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_pool_size(
        store: Arc<dyn Persistence>,
        index: Arc<ComponentEndpointIndex>,
        engine: Arc<StateEngine>,
        dispatcher: Arc<NotificationDispatcher>,
        polling: Arc<PollingScheduler>,
        redfish: Arc<dyn RedfishTransport>,
        credentials: Arc<dyn CredentialSource>,
        discovery: Arc<dyn DiscoveryTrigger>,
        pool_size: usize,
    ) -> Self {
        Self {
            store,
            index,
            engine,
            dispatcher,
            polling,
            redfish,
            credentials,
            discovery,
            pool: Arc::new(WorkerPool::new(pool_size)),
        }
    }

    /// Decode `payload` (§4.1 Input) and process every record it
    /// contains. Does not return an error: a decode failure is itself a
    /// dropped event, logged and swallowed so the bus consumer loop never
    /// needs to decide whether to retry a malformed message.
    ///
    /// Each record is submitted to the event worker pool rather than
    /// processed inline: admission blocks once every slot is busy, which is
    /// what gives a bus reader (or this method's own caller) backpressure
    /// instead of letting unbounded records queue in memory.
    pub async fn ingest(&self, payload: &[u8]) {
        let event = match decode(payload) {
            Ok(event) => event,
            Err(e) => {
                info!(error = %e, "dropping event: decode failed");
                return;
            }
        };
        let mut handles = Vec::new();
        for (processed, outcome) in normalize(&event) {
            let pipeline = self.clone();
            handles.push(self.pool.submit(async move { pipeline.handle_record(processed, outcome).await }).await);
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn handle_record(&self, processed: ProcessedEvent, outcome: FilterOutcome) {
        if outcome == FilterOutcome::FilteredRegistry {
            info!(registry = %processed.message_id.registry, "dropping event: filtered registry");
            return;
        }

        let Some(endpoint_id) = processed.endpoint_id.clone() else {
            info!(message_id = %processed.message_id.raw, "dropping event: no controller endpoint id resolved");
            return;
        };

        let Some(parser) = resolve_parser(&processed.message_id.lookup_keys()) else {
            info!(message_id = %processed.message_id.raw, "dropping event: no recognized parser");
            return;
        };

        let intent = match parser {
            ParserKind::ResourcePowerStateChanged => parse_resource_power_state_changed(&processed),
            ParserKind::AlertSystemPowerOn => parse_alert_system_power_on(&processed),
            ParserKind::AlertSystemPowerOff => parse_alert_system_power_off(&processed),
            ParserKind::AlertSystemPower => parse_alert_system_power(&processed),
        };
        let intent = match intent {
            Ok(intent) => intent,
            Err(e) => {
                info!(error = %e, message_id = %processed.message_id.raw, "dropping event: parser rejected arguments");
                return;
            }
        };

        let target = match self.index.resolve(&endpoint_id, &intent.uri).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                info!(endpoint_id = endpoint_id.as_str(), uri = %intent.uri, "dropping event: uri did not resolve to a known component");
                return;
            }
            Err(e) => {
                info!(error = %e, "dropping event: component-endpoint index lookup failed");
                return;
            }
        };

        let power_on = match intent.power_on {
            Some(power_on) => power_on,
            None => match self.fetch_live_power_state(&endpoint_id, &intent.uri).await {
                Ok(power_on) => power_on,
                Err(e) => {
                    info!(error = %e, endpoint_id = endpoint_id.as_str(), "dropping event: live power-state fetch failed");
                    return;
                }
            },
        };

        match self.apply_power_update(&endpoint_id, &target, power_on).await {
            Ok(outcome) => self.run_discovery_followups(&endpoint_id, &target, power_on, &outcome).await,
            Err(e) => warn!(error = %e, component_id = target.as_str(), "state update failed downstream of a successfully parsed event"),
        }
    }

    async fn fetch_live_power_state(&self, endpoint_id: &XName, uri: &str) -> Result<bool, EngineError> {
        let endpoint = self
            .store
            .get_endpoint(endpoint_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(endpoint_id.as_str().to_string()))?;
        let credentials = self.credentials.resolve(&endpoint).await?;
        let state = self.redfish.power_state(&endpoint.fqdn, uri, &credentials).await?;
        Ok(state == hsm_redfish::PowerState::On)
    }

    async fn apply_power_update(&self, endpoint_id: &XName, target: &XName, power_on: bool) -> Result<TransitionOutcome, EngineError> {
        let target_component = self
            .store
            .get_component(target)
            .await?
            .ok_or_else(|| EngineError::NotFound(target.as_str().to_string()))?;

        let known = self.store.list_components(&ComponentFilter::default()).await?;
        let ids: Vec<XName> = known.into_iter().map(|c| c.id).collect();
        let graph = ComponentGraph::build(&ids);

        let targets = propagation_targets(endpoint_id.component_type(), target, target_component.component_type, power_on, &graph);
        let state = if power_on { State::On } else { State::Off };
        let update = Update { component_ids: targets, payload: UpdatePayload::StateData { state, flag: None }, force: false };

        apply_update(&self.engine, &self.dispatcher, &self.polling, update).await
    }

    /// §4.1 Propagation rules: re-trigger discovery for every
    /// newly-powered-on controller under a Chassis-BMC/ComputeModule event,
    /// and queue a hardware-inventory refresh when a Node-BMC target just
    /// powered its node on.
    async fn run_discovery_followups(&self, endpoint_id: &XName, target: &XName, power_on: bool, outcome: &TransitionOutcome) {
        if !power_on {
            return;
        }
        use hsm_domain::ComponentType::*;
        match (endpoint_id.component_type(), target.component_type()) {
            (ChassisBmc, ComputeModule) => {
                for id in &outcome.changed {
                    if matches!(id.component_type(), NodeBmc | RouterBmc) {
                        self.discovery.trigger_discovery(id).await;
                    }
                }
            }
            (NodeBmc, _) => {
                for id in &outcome.changed {
                    if id.component_type() == Node {
                        self.discovery.queue_hw_inventory_refresh(id).await;
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use hsm_domain::{Component, ComponentEndpoint, ComponentType, DiscoveryStatus, RedfishEndpoint, State};
    use hsm_redfish::LocalTransport;
    use hsm_store::InMemoryStore;
    use serde_json::json;

    fn xn(s: &str) -> XName {
        XName::normalize(s).unwrap()
    }

    struct NullNotificationTransport;
    #[async_trait]
    impl crate::notification::NotificationTransport for NullNotificationTransport {
        async fn post(&self, _url: &str, _payload: &crate::notification::NotificationPayload) -> bool {
            true
        }
    }

    fn build_pipeline(store: Arc<InMemoryStore>, redfish: Arc<LocalTransport>) -> EventPipeline {
        let store: Arc<dyn Persistence> = store;
        let index = Arc::new(ComponentEndpointIndex::new(store.clone()));
        let engine = Arc::new(StateEngine::new(store.clone()));
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), Arc::new(NullNotificationTransport)));
        let polling = PollingScheduler::new(
            store.clone(),
            index.clone(),
            redfish.clone(),
            Arc::new(hsm_redfish::RecordCredentialSource),
            engine.clone(),
            dispatcher.clone(),
            Default::default(),
        );
        EventPipeline::new(
            store,
            index,
            engine,
            dispatcher,
            polling,
            redfish,
            Arc::new(hsm_redfish::RecordCredentialSource),
            Arc::new(NoopDiscoveryTrigger),
        )
    }

    async fn seed_node_bmc_fixture(store: &InMemoryStore) {
        let mut node = Component::new(xn("x1c4s4b0n0"), ComponentType::Node, Utc::now());
        node.state = State::Off;
        store.put_component(node).await.unwrap();
        store
            .put_component_endpoint(ComponentEndpoint {
                id: xn("x1c4s4b0n0"),
                endpoint_id: xn("x1c4s4b0"),
                odata_id: "/redfish/v1/Systems/Self".to_string(),
                redfish_info: serde_json::Value::Null,
            })
            .await
            .unwrap();
    }

    fn payload(context: &str, message_id: &str, args: &[&str]) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "Context": context,
            "Events": [{"MessageId": message_id, "MessageArgs": args, "Severity": "OK"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn resource_power_state_changed_turns_node_on() {
        let store = Arc::new(InMemoryStore::new());
        seed_node_bmc_fixture(&store).await;
        let pipeline = build_pipeline(store.clone(), Arc::new(LocalTransport::new()));

        let body = payload(
            "x1c4s4b0",
            "ResourceEvent.1.0.ResourcePowerStateChanged",
            &["/redfish/v1/Systems/Self", "On"],
        );
        pipeline.ingest(&body).await;

        let node = store.get_component(&xn("x1c4s4b0n0")).await.unwrap().unwrap();
        assert_eq!(node.state, State::On);
    }

    #[tokio::test]
    async fn unresolvable_endpoint_is_dropped_without_panicking() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = build_pipeline(store, Arc::new(LocalTransport::new()));
        let body = payload("garbage", "ResourceEvent.1.0.ResourcePowerStateChanged", &["/x", "On"]);
        pipeline.ingest(&body).await;
    }

    #[tokio::test]
    async fn empty_payload_is_dropped_without_panicking() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = build_pipeline(store, Arc::new(LocalTransport::new()));
        pipeline.ingest(b"").await;
    }

    #[tokio::test]
    async fn vendor_alert_without_power_state_fetches_live_state() {
        let store = Arc::new(InMemoryStore::new());
        seed_node_bmc_fixture(&store).await;
        store
            .put_endpoint(RedfishEndpoint {
                id: xn("x1c4s4b0"),
                fqdn: "https://bmc0".to_string(),
                credentials_ref: Some("root:hunter2".to_string()),
                discovery_status: DiscoveryStatus::DiscoverOK,
                last_discovery_at: None,
                enabled: true,
            })
            .await
            .unwrap();

        let redfish = Arc::new(LocalTransport::new());
        redfish.stub("https://bmc0", "/redfish/v1/Systems/Self", json!({"PowerState": "On"}));
        let pipeline = build_pipeline(store.clone(), redfish);

        let body = payload("x1c4s4b0", "Alert.1.0.PowerStatusChange", &["/redfish/v1/Systems/Self"]);
        pipeline.ingest(&body).await;

        let node = store.get_component(&xn("x1c4s4b0n0")).await.unwrap().unwrap();
        assert_eq!(node.state, State::On);
    }
}
