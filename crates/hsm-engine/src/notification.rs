use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hsm_domain::{TriggerFilter, TriggerType, XName};
use hsm_store::Persistence;
use tracing::warn;

use crate::error::EngineError;
use crate::worker_pool::WorkerPool;

/// One bundled delivery: every component whose update matched `trigger` /
/// `value` for a given subscription URL (§4.5 "bundled per matching
/// URL into a single payload").
#[derive(Debug, Clone, serde::Serialize)]
pub struct NotificationPayload {
    pub component_ids: Vec<XName>,
    pub trigger: TriggerType,
    pub value: String,
}

/// Outbound delivery, abstracted so the dispatcher is testable without a
/// live HTTP server — the same shape as [`hsm_redfish::RedfishTransport`].
#[async_trait]
pub trait NotificationTransport: Send + Sync + 'static {
    /// POST `payload` to `url`. Returns whether delivery succeeded (a 2xx
    /// response); the transport itself owns the attempt/backoff loop.
    async fn post(&self, url: &str, payload: &NotificationPayload) -> bool;
}

/// Real transport: up to 3 POST attempts with a 5-second inter-attempt
/// delay; non-2xx and transport errors both count as failures (§4.5).
pub struct HttpNotificationTransport {
    client: reqwest::Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpNotificationTransport {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self { client: reqwest::Client::new(), max_attempts, retry_delay }
    }
}

#[async_trait]
impl NotificationTransport for HttpNotificationTransport {
    async fn post(&self, url: &str, payload: &NotificationPayload) -> bool {
        for attempt in 1..=self.max_attempts {
            let result = self.client.post(url).json(payload).send().await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    let _ = resp.bytes().await;
                    return true;
                }
                Ok(resp) => {
                    warn!(url, status = %resp.status(), attempt, "notification delivery rejected");
                    let _ = resp.bytes().await;
                }
                Err(e) => warn!(url, %e, attempt, "notification delivery failed"),
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        false
    }
}

fn filter_matches(filter: &TriggerFilter, trigger: TriggerType, value: &str) -> bool {
    match trigger {
        TriggerType::State => filter.states.iter().any(|s| s.to_string().eq_ignore_ascii_case(value)),
        TriggerType::Role => filter.roles.iter().any(|r| r.0.eq_ignore_ascii_case(value)),
        TriggerType::SubRole => filter.sub_roles.iter().any(|r| r.0.eq_ignore_ascii_case(value)),
        TriggerType::SoftwareStatus => filter.software_status.iter().any(|s| s.0.eq_ignore_ascii_case(value)),
        TriggerType::Enabled => filter.enabled.iter().any(|b| b.to_string().eq_ignore_ascii_case(value)),
    }
}

/// Notification Dispatcher (§4.5): routes a state-change by trigger
/// type and value to every matching subscription URL, bundling components
/// per URL and delivering all of them concurrently behind one join barrier.
pub struct NotificationDispatcher {
    store: Arc<dyn Persistence>,
    transport: Arc<dyn NotificationTransport>,
    pool: WorkerPool,
}

/// Default concurrent-delivery cap when a dispatcher is built without an
/// explicit pool size (test helpers, mainly); `serve()` wires the
/// configured `--notification-workers` value instead.
const DEFAULT_NOTIFICATION_WORKERS: usize = 8;

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn Persistence>, transport: Arc<dyn NotificationTransport>) -> Self {
        Self::with_pool_size(store, transport, DEFAULT_NOTIFICATION_WORKERS)
    }

    pub fn with_pool_size(store: Arc<dyn Persistence>, transport: Arc<dyn NotificationTransport>, pool_size: usize) -> Self {
        Self { store, transport, pool: WorkerPool::new(pool_size) }
    }

    /// Route and deliver one state change. `value` is the new value,
    /// already case-folded by the caller (§4.5: "the specific trigger
    /// value is the new value (case-folded)").
    pub async fn dispatch(&self, component_ids: Vec<XName>, trigger: TriggerType, value: String) -> Result<(), EngineError> {
        if component_ids.is_empty() {
            return Ok(());
        }
        let subscriptions = self.store.list_subscriptions().await?;
        let mut by_url: HashMap<String, Vec<XName>> = HashMap::new();
        for sub in subscriptions {
            if filter_matches(&sub.triggers, trigger, &value) {
                by_url.entry(sub.url).or_default().extend(component_ids.iter().cloned());
            }
        }

        let mut handles = Vec::new();
        for (url, ids) in by_url {
            let transport = self.transport.clone();
            let payload = NotificationPayload { component_ids: ids, trigger, value: value.clone() };
            handles.push(
                self.pool
                    .submit(async move {
                        if !transport.post(&url, &payload).await {
                            warn!(url, "notification exhausted retries, dropping");
                        }
                    })
                    .await,
            );
        }
        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_domain::Subscription;
    use hsm_store::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    struct RecordingTransport {
        calls: Mutex<Vec<(String, NotificationPayload)>>,
        fail_first_n: AtomicUsize,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self { calls: Mutex::new(Vec::new()), fail_first_n: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl NotificationTransport for RecordingTransport {
        async fn post(&self, url: &str, payload: &NotificationPayload) -> bool {
            self.calls.lock().await.push((url.to_string(), payload.clone()));
            if self.fail_first_n.load(Ordering::SeqCst) > 0 {
                self.fail_first_n.fetch_sub(1, Ordering::SeqCst);
                return false;
            }
            true
        }
    }

    fn xn(s: &str) -> XName {
        XName::normalize(s).unwrap()
    }

    #[tokio::test]
    async fn dispatch_routes_to_subscriptions_matching_trigger_value() {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_subscription(Subscription {
                id: "sub1".to_string(),
                url: "http://callback.example/a".to_string(),
                triggers: TriggerFilter { states: vec![hsm_domain::State::Off], ..Default::default() },
            })
            .await
            .unwrap();
        store
            .put_subscription(Subscription {
                id: "sub2".to_string(),
                url: "http://callback.example/b".to_string(),
                triggers: TriggerFilter { states: vec![hsm_domain::State::On], ..Default::default() },
            })
            .await
            .unwrap();

        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = NotificationDispatcher::new(store, transport.clone());
        dispatcher.dispatch(vec![xn("x1c4s4b0n0")], TriggerType::State, "off".to_string()).await.unwrap();

        let calls = transport.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "http://callback.example/a");
    }

    #[tokio::test]
    async fn dispatch_bundles_multiple_components_for_one_url() {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_subscription(Subscription {
                id: "sub1".to_string(),
                url: "http://callback.example/a".to_string(),
                triggers: TriggerFilter { states: vec![hsm_domain::State::Off], ..Default::default() },
            })
            .await
            .unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = NotificationDispatcher::new(store, transport.clone());
        dispatcher
            .dispatch(vec![xn("x1c4s4b0n0"), xn("x1c4s4b0n1")], TriggerType::State, "off".to_string())
            .await
            .unwrap();

        let calls = transport.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.component_ids.len(), 2);
    }

    #[tokio::test]
    async fn dispatch_with_no_matching_subscriptions_delivers_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = NotificationDispatcher::new(store, transport.clone());
        dispatcher.dispatch(vec![xn("x1c4s4b0n0")], TriggerType::Enabled, "true".to_string()).await.unwrap();
        assert!(transport.calls.lock().await.is_empty());
    }
}
