use std::sync::Arc;

use hsm_cache::SyncMap;
use hsm_domain::XName;
use hsm_store::{Persistence, StoreError};

use crate::error::EngineError;

/// Component-Endpoint Index (§4.4): a sync-on-miss cache translating
/// `(endpointID, URI) -> componentID` and `endpointID -> child componentID
/// list`, the correlation step the Event Normalizer needs to map a
/// vendor-chosen Redfish URI onto the canonical xname scheme.
///
/// Three [`SyncMap`] instances share the same backing store: the primary
/// `componentID -> ComponentEndpoint` map (§4.4 "Structure"), and two
/// secondary maps — `(endpoint, uri) -> componentID` and `endpoint ->
/// child componentID list` — folding a single `string -> string`
/// secondary index into two typed maps for clarity. All three rebuild from
/// a full `list_component_endpoints()` scan on a miss — the generic
/// cache's thundering-herd collapsing (§4.4 "Sync protocol") means
/// concurrent misses across many endpoints still trigger only one rebuild
/// per map.
pub struct ComponentEndpointIndex {
    store: Arc<dyn Persistence>,
    by_component: SyncMap<XName, hsm_domain::ComponentEndpoint>,
    by_uri: SyncMap<(XName, String), XName>,
    by_endpoint: SyncMap<XName, Vec<XName>>,
}

impl ComponentEndpointIndex {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store, by_component: SyncMap::new(), by_uri: SyncMap::new(), by_endpoint: SyncMap::new() }
    }

    /// Primary lookup: the `ComponentEndpoint` record for a component ID
    /// (§4.4 "Primary store"), used by the Polling Scheduler to
    /// resolve a Standby component back to its controlling endpoint + URI.
    ///
    /// Persistence exposes no cheap point-query scoped to a component ID
    /// alone (only `(endpointID, URI)` and `endpointID`), so the point
    /// query here always forces a rebuild attempt on a miss rather than
    /// short-circuiting — the thundering-herd collapse still bounds this
    /// to one rebuild per concurrent wave of misses.
    pub async fn get_by_component(&self, component_id: &XName) -> Result<Option<hsm_domain::ComponentEndpoint>, EngineError> {
        let load_store = self.store.clone();
        let hit = self
            .by_component
            .get_or_sync(
                component_id,
                || async { Ok::<_, StoreError>(true) },
                move || {
                    let store = load_store.clone();
                    async move {
                        let all = store.list_component_endpoints().await?;
                        Ok::<_, StoreError>(all.into_iter().map(|ce| (ce.id.clone(), ce)).collect())
                    }
                },
            )
            .await?;
        Ok(hit)
    }

    /// Resolve `(endpoint_id, uri) -> component_id`, syncing from
    /// persistence on a miss (§4.4).
    pub async fn resolve(&self, endpoint_id: &XName, uri: &str) -> Result<Option<XName>, EngineError> {
        let key = (endpoint_id.clone(), uri.to_string());
        let pq_store = self.store.clone();
        let pq_endpoint = endpoint_id.clone();
        let pq_uri = uri.to_string();
        let load_store = self.store.clone();

        let hit = self
            .by_uri
            .get_or_sync(
                &key,
                move || {
                    let store = pq_store.clone();
                    let endpoint = pq_endpoint.clone();
                    let uri = pq_uri.clone();
                    async move { Ok::<_, StoreError>(store.get_component_endpoint(&endpoint, &uri).await?.is_some()) }
                },
                move || {
                    let store = load_store.clone();
                    async move {
                        let all = store.list_component_endpoints().await?;
                        Ok::<_, StoreError>(
                            all.into_iter()
                                .map(|ce| ((ce.endpoint_id.clone(), ce.odata_id.clone()), ce.id.clone()))
                                .collect(),
                        )
                    }
                },
            )
            .await?;
        Ok(hit)
    }

    /// Child component IDs discovered under `endpoint_id`, syncing from
    /// persistence on a miss.
    pub async fn children_of(&self, endpoint_id: &XName) -> Result<Vec<XName>, EngineError> {
        let pq_store = self.store.clone();
        let pq_endpoint = endpoint_id.clone();
        let load_store = self.store.clone();

        let hit = self
            .by_endpoint
            .get_or_sync(
                endpoint_id,
                move || {
                    let store = pq_store.clone();
                    let endpoint = pq_endpoint.clone();
                    async move { Ok::<_, StoreError>(!store.list_component_endpoints_by_endpoint(&endpoint).await?.is_empty()) }
                },
                move || {
                    let store = load_store.clone();
                    async move {
                        let all = store.list_component_endpoints().await?;
                        let mut by_endpoint: std::collections::HashMap<XName, Vec<XName>> = std::collections::HashMap::new();
                        for ce in all {
                            by_endpoint.entry(ce.endpoint_id.clone()).or_default().push(ce.id.clone());
                        }
                        Ok::<_, StoreError>(by_endpoint)
                    }
                },
            )
            .await?;
        Ok(hit.unwrap_or_default())
    }

    /// Force both maps to rebuild regardless of staleness — called after a
    /// discovery commit so freshly-discovered endpoints resolve on the
    /// very next event without waiting for a miss.
    pub async fn force_sync(&self) -> Result<(), EngineError> {
        let store = self.store.clone();
        self.by_uri
            .force_sync(move || {
                let store = store.clone();
                async move {
                    let all = store.list_component_endpoints().await?;
                    Ok::<_, StoreError>(
                        all.into_iter().map(|ce| ((ce.endpoint_id.clone(), ce.odata_id.clone()), ce.id.clone())).collect(),
                    )
                }
            })
            .await?;
        let store = self.store.clone();
        self.by_endpoint
            .force_sync(move || {
                let store = store.clone();
                async move {
                    let all = store.list_component_endpoints().await?;
                    let mut by_endpoint: std::collections::HashMap<XName, Vec<XName>> = std::collections::HashMap::new();
                    for ce in all {
                        by_endpoint.entry(ce.endpoint_id.clone()).or_default().push(ce.id.clone());
                    }
                    Ok::<_, StoreError>(by_endpoint)
                }
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hsm_domain::{Component, ComponentEndpoint, ComponentType};
    use hsm_store::InMemoryStore;

    fn xn(s: &str) -> XName {
        XName::normalize(s).unwrap()
    }

    #[tokio::test]
    async fn resolve_syncs_on_miss_and_finds_entry() {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_component_endpoint(ComponentEndpoint {
                id: xn("x1c4s4b0n0"),
                endpoint_id: xn("x1c4s4b0"),
                odata_id: "/redfish/v1/Systems/Self".to_string(),
                redfish_info: serde_json::Value::Null,
            })
            .await
            .unwrap();

        let index = ComponentEndpointIndex::new(store);
        let got = index.resolve(&xn("x1c4s4b0"), "/redfish/v1/Systems/Self").await.unwrap();
        assert_eq!(got, Some(xn("x1c4s4b0n0")));
    }

    #[tokio::test]
    async fn resolve_missing_entry_returns_none() {
        let store = Arc::new(InMemoryStore::new());
        let index = ComponentEndpointIndex::new(store);
        let got = index.resolve(&xn("x1c4s4b0"), "/redfish/v1/Systems/Nope").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn children_of_lists_discovered_subcomponents() {
        let store = Arc::new(InMemoryStore::new());
        store.put_component(Component::new(xn("x1c4s4b0n0"), ComponentType::Node, Utc::now())).await.unwrap();
        store
            .put_component_endpoint(ComponentEndpoint {
                id: xn("x1c4s4b0n0"),
                endpoint_id: xn("x1c4s4b0"),
                odata_id: "/redfish/v1/Systems/Self".to_string(),
                redfish_info: serde_json::Value::Null,
            })
            .await
            .unwrap();
        store
            .put_component_endpoint(ComponentEndpoint {
                id: xn("x1c4s4b0n1"),
                endpoint_id: xn("x1c4s4b0"),
                odata_id: "/redfish/v1/Systems/Self1".to_string(),
                redfish_info: serde_json::Value::Null,
            })
            .await
            .unwrap();

        let index = ComponentEndpointIndex::new(store);
        let mut children = index.children_of(&xn("x1c4s4b0")).await.unwrap();
        children.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(children, vec![xn("x1c4s4b0n0"), xn("x1c4s4b0n1")]);
    }
}
