use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hsm_domain::{
    Component, ComponentEndpoint, ComponentEthInterface, ComponentFilter, DiscoveryBundle, Group,
    HwInventoryFru, HwInventoryHistoryEntry, HwInventoryLocation, Job, Membership, Partition,
    RedfishEndpoint, Reservation, ServiceEndpoint, Subscription, XName,
};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::Persistence;

/// `true` if `new` differs from the previously stored component (or there
/// was none) in any field a caller could observe — used by
/// [`InMemoryStore::commit_discovery`] to report which components actually
/// changed, mirroring what the State Transition Engine computes for
/// ordinary updates.
fn component_changed(old: Option<&Component>, new: &Component) -> bool {
    match old {
        None => true,
        Some(o) => {
            o.state != new.state
                || o.flag != new.flag
                || o.enabled != new.enabled
                || o.software_status != new.software_status
                || o.role != new.role
                || o.sub_role != new.sub_role
                || o.nid != new.nid
                || o.class != new.class
                || o.arch != new.arch
                || o.net_type != new.net_type
                || o.subtype != new.subtype
                || o.locked != new.locked
                || o.reservations_disabled != new.reservations_disabled
        }
    }
}

#[derive(Default)]
struct Inner {
    components: HashMap<XName, Component>,
    endpoints: HashMap<XName, RedfishEndpoint>,
    component_endpoints: HashMap<(XName, String), ComponentEndpoint>,
    hwinv_locations: HashMap<XName, HwInventoryLocation>,
    hwinv_frus: HashMap<String, HwInventoryFru>,
    hwinv_history: Vec<HwInventoryHistoryEntry>,
    service_endpoints: HashMap<(XName, String), ServiceEndpoint>,
    eth_interfaces: HashMap<String, ComponentEthInterface>,
    groups: HashMap<String, Group>,
    partitions: HashMap<String, Partition>,
    memberships: HashMap<XName, Membership>,
    reservations: HashMap<XName, Reservation>,
    subscriptions: HashMap<String, Subscription>,
    jobs: HashMap<String, Job>,
}

/// In-memory implementation of [`Persistence`], structurally mirroring the
/// teacher's `InMemoryStore`: one `RwLock<Inner>` guarding plain
/// `HashMap`s. Used by tests and single-process deployments; all data is
/// lost on process exit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for InMemoryStore {
    async fn get_component(&self, id: &XName) -> Result<Option<Component>, StoreError> {
        Ok(self.inner.read().await.components.get(id).cloned())
    }

    async fn list_components(&self, filter: &ComponentFilter) -> Result<Vec<Component>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .components
            .values()
            .filter(|c| filter.matches(c, guard.memberships.get(&c.id)))
            .cloned()
            .collect())
    }

    async fn put_component(&self, component: Component) -> Result<(), StoreError> {
        self.inner.write().await.components.insert(component.id.clone(), component);
        Ok(())
    }

    async fn delete_component(&self, id: &XName) -> Result<(), StoreError> {
        self.inner.write().await.components.remove(id);
        Ok(())
    }

    async fn bulk_put_components(&self, components: Vec<Component>) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        for c in components {
            guard.components.insert(c.id.clone(), c);
        }
        Ok(())
    }

    async fn get_endpoint(&self, id: &XName) -> Result<Option<RedfishEndpoint>, StoreError> {
        Ok(self.inner.read().await.endpoints.get(id).cloned())
    }

    async fn list_endpoints(&self) -> Result<Vec<RedfishEndpoint>, StoreError> {
        Ok(self.inner.read().await.endpoints.values().cloned().collect())
    }

    async fn put_endpoint(&self, endpoint: RedfishEndpoint) -> Result<(), StoreError> {
        self.inner.write().await.endpoints.insert(endpoint.id.clone(), endpoint);
        Ok(())
    }

    async fn delete_endpoint(&self, id: &XName) -> Result<(), StoreError> {
        self.inner.write().await.endpoints.remove(id);
        Ok(())
    }

    async fn get_component_endpoint(
        &self,
        endpoint_id: &XName,
        odata_id: &str,
    ) -> Result<Option<ComponentEndpoint>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .component_endpoints
            .get(&(endpoint_id.clone(), odata_id.to_string()))
            .cloned())
    }

    async fn list_component_endpoints(&self) -> Result<Vec<ComponentEndpoint>, StoreError> {
        Ok(self.inner.read().await.component_endpoints.values().cloned().collect())
    }

    async fn list_component_endpoints_by_endpoint(
        &self,
        endpoint_id: &XName,
    ) -> Result<Vec<ComponentEndpoint>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .component_endpoints
            .values()
            .filter(|ce| &ce.endpoint_id == endpoint_id)
            .cloned()
            .collect())
    }

    async fn put_component_endpoint(&self, ce: ComponentEndpoint) -> Result<(), StoreError> {
        let key = (ce.endpoint_id.clone(), ce.odata_id.clone());
        self.inner.write().await.component_endpoints.insert(key, ce);
        Ok(())
    }

    async fn delete_component_endpoints_by_endpoint(
        &self,
        endpoint_id: &XName,
    ) -> Result<Vec<ComponentEndpoint>, StoreError> {
        let mut guard = self.inner.write().await;
        let (keep, removed): (Vec<_>, Vec<_>) = guard
            .component_endpoints
            .drain()
            .partition(|(_, ce)| &ce.endpoint_id != endpoint_id);
        guard.component_endpoints = keep.into_iter().collect();
        Ok(removed.into_iter().map(|(_, ce)| ce).collect())
    }

    async fn put_hwinv_location(&self, location: HwInventoryLocation) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if let Some(fru) = &location.populated_fru {
            guard.hwinv_frus.insert(fru.fru_id.clone(), fru.clone());
        }
        guard.hwinv_locations.insert(location.id.clone(), location);
        Ok(())
    }

    async fn get_hwinv_location(&self, id: &XName) -> Result<Option<HwInventoryLocation>, StoreError> {
        Ok(self.inner.read().await.hwinv_locations.get(id).cloned())
    }

    async fn get_hwinv_fru(&self, fru_id: &str) -> Result<Option<HwInventoryFru>, StoreError> {
        Ok(self.inner.read().await.hwinv_frus.get(fru_id).cloned())
    }

    async fn append_hwinv_history(&self, entry: HwInventoryHistoryEntry) -> Result<(), StoreError> {
        self.inner.write().await.hwinv_history.push(entry);
        Ok(())
    }

    async fn list_hwinv_history(&self, fru_id: &str) -> Result<Vec<HwInventoryHistoryEntry>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .hwinv_history
            .iter()
            .filter(|e| e.fru_id == fru_id)
            .cloned()
            .collect())
    }

    async fn get_group(&self, name: &str) -> Result<Option<Group>, StoreError> {
        Ok(self.inner.read().await.groups.get(name).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        Ok(self.inner.read().await.groups.values().cloned().collect())
    }

    async fn put_group(&self, group: Group) -> Result<(), StoreError> {
        self.inner.write().await.groups.insert(group.name.clone(), group);
        Ok(())
    }

    async fn delete_group(&self, name: &str) -> Result<(), StoreError> {
        self.inner.write().await.groups.remove(name);
        Ok(())
    }

    async fn get_partition(&self, name: &str) -> Result<Option<Partition>, StoreError> {
        Ok(self.inner.read().await.partitions.get(name).cloned())
    }

    async fn list_partitions(&self) -> Result<Vec<Partition>, StoreError> {
        Ok(self.inner.read().await.partitions.values().cloned().collect())
    }

    async fn put_partition(&self, partition: Partition) -> Result<(), StoreError> {
        self.inner.write().await.partitions.insert(partition.name.clone(), partition);
        Ok(())
    }

    async fn delete_partition(&self, name: &str) -> Result<(), StoreError> {
        self.inner.write().await.partitions.remove(name);
        Ok(())
    }

    async fn get_membership(&self, component_id: &XName) -> Result<Membership, StoreError> {
        Ok(self.inner.read().await.memberships.get(component_id).cloned().unwrap_or_default())
    }

    async fn put_membership(&self, component_id: &XName, membership: Membership) -> Result<(), StoreError> {
        self.inner.write().await.memberships.insert(component_id.clone(), membership);
        Ok(())
    }

    async fn get_reservation(&self, component_id: &XName) -> Result<Option<Reservation>, StoreError> {
        Ok(self.inner.read().await.reservations.get(component_id).cloned())
    }

    async fn list_reservations(&self, component_ids: &[XName]) -> Result<Vec<Reservation>, StoreError> {
        let guard = self.inner.read().await;
        Ok(component_ids.iter().filter_map(|id| guard.reservations.get(id).cloned()).collect())
    }

    async fn get_reservation_by_deputy_key(&self, deputy_key: &str) -> Result<Option<Reservation>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .reservations
            .values()
            .find(|r| r.deputy_key == deputy_key)
            .cloned())
    }

    async fn put_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        self.inner.write().await.reservations.insert(reservation.component_id.clone(), reservation);
        Ok(())
    }

    async fn delete_reservation(&self, component_id: &XName) -> Result<(), StoreError> {
        self.inner.write().await.reservations.remove(component_id);
        Ok(())
    }

    async fn sweep_expired_reservations(&self, now: DateTime<Utc>) -> Result<Vec<XName>, StoreError> {
        let mut guard = self.inner.write().await;
        let expired: Vec<XName> = guard
            .reservations
            .values()
            .filter(|r| r.expiration.is_some_and(|exp| exp <= now))
            .map(|r| r.component_id.clone())
            .collect();
        for id in &expired {
            guard.reservations.remove(id);
        }
        Ok(expired)
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        Ok(self.inner.read().await.subscriptions.values().cloned().collect())
    }

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>, StoreError> {
        Ok(self.inner.read().await.subscriptions.get(id).cloned())
    }

    async fn put_subscription(&self, subscription: Subscription) -> Result<(), StoreError> {
        self.inner.write().await.subscriptions.insert(subscription.id.clone(), subscription);
        Ok(())
    }

    async fn delete_subscription(&self, id: &str) -> Result<(), StoreError> {
        self.inner.write().await.subscriptions.remove(id);
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.inner.read().await.jobs.get(job_id).cloned())
    }

    async fn get_job_by_component(&self, component_id: &XName) -> Result<Option<Job>, StoreError> {
        Ok(self.inner.read().await.jobs.values().find(|j| &j.component_id == component_id).cloned())
    }

    async fn put_job(&self, job: Job) -> Result<(), StoreError> {
        self.inner.write().await.jobs.insert(job.job_id.clone(), job);
        Ok(())
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), StoreError> {
        self.inner.write().await.jobs.remove(job_id);
        Ok(())
    }

    async fn commit_discovery(&self, bundle: DiscoveryBundle) -> Result<Vec<XName>, StoreError> {
        let mut guard = self.inner.write().await;
        let mut changed = Vec::new();

        if let Some(endpoint) = bundle.endpoint {
            guard.endpoints.insert(endpoint.id.clone(), endpoint);
        }
        for ce in bundle.component_endpoints {
            let key = (ce.endpoint_id.clone(), ce.odata_id.clone());
            guard.component_endpoints.insert(key, ce);
        }
        for loc in bundle.hwinv_locations {
            if let Some(fru) = &loc.populated_fru {
                guard.hwinv_frus.insert(fru.fru_id.clone(), fru.clone());
            }
            guard.hwinv_locations.insert(loc.id.clone(), loc);
        }
        for component in bundle.components {
            let old = guard.components.get(&component.id);
            if component_changed(old, &component) {
                changed.push(component.id.clone());
            }
            guard.components.insert(component.id.clone(), component);
        }
        for se in bundle.service_endpoints {
            let key = (se.endpoint_id.clone(), se.service_name.clone());
            guard.service_endpoints.insert(key, se);
        }
        for eth in bundle.eth_interfaces {
            guard.eth_interfaces.insert(eth.id.clone(), eth);
        }

        changed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hsm_domain::{ComponentType, State};

    fn xn(s: &str) -> XName {
        XName::normalize(s).unwrap()
    }

    fn comp(id: &str, state: State) -> Component {
        let mut c = Component::new(xn(id), ComponentType::Node, Utc::now());
        c.state = state;
        c
    }

    #[tokio::test]
    async fn put_and_get_component() {
        let store = InMemoryStore::new();
        store.put_component(comp("x1c4s4b0n0", State::On)).await.unwrap();
        let got = store.get_component(&xn("x1c4s4b0n0")).await.unwrap();
        assert_eq!(got.unwrap().state, State::On);
    }

    #[tokio::test]
    async fn list_components_filters_by_state() {
        let store = InMemoryStore::new();
        store.put_component(comp("x1c4s4b0n0", State::On)).await.unwrap();
        store.put_component(comp("x1c4s4b0n1", State::Off)).await.unwrap();
        let filter = ComponentFilter { state: Some(State::On), ..Default::default() };
        let got = store.list_components(&filter).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id.as_str(), "x1c4s4b0n0");
    }

    #[tokio::test]
    async fn commit_discovery_reports_only_changed() {
        let store = InMemoryStore::new();
        store.put_component(comp("x1c4s4b0n0", State::On)).await.unwrap();

        let bundle = DiscoveryBundle {
            components: vec![comp("x1c4s4b0n0", State::On), comp("x1c4s4b0n1", State::Unknown)],
            ..Default::default()
        };
        let changed = store.commit_discovery(bundle).await.unwrap();
        assert_eq!(changed, vec![xn("x1c4s4b0n1")]);
    }

    #[tokio::test]
    async fn sweep_expired_removes_only_past_expiration() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store
            .put_reservation(Reservation {
                component_id: xn("x1c4s4b0n0"),
                reservation_key: "k1".into(),
                deputy_key: "d1".into(),
                expiration: Some(now - chrono::Duration::seconds(1)),
                created_at: now,
            })
            .await
            .unwrap();
        store
            .put_reservation(Reservation {
                component_id: xn("x1c4s4b0n1"),
                reservation_key: "k2".into(),
                deputy_key: "d2".into(),
                expiration: Some(now + chrono::Duration::hours(1)),
                created_at: now,
            })
            .await
            .unwrap();

        let expired = store.sweep_expired_reservations(now).await.unwrap();
        assert_eq!(expired, vec![xn("x1c4s4b0n0")]);
        assert!(store.get_reservation(&xn("x1c4s4b0n1")).await.unwrap().is_some());
    }
}
