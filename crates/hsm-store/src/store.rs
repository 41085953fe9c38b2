use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hsm_domain::{
    Component, ComponentEndpoint, ComponentFilter, DiscoveryBundle, Group, HwInventoryFru,
    HwInventoryHistoryEntry, HwInventoryLocation, Job, Membership, Partition, RedfishEndpoint,
    Reservation, Subscription, XName,
};

use crate::error::StoreError;

/// The capability set any backing store must implement (§4.6).
///
/// Every method is scoped to a single logical operation; implementations
/// are expected to provide serializable-isolation semantics for that
/// operation, and the bulk/commit methods must be atomic (all rows succeed
/// or none do). The trait returns the actual rows touched rather than bare
/// counts — callers (the State Transition Engine, the Notification
/// Dispatcher) need real IDs, not counts, to drive notification filtering.
#[async_trait]
pub trait Persistence: Send + Sync + 'static {
    // ── Components ────────────────────────────────────────────────────────────

    async fn get_component(&self, id: &XName) -> Result<Option<Component>, StoreError>;

    async fn list_components(&self, filter: &ComponentFilter) -> Result<Vec<Component>, StoreError>;

    async fn put_component(&self, component: Component) -> Result<(), StoreError>;

    async fn delete_component(&self, id: &XName) -> Result<(), StoreError>;

    /// Atomically replace every component in `components` with its new
    /// value. All-or-nothing: either every row is written or none are.
    async fn bulk_put_components(&self, components: Vec<Component>) -> Result<(), StoreError>;

    // ── Redfish endpoints ─────────────────────────────────────────────────────

    async fn get_endpoint(&self, id: &XName) -> Result<Option<RedfishEndpoint>, StoreError>;

    async fn list_endpoints(&self) -> Result<Vec<RedfishEndpoint>, StoreError>;

    async fn put_endpoint(&self, endpoint: RedfishEndpoint) -> Result<(), StoreError>;

    /// Deletes the endpoint record only. Cascading `ComponentEndpoint`
    /// deletion and forcing the owning `Component`'s state to `Empty` is
    /// the caller's responsibility (§3 `ComponentEndpoint` invariant) —
    /// the store has no notion of "force Empty and notify".
    async fn delete_endpoint(&self, id: &XName) -> Result<(), StoreError>;

    // ── Component endpoints ───────────────────────────────────────────────────

    async fn get_component_endpoint(
        &self,
        endpoint_id: &XName,
        odata_id: &str,
    ) -> Result<Option<ComponentEndpoint>, StoreError>;

    async fn list_component_endpoints(&self) -> Result<Vec<ComponentEndpoint>, StoreError>;

    async fn list_component_endpoints_by_endpoint(
        &self,
        endpoint_id: &XName,
    ) -> Result<Vec<ComponentEndpoint>, StoreError>;

    async fn put_component_endpoint(&self, ce: ComponentEndpoint) -> Result<(), StoreError>;

    /// Deletes every `ComponentEndpoint` belonging to `endpoint_id`, returning
    /// what was removed so the caller can force their components `Empty`.
    async fn delete_component_endpoints_by_endpoint(
        &self,
        endpoint_id: &XName,
    ) -> Result<Vec<ComponentEndpoint>, StoreError>;

    // ── Hardware inventory ────────────────────────────────────────────────────

    /// Invariant (§3): writing a `Location` whose `populated_fru` is
    /// `Some` also durably records that `HwInventoryFru`, in the same
    /// operation.
    async fn put_hwinv_location(&self, location: HwInventoryLocation) -> Result<(), StoreError>;

    async fn get_hwinv_location(&self, id: &XName) -> Result<Option<HwInventoryLocation>, StoreError>;

    async fn get_hwinv_fru(&self, fru_id: &str) -> Result<Option<HwInventoryFru>, StoreError>;

    async fn append_hwinv_history(&self, entry: HwInventoryHistoryEntry) -> Result<(), StoreError>;

    async fn list_hwinv_history(&self, fru_id: &str) -> Result<Vec<HwInventoryHistoryEntry>, StoreError>;

    // ── Groups / partitions / memberships ─────────────────────────────────────

    async fn get_group(&self, name: &str) -> Result<Option<Group>, StoreError>;

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    async fn put_group(&self, group: Group) -> Result<(), StoreError>;

    async fn delete_group(&self, name: &str) -> Result<(), StoreError>;

    async fn get_partition(&self, name: &str) -> Result<Option<Partition>, StoreError>;

    async fn list_partitions(&self) -> Result<Vec<Partition>, StoreError>;

    async fn put_partition(&self, partition: Partition) -> Result<(), StoreError>;

    async fn delete_partition(&self, name: &str) -> Result<(), StoreError>;

    async fn get_membership(&self, component_id: &XName) -> Result<Membership, StoreError>;

    async fn put_membership(&self, component_id: &XName, membership: Membership) -> Result<(), StoreError>;

    // ── Reservations ──────────────────────────────────────────────────────────

    async fn get_reservation(&self, component_id: &XName) -> Result<Option<Reservation>, StoreError>;

    async fn list_reservations(&self, component_ids: &[XName]) -> Result<Vec<Reservation>, StoreError>;

    async fn get_reservation_by_deputy_key(&self, deputy_key: &str) -> Result<Option<Reservation>, StoreError>;

    async fn put_reservation(&self, reservation: Reservation) -> Result<(), StoreError>;

    async fn delete_reservation(&self, component_id: &XName) -> Result<(), StoreError>;

    /// Remove every reservation whose `expiration` is `Some(t)` with `t <=
    /// now`, returning the freed component IDs. No notifications are
    /// emitted for this (§4.3 `SweepExpired`).
    async fn sweep_expired_reservations(&self, now: DateTime<Utc>) -> Result<Vec<XName>, StoreError>;

    // ── Notification subscriptions ────────────────────────────────────────────

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError>;

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>, StoreError>;

    async fn put_subscription(&self, subscription: Subscription) -> Result<(), StoreError>;

    async fn delete_subscription(&self, id: &str) -> Result<(), StoreError>;

    // ── Jobs ──────────────────────────────────────────────────────────────────

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError>;

    async fn get_job_by_component(&self, component_id: &XName) -> Result<Option<Job>, StoreError>;

    async fn put_job(&self, job: Job) -> Result<(), StoreError>;

    async fn delete_job(&self, job_id: &str) -> Result<(), StoreError>;

    // ── Discovery commit (§4.8) ──────────────────────────────────────────

    /// Write `bundle` as a single atomic transaction: endpoint +
    /// component-endpoints + hwinv-by-location (+ embedded FRUs) +
    /// components + service-endpoints + component-ethernet-interfaces.
    /// Returns the IDs of components whose stored value materially changed
    /// (new components count as changed), so the caller can notify.
    async fn commit_discovery(&self, bundle: DiscoveryBundle) -> Result<Vec<XName>, StoreError>;
}
