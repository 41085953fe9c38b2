use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hsm_domain::{FailureReason, Reservation, XName};
use hsm_store::Persistence;
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineError;

/// Every multi-ID Reservation Manager operation accepts one of these
/// processing models (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingModel {
    /// Any per-ID failure aborts and rolls back the whole batch.
    Rigid,
    /// Best-effort: partition into `success`/`failure` with per-ID reasons.
    Flexible,
}

/// `hsm_domain::ProcessingModel` is the wire-level field the REST body
/// deserializes; this is the orchestration-level type the manager's
/// methods take. Kept distinct so the manager doesn't depend on the wire
/// schema, bridged with a plain conversion at the boundary.
impl From<hsm_domain::ProcessingModel> for ProcessingModel {
    fn from(m: hsm_domain::ProcessingModel) -> Self {
        match m {
            hsm_domain::ProcessingModel::Rigid => ProcessingModel::Rigid,
            hsm_domain::ProcessingModel::Flexible => ProcessingModel::Flexible,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome<T> {
    pub success: Vec<T>,
    pub failure: Vec<(XName, FailureReason)>,
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Reservation Manager (§4.3): leased reservations with expiry,
/// renewal, forced release, and the admin lock/unlock/disable/repair
/// operations that gate reservability.
pub struct ReservationManager {
    store: Arc<dyn Persistence>,
}

impl ReservationManager {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// `Reserve(ids, duration?)`: a `duration` means the component must be
    /// `Unlocked`; its absence means the component must be `Locked` (the
    /// reservation then persists as long as the lock does). Always assigns
    /// fresh, opaque `(reservationKey, deputyKey)` tokens.
    pub async fn reserve(
        &self,
        ids: &[XName],
        duration: Option<Duration>,
        model: ProcessingModel,
    ) -> Result<BatchOutcome<Reservation>, EngineError> {
        let mut out = BatchOutcome::default();
        let mut to_write = Vec::new();
        for id in ids {
            match self.try_reserve_one(id, duration).await? {
                Ok(reservation) => {
                    out.success.push(reservation.clone());
                    to_write.push(reservation);
                }
                Err(reason) => {
                    if model == ProcessingModel::Rigid {
                        return Err(EngineError::Conflict(format!("reserve {id}: {reason:?}")));
                    }
                    out.failure.push((id.clone(), reason));
                }
            }
        }
        for r in to_write {
            self.store.put_reservation(r).await?;
        }
        Ok(out)
    }

    async fn try_reserve_one(&self, id: &XName, duration: Option<Duration>) -> Result<Result<Reservation, FailureReason>, EngineError> {
        let component = match self.store.get_component(id).await? {
            Some(c) => c,
            None => return Ok(Err(FailureReason::NotFound)),
        };
        if component.reservations_disabled {
            return Ok(Err(FailureReason::Disabled));
        }
        if self.store.get_reservation(id).await?.is_some() {
            return Ok(Err(FailureReason::ReservationConflict));
        }
        let locked_ok = match duration {
            Some(_) => !component.locked,
            None => component.locked,
        };
        if !locked_ok {
            return Ok(Err(FailureReason::BadState));
        }
        let now = Utc::now();
        Ok(Ok(Reservation {
            component_id: id.clone(),
            reservation_key: new_token(),
            deputy_key: new_token(),
            expiration: duration.map(|d| now + d),
            created_at: now,
        }))
    }

    /// `Renew(ids, reservationKey)`: extend expiration. Forbidden for
    /// reservations carrying no expiration (those backed by a lock).
    pub async fn renew(
        &self,
        ids: &[(XName, String)],
        duration: Duration,
        model: ProcessingModel,
    ) -> Result<BatchOutcome<Reservation>, EngineError> {
        let mut out = BatchOutcome::default();
        let mut to_write = Vec::new();
        for (id, key) in ids {
            match self.try_renew_one(id, key, duration).await? {
                Ok(r) => {
                    out.success.push(r.clone());
                    to_write.push(r);
                }
                Err(reason) => {
                    if model == ProcessingModel::Rigid {
                        return Err(EngineError::Conflict(format!("renew {id}: {reason:?}")));
                    }
                    out.failure.push((id.clone(), reason));
                }
            }
        }
        for r in to_write {
            self.store.put_reservation(r).await?;
        }
        Ok(out)
    }

    async fn try_renew_one(&self, id: &XName, key: &str, duration: Duration) -> Result<Result<Reservation, FailureReason>, EngineError> {
        let mut reservation = match self.store.get_reservation(id).await? {
            Some(r) => r,
            None => return Ok(Err(FailureReason::NotFound)),
        };
        if reservation.reservation_key != key {
            return Ok(Err(FailureReason::InvalidKey));
        }
        let Some(expiration) = reservation.expiration else {
            return Ok(Err(FailureReason::BadState));
        };
        let _ = expiration;
        reservation.expiration = Some(Utc::now() + duration);
        Ok(Ok(reservation))
    }

    /// `Release(ids, reservationKey)`.
    pub async fn release(&self, ids: &[(XName, String)], model: ProcessingModel) -> Result<BatchOutcome<XName>, EngineError> {
        let mut out = BatchOutcome::default();
        for (id, key) in ids {
            let reservation = self.store.get_reservation(id).await?;
            match reservation {
                None => {
                    if model == ProcessingModel::Rigid {
                        return Err(EngineError::NotFound(id.as_str().to_string()));
                    }
                    out.failure.push((id.clone(), FailureReason::NotFound));
                }
                Some(r) if r.reservation_key != *key => {
                    if model == ProcessingModel::Rigid {
                        return Err(EngineError::Conflict(format!("release {id}: invalid key")));
                    }
                    out.failure.push((id.clone(), FailureReason::InvalidKey));
                }
                Some(_) => {
                    self.store.delete_reservation(id).await?;
                    out.success.push(id.clone());
                }
            }
        }
        Ok(out)
    }

    /// `ForceRelease(ids)` — admin override, ignores keys entirely.
    pub async fn force_release(&self, ids: &[XName]) -> Result<Vec<XName>, EngineError> {
        let mut released = Vec::new();
        for id in ids {
            if self.store.get_reservation(id).await?.is_some() {
                self.store.delete_reservation(id).await?;
                released.push(id.clone());
            }
        }
        Ok(released)
    }

    /// `Check(deputyKeys)` — third-party validation of delegated keys.
    /// Returns the reservations found plus the subset of keys that did not
    /// resolve to a live reservation.
    pub async fn check(&self, deputy_keys: &[String]) -> Result<(Vec<Reservation>, Vec<String>), EngineError> {
        let mut found = Vec::new();
        let mut invalid = Vec::new();
        for key in deputy_keys {
            match self.store.get_reservation_by_deputy_key(key).await? {
                Some(r) => found.push(r),
                None => invalid.push(key.clone()),
            }
        }
        Ok((found, invalid))
    }

    /// `GetStatus(ids)` — snapshot.
    pub async fn status(&self, ids: &[XName]) -> Result<Vec<Reservation>, EngineError> {
        Ok(self.store.list_reservations(ids).await?)
    }

    /// `SweepExpired()` — background periodic removal; emits no
    /// notifications (§4.3).
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<XName>, EngineError> {
        Ok(self.store.sweep_expired_reservations(now).await?)
    }

    /// `Lock`/`Unlock`: modify the component's locked status. Acting on a
    /// component with a live reservation requires `force`.
    pub async fn set_locked(&self, id: &XName, locked: bool, force: bool) -> Result<(), EngineError> {
        let mut component = self.store.get_component(id).await?.ok_or_else(|| EngineError::NotFound(id.as_str().to_string()))?;
        if !force && self.store.get_reservation(id).await?.is_some() {
            return Err(EngineError::Conflict(format!("{id} has a live reservation; use force")));
        }
        component.locked = locked;
        component.meta.touch(Utc::now());
        self.store.put_component(component).await?;
        Ok(())
    }

    /// `Disable`/`Repair`: modify `reservationsDisabled`. Same `force`
    /// requirement as lock/unlock.
    pub async fn set_reservations_disabled(&self, id: &XName, disabled: bool, force: bool) -> Result<(), EngineError> {
        let mut component = self.store.get_component(id).await?.ok_or_else(|| EngineError::NotFound(id.as_str().to_string()))?;
        if !force && self.store.get_reservation(id).await?.is_some() {
            return Err(EngineError::Conflict(format!("{id} has a live reservation; use force")));
        }
        component.reservations_disabled = disabled;
        component.meta.touch(Utc::now());
        self.store.put_component(component).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_domain::{Component, ComponentType};
    use hsm_store::InMemoryStore;

    fn xn(s: &str) -> XName {
        XName::normalize(s).unwrap()
    }

    async fn seed_unlocked(store: &InMemoryStore, id: &str) -> XName {
        let id = xn(id);
        store.put_component(Component::new(id.clone(), ComponentType::Node, Utc::now())).await.unwrap();
        id
    }

    #[tokio::test]
    async fn reserve_with_duration_requires_unlocked_component() {
        let store = Arc::new(InMemoryStore::new());
        let id = seed_unlocked(&store, "x1c4s4b0n0").await;
        let mgr = ReservationManager::new(store);
        let out = mgr.reserve(&[id.clone()], Some(Duration::minutes(5)), ProcessingModel::Rigid).await.unwrap();
        assert_eq!(out.success.len(), 1);
        assert!(out.success[0].expiration.is_some());
    }

    #[tokio::test]
    async fn reserve_without_duration_requires_locked_component() {
        let store = Arc::new(InMemoryStore::new());
        let id = seed_unlocked(&store, "x1c4s4b0n0").await;
        let mgr = ReservationManager::new(store.clone());
        let out = mgr.reserve(&[id.clone()], None, ProcessingModel::Flexible).await.unwrap();
        assert_eq!(out.failure, vec![(id.clone(), FailureReason::BadState)]);

        mgr.set_locked(&id, true, false).await.unwrap();
        let out2 = mgr.reserve(&[id], None, ProcessingModel::Rigid).await.unwrap();
        assert_eq!(out2.success.len(), 1);
        assert!(out2.success[0].expiration.is_none());
    }

    #[tokio::test]
    async fn reservations_disabled_component_cannot_be_reserved() {
        let store = Arc::new(InMemoryStore::new());
        let id = seed_unlocked(&store, "x1c4s4b0n0").await;
        let mgr = ReservationManager::new(store);
        mgr.set_reservations_disabled(&id, true, false).await.unwrap();
        let out = mgr.reserve(&[id.clone()], Some(Duration::minutes(5)), ProcessingModel::Flexible).await.unwrap();
        assert_eq!(out.failure, vec![(id, FailureReason::Disabled)]);
    }

    #[tokio::test]
    async fn rigid_model_aborts_whole_batch_on_first_failure() {
        let store = Arc::new(InMemoryStore::new());
        let ok_id = seed_unlocked(&store, "x1c4s4b0n0").await;
        let missing_id = xn("x1c4s4b0n1");
        let mgr = ReservationManager::new(store.clone());
        let err = mgr.reserve(&[ok_id.clone(), missing_id], Some(Duration::minutes(1)), ProcessingModel::Rigid).await;
        assert!(err.is_err());
        assert!(store.get_reservation(&ok_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn flexible_model_partitions_success_and_failure() {
        let store = Arc::new(InMemoryStore::new());
        let ok_id = seed_unlocked(&store, "x1c4s4b0n0").await;
        let missing_id = xn("x1c4s4b0n1");
        let mgr = ReservationManager::new(store);
        let out = mgr.reserve(&[ok_id.clone(), missing_id.clone()], Some(Duration::minutes(1)), ProcessingModel::Flexible).await.unwrap();
        assert_eq!(out.success.len(), 1);
        assert_eq!(out.failure, vec![(missing_id, FailureReason::NotFound)]);
    }

    #[tokio::test]
    async fn force_release_ignores_keys() {
        let store = Arc::new(InMemoryStore::new());
        let id = seed_unlocked(&store, "x1c4s4b0n0").await;
        let mgr = ReservationManager::new(store.clone());
        mgr.reserve(&[id.clone()], Some(Duration::minutes(5)), ProcessingModel::Rigid).await.unwrap();
        let released = mgr.force_release(&[id.clone()]).await.unwrap();
        assert_eq!(released, vec![id.clone()]);
        assert!(store.get_reservation(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lock_with_live_reservation_requires_force() {
        let store = Arc::new(InMemoryStore::new());
        let id = seed_unlocked(&store, "x1c4s4b0n0").await;
        let mgr = ReservationManager::new(store);
        mgr.reserve(&[id.clone()], Some(Duration::minutes(5)), ProcessingModel::Rigid).await.unwrap();
        let err = mgr.set_locked(&id, true, false).await;
        assert!(matches!(err, Err(EngineError::Conflict(_))));
        mgr.set_locked(&id, true, true).await.unwrap();
    }

    #[tokio::test]
    async fn renew_without_expiration_is_bad_state() {
        let store = Arc::new(InMemoryStore::new());
        let id = seed_unlocked(&store, "x1c4s4b0n0").await;
        let mgr = ReservationManager::new(store);
        mgr.set_locked(&id, true, false).await.unwrap();
        let r = mgr.reserve(&[id.clone()], None, ProcessingModel::Rigid).await.unwrap();
        let key = r.success[0].reservation_key.clone();
        let out = mgr.renew(&[(id.clone(), key)], Duration::minutes(10), ProcessingModel::Flexible).await.unwrap();
        assert_eq!(out.failure, vec![(id, FailureReason::BadState)]);
    }
}
