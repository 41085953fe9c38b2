use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hsm_domain::{
    Component, ComponentEndpoint, ComponentFilter, DiscoveryBundle, Group, HwInventoryFru,
    HwInventoryHistoryEntry, HwInventoryLocation, Job, Membership, Partition, RedfishEndpoint,
    Reservation, Subscription, XName,
};
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::StoreError;
use crate::store::Persistence;

// DDL — idempotent; run at every startup via migrate(). One JSONB blob per
// row keyed by the entity's natural id; filtering happens in Rust over the
// fetched rows rather than via generated SQL predicates (a single JSONB
// column per table, not one column per field).
const MIGRATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS components (
    id         TEXT PRIMARY KEY,
    data       JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE TABLE IF NOT EXISTS redfish_endpoints (
    id   TEXT PRIMARY KEY,
    data JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS component_endpoints (
    endpoint_id TEXT NOT NULL,
    odata_id    TEXT NOT NULL,
    data        JSONB NOT NULL,
    PRIMARY KEY (endpoint_id, odata_id)
);
CREATE TABLE IF NOT EXISTS hwinv_by_location (
    id   TEXT PRIMARY KEY,
    data JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS hwinv_by_fru (
    fru_id TEXT PRIMARY KEY,
    data   JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS hwinv_history (
    seq  BIGSERIAL PRIMARY KEY,
    fru_id TEXT NOT NULL,
    data JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_hwinv_history_fru ON hwinv_history (fru_id);
CREATE TABLE IF NOT EXISTS groups (
    name TEXT PRIMARY KEY,
    data JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS partitions (
    name TEXT PRIMARY KEY,
    data JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS memberships (
    component_id TEXT PRIMARY KEY,
    data         JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS reservations (
    component_id TEXT PRIMARY KEY,
    data         JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS scn_subscriptions (
    id   TEXT PRIMARY KEY,
    data JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS jobs (
    job_id TEXT PRIMARY KEY,
    data   JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS service_endpoints (
    endpoint_id  TEXT NOT NULL,
    service_name TEXT NOT NULL,
    data         JSONB NOT NULL,
    PRIMARY KEY (endpoint_id, service_name)
);
CREATE TABLE IF NOT EXISTS comp_eth_interfaces (
    id   TEXT PRIMARY KEY,
    data JSONB NOT NULL
);
"#;

/// Persistent [`Persistence`] implementation backed by PostgreSQL: one JSONB
/// blob per row, schema created idempotently at `connect()`, filtered/bulk
/// queries implemented over the fetched `Vec` rather than generated
/// predicates. This is the backend capable of satisfying the durability and
/// cross-table atomic `commit_discovery` requirement in a real deployment.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url).await.map_err(|e| StoreError::Internal(format!("postgres connect: {e}")))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(MIGRATIONS)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(format!("migration: {e}")))?;
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(v: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(v).map_err(StoreError::Serialization)
}

fn from_json<T: serde::de::DeserializeOwned>(v: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(v).map_err(StoreError::Serialization)
}

/// Mirrors [`crate::memory::InMemoryStore`]'s change-detection so
/// `commit_discovery` reports the same "materially changed" semantics
/// regardless of backend.
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

async fn fetch_all_components(pool: &PgPool) -> Result<Vec<Component>, StoreError> {
    let rows: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM components")
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
    rows.into_iter().map(|(v,)| from_json(v)).collect()
}

#[async_trait]
impl Persistence for PostgresStore {
    async fn get_component(&self, id: &XName) -> Result<Option<Component>, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM components WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(|(v,)| from_json(v)).transpose()
    }

    async fn list_components(&self, filter: &ComponentFilter) -> Result<Vec<Component>, StoreError> {
        let all = fetch_all_components(&self.pool).await?;
        let mut out = Vec::new();
        for c in all {
            let membership = self.get_membership(&c.id).await?;
            if filter.matches(&c, Some(&membership)) {
                out.push(c);
            }
        }
        Ok(out)
    }

    async fn put_component(&self, component: Component) -> Result<(), StoreError> {
        let data = to_json(&component)?;
        sqlx::query("INSERT INTO components (id, data) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET data = $2, updated_at = NOW()")
            .bind(component.id.as_str())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_component(&self, id: &XName) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM components WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn bulk_put_components(&self, components: Vec<Component>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Internal(e.to_string()))?;
        for component in components {
            let data = to_json(&component)?;
            sqlx::query("INSERT INTO components (id, data) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET data = $2, updated_at = NOW()")
                .bind(component.id.as_str())
                .bind(data)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        tx.commit().await.map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_endpoint(&self, id: &XName) -> Result<Option<RedfishEndpoint>, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM redfish_endpoints WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(|(v,)| from_json(v)).transpose()
    }

    async fn list_endpoints(&self) -> Result<Vec<RedfishEndpoint>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM redfish_endpoints")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter().map(|(v,)| from_json(v)).collect()
    }

    async fn put_endpoint(&self, endpoint: RedfishEndpoint) -> Result<(), StoreError> {
        let data = to_json(&endpoint)?;
        sqlx::query("INSERT INTO redfish_endpoints (id, data) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET data = $2")
            .bind(endpoint.id.as_str())
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_endpoint(&self, id: &XName) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM redfish_endpoints WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_component_endpoint(
        &self,
        endpoint_id: &XName,
        odata_id: &str,
    ) -> Result<Option<ComponentEndpoint>, StoreError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT data FROM component_endpoints WHERE endpoint_id = $1 AND odata_id = $2")
                .bind(endpoint_id.as_str())
                .bind(odata_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(|(v,)| from_json(v)).transpose()
    }

    async fn list_component_endpoints(&self) -> Result<Vec<ComponentEndpoint>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM component_endpoints")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter().map(|(v,)| from_json(v)).collect()
    }

    async fn list_component_endpoints_by_endpoint(
        &self,
        endpoint_id: &XName,
    ) -> Result<Vec<ComponentEndpoint>, StoreError> {
        let rows: Vec<(serde_json::Value,)> =
            sqlx::query_as("SELECT data FROM component_endpoints WHERE endpoint_id = $1")
                .bind(endpoint_id.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter().map(|(v,)| from_json(v)).collect()
    }

    async fn put_component_endpoint(&self, ce: ComponentEndpoint) -> Result<(), StoreError> {
        let data = to_json(&ce)?;
        sqlx::query(
            "INSERT INTO component_endpoints (endpoint_id, odata_id, data) VALUES ($1, $2, $3) \
             ON CONFLICT (endpoint_id, odata_id) DO UPDATE SET data = $3",
        )
        .bind(ce.endpoint_id.as_str())
        .bind(&ce.odata_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_component_endpoints_by_endpoint(
        &self,
        endpoint_id: &XName,
    ) -> Result<Vec<ComponentEndpoint>, StoreError> {
        let removed = self.list_component_endpoints_by_endpoint(endpoint_id).await?;
        sqlx::query("DELETE FROM component_endpoints WHERE endpoint_id = $1")
            .bind(endpoint_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(removed)
    }

    async fn put_hwinv_location(&self, location: HwInventoryLocation) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Internal(e.to_string()))?;
        if let Some(fru) = &location.populated_fru {
            let fru_data = to_json(fru)?;
            sqlx::query("INSERT INTO hwinv_by_fru (fru_id, data) VALUES ($1, $2) ON CONFLICT (fru_id) DO UPDATE SET data = $2")
                .bind(&fru.fru_id)
                .bind(fru_data)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        let data = to_json(&location)?;
        sqlx::query("INSERT INTO hwinv_by_location (id, data) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET data = $2")
            .bind(location.id.as_str())
            .bind(data)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        tx.commit().await.map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_hwinv_location(&self, id: &XName) -> Result<Option<HwInventoryLocation>, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM hwinv_by_location WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(|(v,)| from_json(v)).transpose()
    }

    async fn get_hwinv_fru(&self, fru_id: &str) -> Result<Option<HwInventoryFru>, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM hwinv_by_fru WHERE fru_id = $1")
            .bind(fru_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(|(v,)| from_json(v)).transpose()
    }

    async fn append_hwinv_history(&self, entry: HwInventoryHistoryEntry) -> Result<(), StoreError> {
        let data = to_json(&entry)?;
        sqlx::query("INSERT INTO hwinv_history (fru_id, data) VALUES ($1, $2)")
            .bind(&entry.fru_id)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn list_hwinv_history(&self, fru_id: &str) -> Result<Vec<HwInventoryHistoryEntry>, StoreError> {
        let rows: Vec<(serde_json::Value,)> =
            sqlx::query_as("SELECT data FROM hwinv_history WHERE fru_id = $1 ORDER BY seq")
                .bind(fru_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter().map(|(v,)| from_json(v)).collect()
    }

    async fn get_group(&self, name: &str) -> Result<Option<Group>, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM groups WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(|(v,)| from_json(v)).transpose()
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM groups")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter().map(|(v,)| from_json(v)).collect()
    }

    async fn put_group(&self, group: Group) -> Result<(), StoreError> {
        let data = to_json(&group)?;
        sqlx::query("INSERT INTO groups (name, data) VALUES ($1, $2) ON CONFLICT (name) DO UPDATE SET data = $2")
            .bind(&group.name)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_group(&self, name: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM groups WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_partition(&self, name: &str) -> Result<Option<Partition>, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM partitions WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(|(v,)| from_json(v)).transpose()
    }

    async fn list_partitions(&self) -> Result<Vec<Partition>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM partitions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter().map(|(v,)| from_json(v)).collect()
    }

    async fn put_partition(&self, partition: Partition) -> Result<(), StoreError> {
        let data = to_json(&partition)?;
        sqlx::query("INSERT INTO partitions (name, data) VALUES ($1, $2) ON CONFLICT (name) DO UPDATE SET data = $2")
            .bind(&partition.name)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_partition(&self, name: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM partitions WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_membership(&self, component_id: &XName) -> Result<Membership, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM memberships WHERE component_id = $1")
            .bind(component_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        match row {
            Some((v,)) => from_json(v),
            None => Ok(Membership::default()),
        }
    }

    async fn put_membership(&self, component_id: &XName, membership: Membership) -> Result<(), StoreError> {
        let data = to_json(&membership)?;
        sqlx::query(
            "INSERT INTO memberships (component_id, data) VALUES ($1, $2) ON CONFLICT (component_id) DO UPDATE SET data = $2",
        )
        .bind(component_id.as_str())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_reservation(&self, component_id: &XName) -> Result<Option<Reservation>, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM reservations WHERE component_id = $1")
            .bind(component_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(|(v,)| from_json(v)).transpose()
    }

    async fn list_reservations(&self, component_ids: &[XName]) -> Result<Vec<Reservation>, StoreError> {
        let mut out = Vec::new();
        for id in component_ids {
            if let Some(r) = self.get_reservation(id).await? {
                out.push(r);
            }
        }
        Ok(out)
    }

    async fn get_reservation_by_deputy_key(&self, deputy_key: &str) -> Result<Option<Reservation>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM reservations")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        for (v,) in rows {
            let r: Reservation = from_json(v)?;
            if r.deputy_key == deputy_key {
                return Ok(Some(r));
            }
        }
        Ok(None)
    }

    async fn put_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        let data = to_json(&reservation)?;
        sqlx::query(
            "INSERT INTO reservations (component_id, data) VALUES ($1, $2) ON CONFLICT (component_id) DO UPDATE SET data = $2",
        )
        .bind(reservation.component_id.as_str())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_reservation(&self, component_id: &XName) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM reservations WHERE component_id = $1")
            .bind(component_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn sweep_expired_reservations(&self, now: DateTime<Utc>) -> Result<Vec<XName>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM reservations")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut expired = Vec::new();
        for (v,) in rows {
            let r: Reservation = from_json(v)?;
            if r.expiration.is_some_and(|exp| exp <= now) {
                expired.push(r.component_id);
            }
        }
        for id in &expired {
            self.delete_reservation(id).await?;
        }
        Ok(expired)
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM scn_subscriptions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.into_iter().map(|(v,)| from_json(v)).collect()
    }

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM scn_subscriptions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(|(v,)| from_json(v)).transpose()
    }

    async fn put_subscription(&self, subscription: Subscription) -> Result<(), StoreError> {
        let data = to_json(&subscription)?;
        sqlx::query("INSERT INTO scn_subscriptions (id, data) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET data = $2")
            .bind(&subscription.id)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_subscription(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM scn_subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.map(|(v,)| from_json(v)).transpose()
    }

    async fn get_job_by_component(&self, component_id: &XName) -> Result<Option<Job>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT data FROM jobs")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        for (v,) in rows {
            let j: Job = from_json(v)?;
            if &j.component_id == component_id {
                return Ok(Some(j));
            }
        }
        Ok(None)
    }

    async fn put_job(&self, job: Job) -> Result<(), StoreError> {
        let data = to_json(&job)?;
        sqlx::query("INSERT INTO jobs (job_id, data) VALUES ($1, $2) ON CONFLICT (job_id) DO UPDATE SET data = $2")
            .bind(&job.job_id)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM jobs WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn commit_discovery(&self, bundle: DiscoveryBundle) -> Result<Vec<XName>, StoreError> {
        let mut tx: Transaction<'_, Postgres> =
            self.pool.begin().await.map_err(|e| StoreError::Internal(e.to_string()))?;

        if let Some(endpoint) = &bundle.endpoint {
            let data = to_json(endpoint)?;
            sqlx::query("INSERT INTO redfish_endpoints (id, data) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET data = $2")
                .bind(endpoint.id.as_str())
                .bind(data)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }

        for ce in &bundle.component_endpoints {
            let data = to_json(ce)?;
            sqlx::query(
                "INSERT INTO component_endpoints (endpoint_id, odata_id, data) VALUES ($1, $2, $3) \
                 ON CONFLICT (endpoint_id, odata_id) DO UPDATE SET data = $3",
            )
            .bind(ce.endpoint_id.as_str())
            .bind(&ce.odata_id)
            .bind(data)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        }

        for loc in &bundle.hwinv_locations {
            if let Some(fru) = &loc.populated_fru {
                let fru_data = to_json(fru)?;
                sqlx::query("INSERT INTO hwinv_by_fru (fru_id, data) VALUES ($1, $2) ON CONFLICT (fru_id) DO UPDATE SET data = $2")
                    .bind(&fru.fru_id)
                    .bind(fru_data)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Internal(e.to_string()))?;
            }
            let data = to_json(loc)?;
            sqlx::query("INSERT INTO hwinv_by_location (id, data) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET data = $2")
                .bind(loc.id.as_str())
                .bind(data)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }

        for se in &bundle.service_endpoints {
            let data = to_json(se)?;
            sqlx::query(
                "INSERT INTO service_endpoints (endpoint_id, service_name, data) VALUES ($1, $2, $3) \
                 ON CONFLICT (endpoint_id, service_name) DO UPDATE SET data = $3",
            )
            .bind(se.endpoint_id.as_str())
            .bind(&se.service_name)
            .bind(data)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        }

        for eth in &bundle.eth_interfaces {
            let data = to_json(eth)?;
            sqlx::query("INSERT INTO comp_eth_interfaces (id, data) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET data = $2")
                .bind(&eth.id)
                .bind(data)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }

        let mut changed = Vec::new();
        for component in &bundle.components {
            let existing: Option<(serde_json::Value,)> =
                sqlx::query_as("SELECT data FROM components WHERE id = $1")
                    .bind(component.id.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Internal(e.to_string()))?;
            let old: Option<Component> = existing.map(|(v,)| from_json(v)).transpose()?;
            if component_changed(old.as_ref(), component) {
                changed.push(component.id.clone());
            }
            let data = to_json(component)?;
            sqlx::query("INSERT INTO components (id, data) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET data = $2, updated_at = NOW()")
                .bind(component.id.as_str())
                .bind(data)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| StoreError::Internal(e.to_string()))?;
        changed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(changed)
    }
}
