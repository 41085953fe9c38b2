use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Duration as ChronoDuration;
use hsm_domain::{
    Component, ComponentEndpoint, ComponentFilter, DiscoveryBundle, Flag, Group, Membership, Partition,
    ProcessingModel as WireProcessingModel, RedfishEndpoint, Role, SoftwareStatus, State as CompState, SubRole,
    Subscription, TriggerFilter, Update, UpdatePayload, XName,
};
use hsm_engine::ProcessingModel;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

fn xname(raw: &str) -> Result<XName, ApiError> {
    XName::normalize(raw).map_err(ApiError::from)
}

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn ready(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.list_endpoints().await?;
    Ok(StatusCode::OK)
}

// ── Components ────────────────────────────────────────────────────────────────

pub async fn list_components(
    State(state): State<AppState>,
    Query(filter): Query<ComponentFilter>,
) -> Result<Json<Vec<Component>>, ApiError> {
    Ok(Json(state.store.list_components(&filter).await?))
}

pub async fn get_component(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Component>, ApiError> {
    let id = xname(&id)?;
    let component =
        state.store.get_component(&id).await?.ok_or_else(|| ApiError::not_found(format!("component {id}")))?;
    Ok(Json(component))
}

pub async fn put_component(
    State(state): State<AppState>,
    Json(component): Json<Component>,
) -> Result<StatusCode, ApiError> {
    state.store.put_component(component).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_component(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = xname(&id)?;
    state.store.delete_component(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct BulkStateBody {
    pub component_ids: Vec<String>,
    pub state: CompState,
    pub flag: Option<Flag>,
    #[serde(default)]
    pub force: bool,
}

/// POST bulk `StateData` update (§6 "bulk field patches"; §4.2). This
/// is the one update type with the legal-transition matrix attached, so it
/// gets its own body shape rather than a generic `{state, flag}` payload.
pub async fn bulk_state(
    State(state): State<AppState>,
    Json(body): Json<BulkStateBody>,
) -> Result<Json<Value>, ApiError> {
    let ids = parse_ids(&body.component_ids)?;
    let update = Update {
        component_ids: ids,
        payload: UpdatePayload::StateData { state: body.state, flag: body.flag },
        force: body.force,
    };
    apply_and_report(&state, update).await
}

#[derive(Debug, Deserialize)]
pub struct BulkFlagBody {
    pub component_ids: Vec<String>,
    pub flag: Flag,
}

pub async fn bulk_flag(
    State(state): State<AppState>,
    Json(body): Json<BulkFlagBody>,
) -> Result<Json<Value>, ApiError> {
    let ids = parse_ids(&body.component_ids)?;
    let update = Update { component_ids: ids, payload: UpdatePayload::FlagOnly { flag: body.flag }, force: false };
    apply_and_report(&state, update).await
}

#[derive(Debug, Deserialize)]
pub struct BulkEnabledBody {
    pub component_ids: Vec<String>,
    pub enabled: bool,
}

pub async fn bulk_enabled(
    State(state): State<AppState>,
    Json(body): Json<BulkEnabledBody>,
) -> Result<Json<Value>, ApiError> {
    let ids = parse_ids(&body.component_ids)?;
    let update = Update { component_ids: ids, payload: UpdatePayload::Enabled { enabled: body.enabled }, force: false };
    apply_and_report(&state, update).await
}

#[derive(Debug, Deserialize)]
pub struct BulkSoftwareStatusBody {
    pub component_ids: Vec<String>,
    pub software_status: SoftwareStatus,
}

pub async fn bulk_software_status(
    State(state): State<AppState>,
    Json(body): Json<BulkSoftwareStatusBody>,
) -> Result<Json<Value>, ApiError> {
    let ids = parse_ids(&body.component_ids)?;
    let update = Update {
        component_ids: ids,
        payload: UpdatePayload::SoftwareStatus { software_status: body.software_status },
        force: false,
    };
    apply_and_report(&state, update).await
}

#[derive(Debug, Deserialize)]
pub struct BulkRoleBody {
    pub component_ids: Vec<String>,
    pub role: Role,
    pub sub_role: Option<SubRole>,
}

pub async fn bulk_role(
    State(state): State<AppState>,
    Json(body): Json<BulkRoleBody>,
) -> Result<Json<Value>, ApiError> {
    let ids = parse_ids(&body.component_ids)?;
    let update = Update {
        component_ids: ids,
        payload: UpdatePayload::Role { role: body.role, sub_role: body.sub_role },
        force: false,
    };
    apply_and_report(&state, update).await
}

#[derive(Debug, Deserialize)]
pub struct NidBody {
    pub nid: hsm_domain::Nid,
}

/// PUT a single component's `NID` (§4.2: "`NID`: accepts exactly one
/// ID; multiple IDs is `TooManyIDs`" — enforced by the engine, not here).
pub async fn set_nid(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NidBody>,
) -> Result<Json<Value>, ApiError> {
    let id = xname(&id)?;
    let update = Update { component_ids: vec![id], payload: UpdatePayload::Nid { nid: body.nid }, force: false };
    apply_and_report(&state, update).await
}

async fn apply_and_report(state: &AppState, update: Update) -> Result<Json<Value>, ApiError> {
    let outcome = hsm_engine::apply_update(&state.engine, &state.dispatcher, &state.polling, update).await?;
    Ok(Json(json!({ "changed": outcome.changed })))
}

fn parse_ids(raw: &[String]) -> Result<Vec<XName>, ApiError> {
    raw.iter().map(|s| xname(s)).collect()
}

// ── Redfish endpoints ─────────────────────────────────────────────────────────

pub async fn list_endpoints(State(state): State<AppState>) -> Result<Json<Vec<RedfishEndpoint>>, ApiError> {
    Ok(Json(state.store.list_endpoints().await?))
}

pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RedfishEndpoint>, ApiError> {
    let id = xname(&id)?;
    let endpoint =
        state.store.get_endpoint(&id).await?.ok_or_else(|| ApiError::not_found(format!("endpoint {id}")))?;
    Ok(Json(endpoint))
}

pub async fn put_endpoint(
    State(state): State<AppState>,
    Json(endpoint): Json<RedfishEndpoint>,
) -> Result<StatusCode, ApiError> {
    if !endpoint.id.is_controller() {
        return Err(ApiError::bad_request(format!("{} is not a controller xname", endpoint.id)));
    }
    state.store.put_endpoint(endpoint).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Deletes the endpoint and forces every owned `ComponentEndpoint`'s
/// component to `Empty` (§3 `ComponentEndpoint` invariant) — the
/// store only deletes rows; the cascade and its notification are the
/// caller's job.
pub async fn delete_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = xname(&id)?;
    let orphaned = state.store.delete_component_endpoints_by_endpoint(&id).await?;
    state.store.delete_endpoint(&id).await?;

    let ids: Vec<XName> = orphaned.into_iter().map(|ce| ce.id).collect();
    if !ids.is_empty() {
        let update = Update {
            component_ids: ids.clone(),
            payload: UpdatePayload::StateData { state: CompState::Empty, flag: None },
            force: true,
        };
        hsm_engine::apply_update(&state.engine, &state.dispatcher, &state.polling, update).await?;
    }
    Ok(Json(json!({ "emptied": ids })))
}

pub async fn list_component_endpoints_by_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ComponentEndpoint>>, ApiError> {
    let id = xname(&id)?;
    Ok(Json(state.store.list_component_endpoints_by_endpoint(&id).await?))
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Commits one discovery pass atomically (§4.8) and notifies for
/// every materially-changed component.
pub async fn commit_discovery(
    State(state): State<AppState>,
    Json(bundle): Json<DiscoveryBundle>,
) -> Result<Json<Value>, ApiError> {
    let changed = state.store.commit_discovery(bundle).await?;
    if !changed.is_empty() {
        state
            .dispatcher
            .dispatch(changed.clone(), hsm_domain::TriggerType::State, "discovered".to_string())
            .await?;
    }
    state.index.force_sync().await?;
    Ok(Json(json!({ "changed": changed })))
}

// ── Event ingest ──────────────────────────────────────────────────────────────

/// Webhook alternative to a message-bus consumer (§6): the request body is
/// forwarded verbatim to the normalizer. Always accepted — a malformed or
/// unrecognized body is a dropped event, not a client error, per the
/// normalizer's own failure semantics.
pub async fn ingest_event(State(state): State<AppState>, body: Bytes) -> StatusCode {
    state.pipeline.ingest(&body).await;
    StatusCode::ACCEPTED
}

// ── Groups / partitions / membership ─────────────────────────────────────────

pub async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(state.store.list_groups().await?))
}

pub async fn get_group(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Group>, ApiError> {
    let group = state.store.get_group(&name).await?.ok_or_else(|| ApiError::not_found(format!("group {name}")))?;
    Ok(Json(group))
}

/// Enforces the exclusive-group invariant (§3) before writing: a
/// component may belong to at most one group in any exclusive set.
pub async fn put_group(State(state): State<AppState>, Json(group): Json<Group>) -> Result<StatusCode, ApiError> {
    if group.exclusive_group.is_some() {
        let existing = state.store.list_groups().await?;
        for member in &group.members {
            hsm_graph::check_exclusive_membership(member, &group, &existing)?;
        }
    }
    state.store.put_group(group).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_group(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    state.store.delete_group(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_partitions(State(state): State<AppState>) -> Result<Json<Vec<Partition>>, ApiError> {
    Ok(Json(state.store.list_partitions().await?))
}

pub async fn get_partition(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Partition>, ApiError> {
    let partition =
        state.store.get_partition(&name).await?.ok_or_else(|| ApiError::not_found(format!("partition {name}")))?;
    Ok(Json(partition))
}

/// Enforces the single-partition invariant (§3) before writing.
pub async fn put_partition(
    State(state): State<AppState>,
    Json(partition): Json<Partition>,
) -> Result<StatusCode, ApiError> {
    for member in &partition.members {
        let membership = state.store.get_membership(member).await?;
        hsm_graph::check_single_partition(member, &partition.name, &membership)?;
    }
    state.store.put_partition(partition).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_partition(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_partition(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_membership(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Membership>, ApiError> {
    let id = xname(&id)?;
    Ok(Json(state.store.get_membership(&id).await?))
}

/// Enforces the same exclusive-group and single-partition invariants (§3)
/// as [`put_group`]/[`put_partition`] — a direct `PUT` here is the other
/// way a client can place a component into a group or partition, and must
/// be held to the same rules.
pub async fn put_membership(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(membership): Json<Membership>,
) -> Result<StatusCode, ApiError> {
    let id = xname(&id)?;

    if !membership.groups.is_empty() {
        let existing = state.store.list_groups().await?;
        for name in &membership.groups {
            let target = existing
                .iter()
                .find(|g| &g.name == name)
                .ok_or_else(|| ApiError::not_found(format!("group {name}")))?;
            hsm_graph::check_exclusive_membership(&id, target, &existing)?;
        }
    }

    if let Some(partition) = &membership.partition {
        state
            .store
            .get_partition(partition)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("partition {partition}")))?;
        let current = state.store.get_membership(&id).await?;
        hsm_graph::check_single_partition(&id, partition, &current)?;
    }

    state.store.put_membership(&id, membership).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Reservations (V2) ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReserveBody {
    pub component_ids: Vec<String>,
    /// Lease duration in seconds; absent means a permanent (Locked)
    /// reservation (§4.3).
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub processing_model: Option<WireProcessingModel>,
}

fn model_of(raw: Option<WireProcessingModel>) -> ProcessingModel {
    raw.map(ProcessingModel::from).unwrap_or(ProcessingModel::Rigid)
}

pub async fn reserve(State(state): State<AppState>, Json(body): Json<ReserveBody>) -> Result<Json<Value>, ApiError> {
    let ids = parse_ids(&body.component_ids)?;
    let duration = body.duration_secs.map(ChronoDuration::seconds);
    let model = model_of(body.processing_model);
    let outcome = state.reservations.reserve(&ids, duration, model).await?;
    Ok(Json(json!(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct RenewBody {
    pub component_ids: Vec<String>,
    pub reservation_key: String,
    pub duration_secs: i64,
    #[serde(default)]
    pub processing_model: Option<WireProcessingModel>,
}

pub async fn renew(State(state): State<AppState>, Json(body): Json<RenewBody>) -> Result<Json<Value>, ApiError> {
    let ids: Vec<(XName, String)> =
        parse_ids(&body.component_ids)?.into_iter().map(|id| (id, body.reservation_key.clone())).collect();
    let model = model_of(body.processing_model);
    let outcome = state.reservations.renew(&ids, ChronoDuration::seconds(body.duration_secs), model).await?;
    Ok(Json(json!(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct ReleaseBody {
    pub component_ids: Vec<String>,
    pub reservation_key: String,
    #[serde(default)]
    pub processing_model: Option<WireProcessingModel>,
}

pub async fn release(State(state): State<AppState>, Json(body): Json<ReleaseBody>) -> Result<Json<Value>, ApiError> {
    let ids: Vec<(XName, String)> =
        parse_ids(&body.component_ids)?.into_iter().map(|id| (id, body.reservation_key.clone())).collect();
    let model = model_of(body.processing_model);
    let outcome = state.reservations.release(&ids, model).await?;
    Ok(Json(json!(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct IdsBody {
    pub component_ids: Vec<String>,
}

pub async fn force_release(
    State(state): State<AppState>,
    Json(body): Json<IdsBody>,
) -> Result<Json<Value>, ApiError> {
    let ids = parse_ids(&body.component_ids)?;
    let released = state.reservations.force_release(&ids).await?;
    Ok(Json(json!({ "released": released })))
}

#[derive(Debug, Deserialize)]
pub struct CheckBody {
    pub deputy_keys: Vec<String>,
}

pub async fn check_deputy_keys(
    State(state): State<AppState>,
    Json(body): Json<CheckBody>,
) -> Result<Json<Value>, ApiError> {
    let (valid, invalid) = state.reservations.check(&body.deputy_keys).await?;
    Ok(Json(json!({ "valid": valid, "invalid": invalid })))
}

pub async fn reservation_status(
    State(state): State<AppState>,
    Json(body): Json<IdsBody>,
) -> Result<Json<Value>, ApiError> {
    let ids = parse_ids(&body.component_ids)?;
    let statuses = state.reservations.status(&ids).await?;
    Ok(Json(json!(statuses)))
}

// ── Admin lock operations ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LockBody {
    pub component_ids: Vec<String>,
    #[serde(default)]
    pub force: bool,
}

pub async fn lock(State(state): State<AppState>, Json(body): Json<LockBody>) -> Result<StatusCode, ApiError> {
    for id in parse_ids(&body.component_ids)? {
        state.reservations.set_locked(&id, true, body.force).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unlock(State(state): State<AppState>, Json(body): Json<LockBody>) -> Result<StatusCode, ApiError> {
    for id in parse_ids(&body.component_ids)? {
        state.reservations.set_locked(&id, false, body.force).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn disable(State(state): State<AppState>, Json(body): Json<LockBody>) -> Result<StatusCode, ApiError> {
    for id in parse_ids(&body.component_ids)? {
        state.reservations.set_reservations_disabled(&id, true, body.force).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn repair(State(state): State<AppState>, Json(body): Json<LockBody>) -> Result<StatusCode, ApiError> {
    for id in parse_ids(&body.component_ids)? {
        state.reservations.set_reservations_disabled(&id, false, body.force).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Subscriptions ─────────────────────────────────────────────────────────────

pub async fn list_subscriptions(State(state): State<AppState>) -> Result<Json<Vec<Subscription>>, ApiError> {
    Ok(Json(state.store.list_subscriptions().await?))
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionBody {
    pub id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub triggers: TriggerFilter,
}

pub async fn put_subscription(
    State(state): State<AppState>,
    Json(body): Json<SubscriptionBody>,
) -> Result<Json<Subscription>, ApiError> {
    let subscription = Subscription {
        id: body.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        url: body.url,
        triggers: body.triggers,
    };
    state.store.put_subscription(subscription.clone()).await?;
    Ok(Json(subscription))
}

pub async fn delete_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_subscription(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Status ────────────────────────────────────────────────────────────────────

/// A coarse inventory summary — component/endpoint counts by nothing more
/// than presence, the one thing every operator CLI wants at a glance.
/// Every table the REST surface (§6) exposes is countable from
/// `Persistence` alone.
pub async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let components = state.store.list_components(&ComponentFilter::default()).await?;
    let endpoints = state.store.list_endpoints().await?;
    Ok(Json(json!({
        "components": components.len(),
        "endpoints": endpoints.len(),
    })))
}
