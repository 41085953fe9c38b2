use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use hsm_engine::{
    ComponentEndpointIndex, EventPipeline, HttpNotificationTransport, NoopDiscoveryTrigger, NotificationDispatcher,
    PollingConfig, PollingScheduler, ReservationManager, StateEngine,
};
use hsm_redfish::{HttpRedfishTransport, RecordCredentialSource};
use hsm_store::{InMemoryStore, Persistence, PostgresStore};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::{ComponentCommand, LockCommand, ProcessingModelArg, ReservationCommand};

// ── Serve ─────────────────────────────────────────────────────────────────────

/// Wires every core component together and runs the REST surface (§2
/// data-flow diagram, in one process): `Persistence` backend selected by
/// `--store-url`, the Component-Endpoint Index, State Transition Engine,
/// Reservation Manager, Notification Dispatcher, Polling Scheduler, and a
/// background reservation-expiry sweep loop (§4.3 `SweepExpired`).
pub async fn serve(config: hsm_config::AppConfig) -> Result<()> {
    let store: Arc<dyn Persistence> = match &config.store_url {
        Some(url) => {
            info!(%url, "connecting to Postgres store");
            Arc::new(PostgresStore::connect(url).await.context("failed to connect to Postgres store")?)
        }
        None => {
            info!("using in-memory store (no --store-url given)");
            Arc::new(InMemoryStore::new())
        }
    };

    let index = Arc::new(ComponentEndpointIndex::new(store.clone()));
    let engine = Arc::new(StateEngine::new(store.clone()));

    let notification_transport = Arc::new(HttpNotificationTransport::new(
        config.notification_retries,
        Duration::from_secs(config.notification_retry_delay_secs),
    ));
    let dispatcher =
        Arc::new(NotificationDispatcher::with_pool_size(store.clone(), notification_transport, config.notification_workers));

    let transport_timeout = Duration::from_secs(config.transport_timeout_secs);
    let redfish = Arc::new(HttpRedfishTransport::new(transport_timeout));
    let credentials = Arc::new(RecordCredentialSource);
    if config.read_vault || config.write_vault {
        warn!(
            "vault-backed credential source requested but not wired (§1: credential-store \
             lookups are an external collaborator); falling back to record-based credentials"
        );
    }

    let polling = PollingScheduler::new(
        store.clone(),
        index.clone(),
        redfish.clone(),
        credentials.clone(),
        engine.clone(),
        dispatcher.clone(),
        PollingConfig {
            initial_delay: Duration::from_secs(config.poll_initial_delay_secs),
            interval: Duration::from_secs(config.poll_interval_secs),
            keep_alive_interval: Duration::from_secs(config.poll_keepalive_secs),
        },
    );

    let pipeline = Arc::new(EventPipeline::with_pool_size(
        store.clone(),
        index.clone(),
        engine.clone(),
        dispatcher.clone(),
        polling.clone(),
        redfish,
        credentials,
        Arc::new(NoopDiscoveryTrigger),
        config.event_workers,
    ));

    let reservations = Arc::new(ReservationManager::new(store.clone()));

    let auth: Arc<dyn hsm_api::AuthVerifier> = if config.auth_enabled() {
        Arc::new(hsm_api::JwksVerifier { jwks_url: config.jwks_url.clone().unwrap_or_default() })
    } else {
        Arc::new(hsm_api::StaticTokenVerifier { token: std::env::var("HSM_TOKEN").unwrap_or_default() })
    };

    match config.bus_spec()? {
        Some(spec) => info!(%spec, "message-bus ingest configured (transport is an external collaborator, §1)"),
        None => info!("message-bus ingest disabled"),
    }

    spawn_reservation_sweep(reservations.clone(), Duration::from_secs(config.reservation_sweep_interval_secs));

    let state = hsm_api::AppState { store, index, engine, reservations, dispatcher, polling, pipeline, auth };
    let app = hsm_api::build_app(state);

    info!(bind = %config.bind, "starting hsmd");
    let listener = tokio::net::TcpListener::bind(&config.bind).await.context("failed to bind")?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn spawn_reservation_sweep(reservations: Arc<ReservationManager>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match reservations.sweep_expired(chrono::Utc::now()).await {
                Ok(freed) if !freed.is_empty() => info!(count = freed.len(), "swept expired reservations"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "reservation sweep failed"),
            }
        }
    });
}

// ── Remote client ─────────────────────────────────────────────────────────────

struct Client {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl Client {
    fn new(base: &str, token: Option<String>) -> Self {
        Client { http: reqwest::Client::new(), base: base.trim_end_matches('/').to_string(), token }
    }

    fn req(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{}", self.base, path));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let resp = self.req(reqwest::Method::GET, path).send().await.context("request failed")?;
        decode(resp).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let resp = self.req(reqwest::Method::POST, path).json(&body).send().await.context("request failed")?;
        decode(resp).await
    }
}

async fn decode(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        bail!("server returned {status}: {body}");
    }
    Ok(body)
}

pub async fn status(remote: &str, token: Option<String>) -> Result<()> {
    let client = Client::new(remote, token);
    let body = client.get("/status").await?;
    crate::output::print_json(&body);
    Ok(())
}

// ── Components ────────────────────────────────────────────────────────────────

pub async fn component(remote: &str, token: Option<String>, cmd: ComponentCommand) -> Result<()> {
    let client = Client::new(remote, token);
    match cmd {
        ComponentCommand::Get { xname } => {
            let body = client.get(&format!("/Inventory/Components/{xname}")).await?;
            crate::output::print_json(&body);
        }
        ComponentCommand::List { component_type, state, role } => {
            let mut query = Vec::new();
            if let Some(t) = component_type {
                query.push(format!("component_type={t}"));
            }
            if let Some(s) = state {
                query.push(format!("state={s}"));
            }
            if let Some(r) = role {
                query.push(format!("role={r}"));
            }
            let path = if query.is_empty() {
                "/Inventory/Components".to_string()
            } else {
                format!("/Inventory/Components?{}", query.join("&"))
            };
            let body = client.get(&path).await?;
            crate::output::print_json(&body);
        }
        ComponentCommand::SetState { xnames, state, flag, force } => {
            let body = client
                .post(
                    "/Inventory/Components/BulkState",
                    serde_json::json!({ "component_ids": xnames, "state": state, "flag": flag, "force": force }),
                )
                .await?;
            crate::output::print_json(&body);
        }
        ComponentCommand::SetEnabled { xnames, enabled } => {
            let body = client
                .post(
                    "/Inventory/Components/BulkEnabled",
                    serde_json::json!({ "component_ids": xnames, "enabled": enabled }),
                )
                .await?;
            crate::output::print_json(&body);
        }
    }
    Ok(())
}

// ── Reservations ──────────────────────────────────────────────────────────────

fn model_str(model: ProcessingModelArg) -> &'static str {
    match model {
        ProcessingModelArg::Rigid => "Rigid",
        ProcessingModelArg::Flexible => "Flexible",
    }
}

pub async fn reservation(remote: &str, token: Option<String>, cmd: ReservationCommand) -> Result<()> {
    let client = Client::new(remote, token);
    match cmd {
        ReservationCommand::Reserve { xnames, duration_secs, model } => {
            let body = client
                .post(
                    "/locks/reservations",
                    serde_json::json!({
                        "component_ids": xnames,
                        "duration_secs": duration_secs,
                        "processing_model": model_str(model),
                    }),
                )
                .await?;
            crate::output::print_json(&body);
        }
        ReservationCommand::Release { xnames, reservation_key } => {
            let body = client
                .post(
                    "/locks/reservations/release",
                    serde_json::json!({ "component_ids": xnames, "reservation_key": reservation_key }),
                )
                .await?;
            crate::output::print_json(&body);
        }
        ReservationCommand::ForceRelease { xnames } => {
            let body = client
                .post("/locks/reservations/forceRelease", serde_json::json!({ "component_ids": xnames }))
                .await?;
            crate::output::print_json(&body);
        }
        ReservationCommand::Status { xnames } => {
            let body =
                client.post("/locks/reservations/status", serde_json::json!({ "component_ids": xnames })).await?;
            crate::output::print_json(&body);
        }
    }
    Ok(())
}

// ── Admin locks ───────────────────────────────────────────────────────────────

pub async fn lock(remote: &str, token: Option<String>, cmd: LockCommand) -> Result<()> {
    let client = Client::new(remote, token);
    let (path, xnames, force) = match cmd {
        LockCommand::Lock { xnames, force } => ("/locks/lock", xnames, force),
        LockCommand::Unlock { xnames, force } => ("/locks/unlock", xnames, force),
        LockCommand::Disable { xnames, force } => ("/locks/disable", xnames, force),
        LockCommand::Repair { xnames, force } => ("/locks/repair", xnames, force),
    };
    client.post(path, serde_json::json!({ "component_ids": xnames, "force": force })).await?;
    println!("ok");
    Ok(())
}

// ── Discovery ─────────────────────────────────────────────────────────────────

pub async fn discover(remote: &str, token: Option<String>, bundle_path: std::path::PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(&bundle_path)
        .with_context(|| format!("failed to read {}", bundle_path.display()))?;
    let bundle: Value = serde_json::from_str(&raw).context("bundle is not valid JSON")?;
    let client = Client::new(remote, token);
    let body = client.post("/Inventory/Discover", bundle).await?;
    crate::output::print_json(&body);
    Ok(())
}
