use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer_token;
use crate::handlers;
use crate::state::AppState;

/// Builds the thin REST surface §6 describes. Every handler
/// deserializes the request, calls exactly one `hsm-engine`/`hsm-store`
/// operation, and maps the `Result` through `ApiError` — the routing and
/// JSON translation here is deliberately the 30% the core treats as an
/// external collaborator (§1). `state.auth` picks the verifier
/// (static token vs JWKS) per §6's `jwksURL` knob.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/status", get(handlers::status))
        // Components
        .route("/Inventory/Components", get(handlers::list_components).post(handlers::put_component))
        .route(
            "/Inventory/Components/:xname",
            get(handlers::get_component).delete(handlers::delete_component),
        )
        .route("/Inventory/Components/BulkState", post(handlers::bulk_state))
        .route("/Inventory/Components/BulkFlag", post(handlers::bulk_flag))
        .route("/Inventory/Components/BulkEnabled", post(handlers::bulk_enabled))
        .route("/Inventory/Components/BulkSoftwareStatus", post(handlers::bulk_software_status))
        .route("/Inventory/Components/BulkRole", post(handlers::bulk_role))
        .route("/Inventory/Components/:xname/NID", put(handlers::set_nid))
        // Redfish endpoints
        .route("/Inventory/RedfishEndpoints", get(handlers::list_endpoints).post(handlers::put_endpoint))
        .route(
            "/Inventory/RedfishEndpoints/:xname",
            get(handlers::get_endpoint).delete(handlers::delete_endpoint),
        )
        // Component endpoints (read-only via REST; written only by discovery commit)
        .route(
            "/Inventory/RedfishEndpoints/:xname/ComponentEndpoints",
            get(handlers::list_component_endpoints_by_endpoint),
        )
        // Discovery
        .route("/Inventory/Discover", post(handlers::commit_discovery))
        // Event ingest (§6 alternative to a message-bus consumer: a webhook
        // whose body is forwarded verbatim to the normalizer)
        .route("/events", post(handlers::ingest_event))
        // Groups
        .route("/groups", get(handlers::list_groups).post(handlers::put_group))
        .route("/groups/:name", get(handlers::get_group).delete(handlers::delete_group))
        // Partitions
        .route("/partitions", get(handlers::list_partitions).post(handlers::put_partition))
        .route("/partitions/:name", get(handlers::get_partition).delete(handlers::delete_partition))
        // Membership
        .route(
            "/Inventory/Components/:xname/Membership",
            get(handlers::get_membership).put(handlers::put_membership),
        )
        // Reservations (V2) and admin lock operations
        .route("/locks/reservations", post(handlers::reserve))
        .route("/locks/reservations/renew", post(handlers::renew))
        .route("/locks/reservations/release", post(handlers::release))
        .route("/locks/reservations/forceRelease", post(handlers::force_release))
        .route("/locks/reservations/check", post(handlers::check_deputy_keys))
        .route("/locks/reservations/status", post(handlers::reservation_status))
        .route("/locks/lock", post(handlers::lock))
        .route("/locks/unlock", post(handlers::unlock))
        .route("/locks/disable", post(handlers::disable))
        .route("/locks/repair", post(handlers::repair))
        // Subscriptions
        .route("/subscriptions/sCN", get(handlers::list_subscriptions).post(handlers::put_subscription))
        .route("/subscriptions/sCN/:id", delete(handlers::delete_subscription))
        // Auth middleware applies to every route above
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenVerifier;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine as _;
    use hsm_engine::{
        ComponentEndpointIndex, EventPipeline, NoopDiscoveryTrigger, NotificationDispatcher, PollingConfig,
        PollingScheduler, ReservationManager, StateEngine,
    };
    use hsm_redfish::{HttpRedfishTransport, RecordCredentialSource};
    use hsm_store::InMemoryStore;
    use std::time::Duration;
    use tower::util::ServiceExt;

    const TEST_TOKEN: &str = "test-token";

    fn test_app() -> Router {
        let store: Arc<dyn hsm_store::Persistence> = Arc::new(InMemoryStore::new());
        let index = Arc::new(ComponentEndpointIndex::new(store.clone()));
        let engine = Arc::new(StateEngine::new(store.clone()));
        let transport = Arc::new(hsm_engine::HttpNotificationTransport::new(3, Duration::from_secs(5)));
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), transport));
        let redfish = Arc::new(HttpRedfishTransport::new(Duration::from_secs(15)));
        let credentials = Arc::new(RecordCredentialSource);
        let polling = PollingScheduler::new(
            store.clone(),
            index.clone(),
            redfish.clone(),
            credentials.clone(),
            engine.clone(),
            dispatcher.clone(),
            PollingConfig::default(),
        );
        let pipeline = Arc::new(EventPipeline::new(
            store.clone(),
            index.clone(),
            engine.clone(),
            dispatcher.clone(),
            polling.clone(),
            redfish,
            credentials,
            Arc::new(NoopDiscoveryTrigger),
        ));
        let reservations = Arc::new(ReservationManager::new(store.clone()));

        let state = AppState {
            store,
            index,
            engine,
            reservations,
            dispatcher,
            polling,
            pipeline,
            auth: Arc::new(StaticTokenVerifier { token: TEST_TOKEN.to_string() }),
        };
        build_app(state)
    }

    fn authed(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.header("Authorization", format!("Bearer {}", TEST_TOKEN))
    }

    #[tokio::test]
    async fn unauthenticated_request_returns_401() {
        let app = test_app();
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_token_returns_401() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", "Bearer wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn basic_auth_with_correct_token_returns_200() {
        // Some HSM HTTP clients send the token as the Basic auth password.
        let app = test_app();
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("hsm:{}", TEST_TOKEN));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", format!("Basic {}", credentials))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_returns_200() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().uri("/health")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_returns_200_with_empty_store() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().uri("/ready")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn components_empty_list() {
        let app = test_app();
        let resp = app
            .oneshot(
                authed(Request::builder().uri("/Inventory/Components"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn component_not_found_returns_404() {
        let app = test_app();
        let resp = app
            .oneshot(
                authed(Request::builder().uri("/Inventory/Components/x1c4s4b0n0"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_xname_returns_400() {
        let app = test_app();
        let resp = app
            .oneshot(
                authed(Request::builder().uri("/Inventory/Components/not-an-xname"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn groups_empty_list() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().uri("/groups")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
