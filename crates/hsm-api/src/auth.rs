use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Verifies a bearer token extracted from the `Authorization` header.
/// `jwksURL` empty vs. set (§6) picks which implementation `main`
/// wires up; the trait is the seam so the core doesn't have to carry a
/// JWT/JWKS library to satisfy the empty case.
#[async_trait]
pub trait AuthVerifier: Send + Sync + 'static {
    async fn verify(&self, bearer_token: Option<&str>) -> bool;
}

/// The empty-`jwksURL` case: a single static shared secret. Every route is
/// gated identically — there is no notion of scopes or per-route policy.
pub struct StaticTokenVerifier {
    pub token: String,
}

#[async_trait]
impl AuthVerifier for StaticTokenVerifier {
    async fn verify(&self, bearer_token: Option<&str>) -> bool {
        bearer_token == Some(self.token.as_str())
    }
}

/// The `jwksURL`-set case. JWT signature verification against a remote key
/// set is an external collaborator per §1 ("JWKS/token validation
/// itself") — this documents the trait boundary without shipping a JWT
/// stack that the core doesn't otherwise need.
pub struct JwksVerifier {
    pub jwks_url: String,
}

#[async_trait]
impl AuthVerifier for JwksVerifier {
    async fn verify(&self, _bearer_token: Option<&str>) -> bool {
        unimplemented!("JWKS verification against {} is an external collaborator", self.jwks_url)
    }
}

/// Axum middleware requiring `Authorization: Bearer <token>`, checked via
/// `state.auth`. Returns 401 for missing, malformed, or rejected tokens.
/// Applied to every route — there are no public endpoints.
pub async fn require_bearer_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    if state.auth.verify(provided).await {
        next.run(request).await
    } else {
        (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response()
    }
}
