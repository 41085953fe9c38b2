use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// The REST-layer error, carrying the status code §7 "User-visible
/// behavior" assigns to each taxonomy kind.
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, message: msg.into() }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::CONFLICT, message: msg.into() }
    }

    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_GATEWAY, message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: msg.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<hsm_domain::DomainError> for ApiError {
    fn from(e: hsm_domain::DomainError) -> Self {
        use hsm_domain::DomainError::*;
        match &e {
            BadId(_) | NoIds | TooManyIds | NoState | NoFlag | NoEnabled | NoSwStatus | NoRole | NoNid | BadUpdateType(_) | IdMismatch => {
                ApiError::bad_request(e.to_string())
            }
            IllegalTransition { .. } => ApiError::conflict(e.to_string()),
            Internal(_) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<hsm_store::StoreError> for ApiError {
    fn from(e: hsm_store::StoreError) -> Self {
        use hsm_store::StoreError::*;
        match &e {
            NotFound(_) => ApiError::not_found(e.to_string()),
            Conflict(_) => ApiError::conflict(e.to_string()),
            Serialization(_) | Internal(_) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<hsm_redfish::RedfishError> for ApiError {
    fn from(e: hsm_redfish::RedfishError) -> Self {
        use hsm_redfish::RedfishError::*;
        match &e {
            RedfishFail { .. } | RedfishNoInfo { .. } => ApiError::bad_gateway(e.to_string()),
            NoCredentials(_) | CredentialsStoreError(_) => ApiError::bad_gateway(e.to_string()),
            Internal(_) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<hsm_events::EventError> for ApiError {
    fn from(e: hsm_events::EventError) -> Self {
        ApiError::bad_request(e.to_string())
    }
}

impl From<hsm_engine::EngineError> for ApiError {
    fn from(e: hsm_engine::EngineError) -> Self {
        use hsm_engine::EngineError::*;
        match e {
            Domain(inner) => inner.into(),
            Store(inner) => inner.into(),
            Graph(inner) => inner.into(),
            Redfish(inner) => inner.into(),
            Event(inner) => inner.into(),
            NotFound(msg) => ApiError::not_found(msg),
            Conflict(msg) => ApiError::conflict(msg),
            Internal(msg) => ApiError::internal(msg),
        }
    }
}

impl From<hsm_graph::GraphError> for ApiError {
    fn from(e: hsm_graph::GraphError) -> Self {
        use hsm_graph::GraphError::*;
        match &e {
            ExclusiveConflict { .. } | AlreadyPartitioned { .. } => ApiError::conflict(e.to_string()),
            UnknownComponent(_) => ApiError::not_found(e.to_string()),
        }
    }
}
