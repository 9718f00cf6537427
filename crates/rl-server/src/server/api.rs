//! HTTP control surface handlers

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use rl_core::auth::{self, AuthAssertion};
use rl_core::time::current_time_millis;
use rl_protocol::api::{
    ADMIN_SECRET_HEADER, DEVICE_ID_HEADER, DEVICE_SIGNATURE_HEADER, DEVICE_TIMESTAMP_HEADER,
};
use rl_protocol::{ApiError, ApiResponse, DevicesResponse, LockState, MessageRequest};

use crate::coordinator::MutationError;
use crate::state::ServerState;

/// Error half of every handler result
pub type ApiFailure = (StatusCode, Json<ApiError>);

/// Query string accepted by the admin endpoints
#[derive(Debug, Default, Deserialize)]
pub struct SecretQuery {
    pub secret: Option<String>,
}

fn forbidden(error: impl ToString) -> ApiFailure {
    (StatusCode::FORBIDDEN, Json(ApiError::new(error.to_string())))
}

fn rejected(error: MutationError) -> ApiFailure {
    let status = match error {
        MutationError::Forbidden(_) => StatusCode::FORBIDDEN,
        MutationError::MessageTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
    };
    (status, Json(ApiError::new(error.to_string())))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Admin secret from the header, falling back to the query string
fn admin_credential(headers: &HeaderMap, query: &SecretQuery) -> Option<String> {
    header_str(headers, ADMIN_SECRET_HEADER)
        .map(str::to_string)
        .or_else(|| query.secret.clone())
}

fn actor(connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Device assertion carried in headers; all three or none
fn device_assertion(headers: &HeaderMap) -> Result<Option<AuthAssertion>, ApiFailure> {
    let device_id = header_str(headers, DEVICE_ID_HEADER);
    let timestamp = header_str(headers, DEVICE_TIMESTAMP_HEADER);
    let signature = header_str(headers, DEVICE_SIGNATURE_HEADER);

    match (device_id, timestamp, signature) {
        (None, None, None) => Ok(None),
        (Some(device_id), Some(timestamp), Some(signature)) => {
            let timestamp = timestamp
                .trim()
                .parse::<u64>()
                .map_err(|_| forbidden("auth failed: malformed timestamp"))?;
            Ok(Some(AuthAssertion {
                device_id: device_id.to_string(),
                timestamp,
                signature: signature.to_string(),
            }))
        }
        _ => Err(forbidden("auth failed: incomplete device assertion")),
    }
}

/// `GET /api/status`
pub async fn status(
    State(server): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<LockState>, ApiFailure> {
    if let Some(assertion) = device_assertion(&headers)? {
        let device_id = auth::verify(
            &assertion,
            server.devices.as_ref(),
            current_time_millis(),
            server.config.auth_window,
        )
        .map_err(|e| {
            tracing::warn!("Rejected status fetch for {}: {}", assertion.device_id, e);
            forbidden(format!("auth failed: {}", e))
        })?;
        tracing::trace!("Status fetch from device {}", device_id);
    }

    Ok(Json(server.coordinator.get_state().await))
}

/// `POST /api/lock`
pub async fn lock(
    State(server): State<Arc<ServerState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<SecretQuery>,
    headers: HeaderMap,
    body: Option<Json<MessageRequest>>,
) -> Result<Json<ApiResponse>, ApiFailure> {
    let message = body.and_then(|Json(request)| request.message);
    let state = server
        .coordinator
        .set_locked(
            admin_credential(&headers, &query).as_deref(),
            true,
            message,
            &actor(connect_info),
        )
        .await
        .map_err(rejected)?;

    Ok(Json(ApiResponse::ok(state)))
}

/// `POST /api/unlock`
pub async fn unlock(
    State(server): State<Arc<ServerState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<SecretQuery>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse>, ApiFailure> {
    let state = server
        .coordinator
        .set_locked(
            admin_credential(&headers, &query).as_deref(),
            false,
            None,
            &actor(connect_info),
        )
        .await
        .map_err(rejected)?;

    Ok(Json(ApiResponse::ok(state)))
}

/// `POST /api/message`
pub async fn message(
    State(server): State<Arc<ServerState>>,
    Query(query): Query<SecretQuery>,
    headers: HeaderMap,
    body: Option<Json<MessageRequest>>,
) -> Result<Json<ApiResponse>, ApiFailure> {
    let message = body.and_then(|Json(request)| request.message);
    let state = server
        .coordinator
        .set_message(admin_credential(&headers, &query).as_deref(), message)
        .await
        .map_err(rejected)?;

    Ok(Json(ApiResponse::ok(state)))
}

/// `GET /api/devices`
pub async fn devices(
    State(server): State<Arc<ServerState>>,
    Query(query): Query<SecretQuery>,
    headers: HeaderMap,
) -> Result<Json<DevicesResponse>, ApiFailure> {
    server
        .coordinator
        .authorize(admin_credential(&headers, &query).as_deref())
        .map_err(forbidden)?;

    Ok(Json(DevicesResponse {
        ok: true,
        devices: server.sessions.list(),
    }))
}
