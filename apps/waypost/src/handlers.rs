use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::access_code::AccessCodeView;
use crate::broker::SharedRelay;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    clients: usize,
    sessions: usize,
    uptime: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    total_clients: usize,
    online_clients: usize,
    active_sessions: usize,
    server_time: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateCodeResponse {
    code: String,
    expires: u64,
}

/// GET /health - liveness plus table sizes
pub async fn health_check(State(relay): State<SharedRelay>) -> Json<HealthResponse> {
    let snapshot = relay.snapshot().await;
    Json(HealthResponse {
        status: "online",
        clients: snapshot.clients,
        sessions: snapshot.sessions,
        uptime: snapshot.uptime_secs,
    })
}

/// GET /stats - observability over the same tables the broker mutates
pub async fn get_stats(State(relay): State<SharedRelay>) -> Json<StatsResponse> {
    let snapshot = relay.snapshot().await;
    Json(StatsResponse {
        total_clients: snapshot.clients,
        online_clients: snapshot.online_clients,
        active_sessions: snapshot.active_sessions,
        server_time: chrono::Utc::now().to_rfc3339(),
    })
}

/// POST /generate-code - mint a 6-digit direct-connect code
pub async fn generate_code(
    State(relay): State<SharedRelay>,
) -> Result<Json<GenerateCodeResponse>, StatusCode> {
    match relay.generate_access_code().await {
        Ok(code) => Ok(Json(GenerateCodeResponse {
            code: code.code,
            expires: code.expires_at,
        })),
        Err(e) => {
            error!("failed to generate access code: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// GET /access-codes - codes still inside their TTL
pub async fn list_access_codes(State(relay): State<SharedRelay>) -> Json<Vec<AccessCodeView>> {
    Json(relay.active_access_codes().await)
}

#[derive(Debug, Deserialize)]
pub struct ValidateCodeRequest {
    code: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateCodeResponse {
    valid: bool,
}

/// POST /validate-code - check a direct-connect code without consuming it
pub async fn validate_code(
    State(relay): State<SharedRelay>,
    Json(payload): Json<ValidateCodeRequest>,
) -> Json<ValidateCodeResponse> {
    Json(ValidateCodeResponse {
        valid: relay.validate_access_code(&payload.code).await,
    })
}

/// DELETE /access-codes/{code} - revoke a code before it expires
pub async fn revoke_code(
    State(relay): State<SharedRelay>,
    Path(code): Path<String>,
) -> StatusCode {
    if relay.revoke_access_code(&code).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
