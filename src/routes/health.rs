use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::config::DataMode;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct DbHealthResponse {
    pub status: String,
    pub db: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

/// Database readiness as reported by `/health/db`. Pure so the mapping can be
/// tested without a store.
pub fn determine_db_status(store_configured: bool, ping_ok: bool) -> (&'static str, &'static str) {
    match (store_configured, ping_ok) {
        (true, true) => ("OK", "connected"),
        (true, false) => ("ERROR", "disconnected"),
        (false, _) => ("ERROR", "not_configured"),
    }
}

fn mode_name(mode: DataMode) -> &'static str {
    match mode {
        DataMode::Auto => "auto",
        DataMode::Database => "database",
        DataMode::Synthetic => "synthetic",
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

pub async fn health_db(State(state): State<SharedState>) -> Response {
    let (ping_ok, error) = match &state.store {
        Some(store) => match store.ping() {
            Ok(()) => (true, None),
            Err(e) => {
                warn!("Database ping failed: {}", e);
                (false, Some(e.to_string()))
            }
        },
        None => (false, Some("record store is not configured".to_string())),
    };

    let (status, db) = determine_db_status(state.store.is_some(), ping_ok);
    let code = if ping_ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let body = DbHealthResponse {
        status: status.to_string(),
        db: db.to_string(),
        mode: mode_name(state.config.data_mode).to_string(),
        error,
        timestamp: Utc::now().to_rfc3339(),
    };
    (code, Json(body)).into_response()
}
