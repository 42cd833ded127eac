use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::records::fetch::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Request superseded by a newer one")]
    Superseded,

    #[error("Record store is not configured")]
    StoreUnavailable,

    #[error("{0}")]
    Source(SourceError),

    #[error("{0}")]
    Other(String),
}

impl From<SourceError> for DashboardError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Superseded => DashboardError::Superseded,
            other => DashboardError::Source(other),
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            DashboardError::InvalidRecord(_) => StatusCode::BAD_REQUEST,
            DashboardError::Superseded => StatusCode::CONFLICT,
            DashboardError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            DashboardError::Source(SourceError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            DashboardError::Source(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DashboardError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
