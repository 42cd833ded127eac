use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use super::RangeParams;
use crate::error::DashboardError;
use crate::records::fetch::RecordSource;
use crate::records::TestRecord;
use crate::state::SharedState;

// Fields a stored record cannot do without.
const REQUIRED_FIELDS: [&str; 3] = ["name", "start", "duration"];

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: String,
    pub message: String,
}

/// Check the required fields, then decode. Anything else the record carries
/// is stored as-is.
pub fn validate_record(body: Value) -> Result<TestRecord, DashboardError> {
    let Some(object) = body.as_object() else {
        return Err(DashboardError::InvalidRecord(
            "body must be a JSON object".to_string(),
        ));
    };
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .filter(|f| object.get(**f).map_or(true, Value::is_null))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(DashboardError::InvalidRecord(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    serde_json::from_value(body).map_err(|e| DashboardError::InvalidRecord(e.to_string()))
}

/// Raw records in the window. Reads the database directly so storage errors
/// are reported, not papered over; only synthetic mode serves mock records.
pub async fn list_test_results(
    State(state): State<SharedState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<TestRecord>>, DashboardError> {
    let (query, _) = params.to_query()?;

    let records = match &state.store {
        Some(store) => {
            let store = store.clone();
            let query = query.clone();
            tokio::task::spawn_blocking(move || store.find(&query))
                .await
                .map_err(|e| DashboardError::Other(format!("record query task failed: {}", e)))?
                .inspect_err(|e| error!("Error fetching test results: {}", e))?
        }
        None if !state.config.uses_database() => state.synthetic.query(&query)?,
        None => return Err(DashboardError::StoreUnavailable),
    };

    info!("Found {} test results", records.len());
    Ok(Json(records))
}

pub async fn create_test_result(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CreatedResponse>), DashboardError> {
    let record = validate_record(body)?;
    let Some(store) = state.store.clone() else {
        return Err(DashboardError::StoreUnavailable);
    };

    let id = tokio::task::spawn_blocking(move || store.insert(&record))
        .await
        .map_err(|e| DashboardError::Other(format!("record insert task failed: {}", e)))?
        .inspect_err(|e| error!("Error inserting test result: {}", e))?;

    info!("Test result inserted: {}", id);
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            message: "Test result created successfully".to_string(),
        }),
    ))
}
