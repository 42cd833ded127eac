use axum::extract::{Query, State};
use axum::Json;
use tracing::info;

use super::RangeParams;
use crate::error::DashboardError;
use crate::metrics::{compute_metrics, DashboardMetrics};
use crate::state::SharedState;

/// Fetch the window (with retry and fallback) and fold it into metrics.
pub async fn metrics(
    State(state): State<SharedState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<DashboardMetrics>, DashboardError> {
    let (query, filter) = params.to_query()?;

    let outcome = state
        .fetcher
        .fetch(&query, params.viewer.as_deref())
        .await?;

    let metrics = compute_metrics(&outcome.records, &filter, outcome.source);
    info!(
        "Dashboard metrics for {} ({} .. {}): {} tests from {:?} source",
        filter, query.from, query.to, metrics.total_tests, outcome.source
    );
    Ok(Json(metrics))
}
