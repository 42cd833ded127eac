use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::SharedState;

fn cors_layer(origin: &str) -> CorsLayer {
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
        Err(_) => {
            warn!("Invalid frontend origin {:?}, allowing any origin", origin);
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

fn api_routes() -> Router<SharedState> {
    Router::new()
        // Health
        .route("/health", get(crate::routes::health::health))
        .route("/health/db", get(crate::routes::health::health_db))
        // Records
        .route(
            "/test-results",
            get(crate::routes::test_results::list_test_results)
                .post(crate::routes::test_results::create_test_result),
        )
        // Metrics
        .route("/dashboard/metrics", get(crate::routes::dashboard::metrics))
}

/// Routes are served both at the root and under `/api`, where the dashboard
/// frontend expects them.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.frontend_origin);

    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
