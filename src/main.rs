use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use test_lab_dashboard::config::{CliArgs, DashboardConfig};
use test_lab_dashboard::server;
use test_lab_dashboard::state::DashboardState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = DashboardConfig::from_args(args);

    // Initialize tracing; the guard flushes the file writer on exit
    let _log_guard = init_tracing(&config);

    info!("Starting test-lab-dashboard v{}", env!("CARGO_PKG_VERSION"));
    info!("Data mode: {:?}", config.data_mode);
    info!("Database: {:?}", config.db_path);
    info!("Debug DB logging: {}", config.debug_db);

    let store = DashboardState::open_store(&config)?;
    let port = config.port;
    let state = Arc::new(DashboardState::new(config, store));

    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Dashboard backend listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Dashboard backend shutting down");
    Ok(())
}

fn init_tracing(config: &DashboardConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "test_lab_dashboard=info,tower_http=info".into());

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "test-lab-dashboard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
