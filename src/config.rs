use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Test Lab Dashboard: serves electrical-safety test records and the
/// aggregate metrics derived from them.
#[derive(Parser, Debug, Clone)]
#[command(name = "test-lab-dashboard")]
pub struct CliArgs {
    /// HTTP port
    #[arg(long = "port", env = "DASHBOARD_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// SQLite database file (defaults to the user data directory)
    #[arg(long = "db-path", env = "DASHBOARD_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Where records come from
    #[arg(long = "data-mode", env = "DASHBOARD_DATA_MODE", value_enum, default_value_t = DataMode::Auto)]
    pub data_mode: DataMode,

    /// Log every record query with its bounds and result size
    #[arg(long = "debug-db", env = "DASHBOARD_DEBUG_DB")]
    pub debug_db: bool,

    /// Record fetch timeout in seconds
    #[arg(long = "fetch-timeout", env = "DASHBOARD_FETCH_TIMEOUT", default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    pub fetch_timeout_secs: u64,

    /// Automatic retries before falling back to synthetic data (at most 1)
    #[arg(long = "fetch-retries", env = "DASHBOARD_FETCH_RETRIES", default_value_t = DEFAULT_FETCH_RETRIES)]
    pub fetch_retries: u32,

    /// Seed for the synthetic record generator
    #[arg(long = "synthetic-seed", env = "DASHBOARD_SYNTHETIC_SEED", default_value_t = DEFAULT_SYNTHETIC_SEED)]
    pub synthetic_seed: u64,

    /// Allowed CORS origin for the dashboard frontend
    #[arg(long = "frontend-origin", env = "FRONTEND_URL", default_value = DEFAULT_FRONTEND_ORIGIN)]
    pub frontend_origin: String,

    /// Also write daily-rotated log files into this directory
    #[arg(long = "log-dir", env = "DASHBOARD_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DataMode {
    /// Database first, synthetic records when it is unavailable
    Auto,
    /// Database only; fetch failures are reported to the caller
    Database,
    /// Synthetic records only, no database is opened
    Synthetic,
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub data_mode: DataMode,
    pub debug_db: bool,
    pub fetch_timeout: Duration,
    pub fetch_retries: u32,
    pub synthetic_seed: u64,
    pub synthetic_count: usize,
    pub frontend_origin: String,
    pub log_dir: Option<PathBuf>,
}

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:5010";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FETCH_RETRIES: u32 = 1;
pub const MAX_FETCH_RETRIES: u32 = 1;
pub const DEFAULT_SYNTHETIC_SEED: u64 = 42;
pub const SYNTHETIC_RECORD_COUNT: usize = 100;
pub const DB_FILE_NAME: &str = "test_results.db";

// Span the synthetic generator spreads records over
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

impl DashboardConfig {
    pub fn from_args(args: CliArgs) -> Self {
        let db_path = args.db_path.unwrap_or_else(default_db_path);

        DashboardConfig {
            port: args.port,
            db_path,
            data_mode: args.data_mode,
            debug_db: args.debug_db,
            fetch_timeout: Duration::from_secs(args.fetch_timeout_secs),
            fetch_retries: args.fetch_retries.min(MAX_FETCH_RETRIES),
            synthetic_seed: args.synthetic_seed,
            synthetic_count: SYNTHETIC_RECORD_COUNT,
            frontend_origin: args.frontend_origin,
            log_dir: args.log_dir,
        }
    }

    /// Config for tests and embedding: synthetic data only, defaults elsewhere.
    pub fn synthetic(seed: u64) -> Self {
        DashboardConfig {
            port: DEFAULT_PORT,
            db_path: default_db_path(),
            data_mode: DataMode::Synthetic,
            debug_db: false,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            fetch_retries: DEFAULT_FETCH_RETRIES,
            synthetic_seed: seed,
            synthetic_count: SYNTHETIC_RECORD_COUNT,
            frontend_origin: DEFAULT_FRONTEND_ORIGIN.to_string(),
            log_dir: None,
        }
    }

    pub fn uses_database(&self) -> bool {
        self.data_mode != DataMode::Synthetic
    }

    pub fn falls_back_to_synthetic(&self) -> bool {
        self.data_mode != DataMode::Database
    }
}

/// `<data dir>/test-lab-dashboard/test_results.db`, or the working
/// directory when the platform has no data dir.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("test-lab-dashboard")
        .join(DB_FILE_NAME)
}
