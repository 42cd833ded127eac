use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{DashboardConfig, DataMode};
use crate::records::db::RecordStore;
use crate::records::fetch::{RecordFetcher, RecordSource};
use crate::records::synthetic::SyntheticSource;

pub type SharedState = Arc<DashboardState>;

pub struct DashboardState {
    pub config: DashboardConfig,
    pub store: Option<Arc<RecordStore>>,
    pub synthetic: Arc<SyntheticSource>,
    pub fetcher: RecordFetcher,
}

impl DashboardState {
    /// Wire the sources the configured data mode asks for. `store` is the
    /// already-opened database, if any.
    pub fn new(config: DashboardConfig, store: Option<Arc<RecordStore>>) -> Self {
        let synthetic = Arc::new(SyntheticSource::new(
            config.synthetic_seed,
            config.synthetic_count,
        ));
        let store = if config.uses_database() { store } else { None };

        let primary = store
            .clone()
            .map(|s| s as Arc<dyn RecordSource>);
        let fallback = config.falls_back_to_synthetic().then(|| synthetic.clone());
        let fetcher = RecordFetcher::new(
            primary,
            fallback,
            config.fetch_timeout,
            config.fetch_retries,
        );

        Self {
            config,
            store,
            synthetic,
            fetcher,
        }
    }

    /// Open the database for the configured mode. In `auto` mode a database
    /// that cannot be opened only disables the primary source.
    pub fn open_store(config: &DashboardConfig) -> anyhow::Result<Option<Arc<RecordStore>>> {
        match config.data_mode {
            DataMode::Synthetic => {
                info!("Synthetic data mode, no database opened");
                Ok(None)
            }
            DataMode::Database => {
                let store = RecordStore::open(&config.db_path, config.debug_db)?;
                info!("Record store opened at {:?}", config.db_path);
                Ok(Some(Arc::new(store)))
            }
            DataMode::Auto => match RecordStore::open(&config.db_path, config.debug_db) {
                Ok(store) => {
                    info!("Record store opened at {:?}", config.db_path);
                    Ok(Some(Arc::new(store)))
                }
                Err(e) => {
                    warn!(
                        "Failed to open record store at {:?}, serving synthetic data: {}",
                        config.db_path, e
                    );
                    Ok(None)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_mode_ignores_store() {
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        let state = DashboardState::new(DashboardConfig::synthetic(1), Some(store));
        assert!(state.store.is_none());
    }

    #[test]
    fn test_auto_mode_keeps_store() {
        let mut config = DashboardConfig::synthetic(1);
        config.data_mode = DataMode::Auto;
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        let state = DashboardState::new(config, Some(store));
        assert!(state.store.is_some());
    }

    #[test]
    fn test_open_store_auto_tolerates_bad_path() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory where the database file should be
        let mut config = DashboardConfig::synthetic(1);
        config.data_mode = DataMode::Auto;
        config.db_path = dir.path().to_path_buf();
        assert!(DashboardState::open_store(&config).unwrap().is_none());

        config.data_mode = DataMode::Database;
        assert!(DashboardState::open_store(&config).is_err());
    }
}
