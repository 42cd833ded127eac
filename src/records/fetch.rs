use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::synthetic::SyntheticSource;
use crate::config::MAX_FETCH_RETRIES;
use super::{RecordQuery, TestRecord};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Record source unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Record fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Record fetch superseded by a newer request")]
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Database,
    Synthetic,
}

/// Anything that can answer a record query. Implementations are blocking;
/// the fetcher runs them on the blocking pool.
pub trait RecordSource: Send + Sync {
    fn kind(&self) -> SourceKind;
    fn query(&self, query: &RecordQuery) -> Result<Vec<TestRecord>, SourceError>;
}

pub struct FetchOutcome {
    pub records: Vec<TestRecord>,
    pub source: SourceKind,
}

/// Runs record queries with a timeout, one retry and a synthetic fallback,
/// and lets a newer request from the same viewer cancel an older one.
pub struct RecordFetcher {
    primary: Option<Arc<dyn RecordSource>>,
    fallback: Option<Arc<SyntheticSource>>,
    timeout: Duration,
    retries: u32,
    viewers: Mutex<HashMap<String, watch::Sender<u64>>>,
}

impl RecordFetcher {
    pub fn new(
        primary: Option<Arc<dyn RecordSource>>,
        fallback: Option<Arc<SyntheticSource>>,
        timeout: Duration,
        retries: u32,
    ) -> Self {
        Self {
            primary,
            fallback,
            timeout,
            retries: retries.min(MAX_FETCH_RETRIES),
            viewers: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch records for `query`. When `viewer` is given, any in-flight fetch
    /// for the same viewer resolves with [`SourceError::Superseded`].
    pub async fn fetch(
        &self,
        query: &RecordQuery,
        viewer: Option<&str>,
    ) -> Result<FetchOutcome, SourceError> {
        let Some(viewer) = viewer else {
            return self.fetch_with_fallback(query).await;
        };

        let (generation, mut rx) = self.claim(viewer);
        let result = tokio::select! {
            result = self.fetch_with_fallback(query) => result,
            _ = wait_superseded(&mut rx, generation) => {
                debug!("Fetch for viewer {} superseded", viewer);
                Err(SourceError::Superseded)
            }
        };
        self.release(viewer, generation);
        result
    }

    fn claim(&self, viewer: &str) -> (u64, watch::Receiver<u64>) {
        let mut viewers = self.viewers.lock().unwrap_or_else(|e| e.into_inner());
        let tx = viewers
            .entry(viewer.to_string())
            .or_insert_with(|| watch::channel(0).0);
        let mut generation = 0;
        tx.send_modify(|g| {
            *g += 1;
            generation = *g;
        });
        (generation, tx.subscribe())
    }

    fn release(&self, viewer: &str, generation: u64) {
        let mut viewers = self.viewers.lock().unwrap_or_else(|e| e.into_inner());
        if viewers
            .get(viewer)
            .is_some_and(|tx| *tx.borrow() == generation)
        {
            viewers.remove(viewer);
        }
    }

    async fn fetch_with_fallback(&self, query: &RecordQuery) -> Result<FetchOutcome, SourceError> {
        let Some(primary) = &self.primary else {
            return self.synthetic(query).await;
        };

        let mut last_error = None;
        for attempt in 0..=self.retries {
            match self.run(primary.clone(), query).await {
                Ok(records) => {
                    return Ok(FetchOutcome {
                        records,
                        source: primary.kind(),
                    })
                }
                Err(e) => {
                    warn!("Record fetch attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        match &self.fallback {
            Some(_) => {
                info!("Falling back to synthetic records");
                self.synthetic(query).await
            }
            None => Err(last_error
                .unwrap_or_else(|| SourceError::Unavailable("no attempts made".to_string()))),
        }
    }

    async fn synthetic(&self, query: &RecordQuery) -> Result<FetchOutcome, SourceError> {
        let Some(fallback) = &self.fallback else {
            return Err(SourceError::Unavailable(
                "no record source configured".to_string(),
            ));
        };
        let records = self.run(fallback.clone(), query).await?;
        Ok(FetchOutcome {
            records,
            source: SourceKind::Synthetic,
        })
    }

    async fn run<S>(&self, source: Arc<S>, query: &RecordQuery) -> Result<Vec<TestRecord>, SourceError>
    where
        S: RecordSource + ?Sized + 'static,
    {
        let query = query.clone();
        let task = tokio::task::spawn_blocking(move || source.query(&query));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(SourceError::Unavailable(format!(
                "record query task failed: {}",
                join_error
            ))),
            Err(_) => Err(SourceError::Timeout(self.timeout)),
        }
    }
}

/// Resolves once the viewer's generation moves past `generation`.
async fn wait_superseded(rx: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        if *rx.borrow_and_update() != generation {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped: nobody can supersede us any more.
            std::future::pending::<()>().await;
        }
    }
}
