use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use super::fetch::{RecordSource, SourceError, SourceKind};
use super::{RecordQuery, TestRecord};

/// SQLite-backed record store. Scalar columns carry what the query path
/// filters on; the full document lives in `payload`.
pub struct RecordStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    debug_queries: bool,
}

impl RecordStore {
    pub fn open(db_path: &Path, debug_queries: bool) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path.to_path_buf()),
            debug_queries,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
            debug_queries: false,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, SourceError> {
        self.conn
            .lock()
            .map_err(|_| SourceError::Unavailable("record store lock poisoned".to_string()))
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS test_results (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                session_uuid4 TEXT NOT NULL DEFAULT '',
                start REAL NOT NULL,
                duration REAL NOT NULL,
                payload TEXT NOT NULL,
                inserted_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tr_start ON test_results(start);
            CREATE INDEX IF NOT EXISTS idx_tr_session ON test_results(session_uuid4);
        ",
        )?;
        Ok(())
    }

    /// Store a record, assigning a fresh id when it has none. Returns the id.
    pub fn insert(&self, record: &TestRecord) -> Result<String, SourceError> {
        let id = record
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut stored = record.clone();
        stored.id = Some(id.clone());
        let payload = serde_json::to_string(&stored)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO test_results (id, name, session_uuid4, start, duration, payload, inserted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &id,
                &stored.name,
                &stored.session_uuid4,
                stored.start,
                stored.duration,
                &payload,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(id)
    }

    /// Records with `start` inside the inclusive window whose name contains
    /// any of the query keywords (case-insensitive), ordered by start.
    pub fn find(&self, query: &RecordQuery) -> Result<Vec<TestRecord>, SourceError> {
        let mut sql = String::from(
            "SELECT id, payload FROM test_results WHERE start >= ?1 AND start <= ?2",
        );
        let mut keyword_params = Vec::new();
        if !query.name_keywords.is_empty() {
            let mut conditions = Vec::new();
            for keyword in &query.name_keywords {
                keyword_params.push(format!("%{}%", keyword.to_lowercase()));
                conditions.push(format!("lower(name) LIKE ?{}", keyword_params.len() + 2));
            }
            sql.push_str(&format!(" AND ({})", conditions.join(" OR ")));
        }
        sql.push_str(" ORDER BY start ASC");

        if self.debug_queries {
            info!(
                "Record query: start in [{}, {}], name keywords {:?}",
                query.from_epoch(),
                query.to_epoch(),
                query.name_keywords
            );
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        stmt.raw_bind_parameter(1, query.from_epoch())?;
        stmt.raw_bind_parameter(2, query.to_epoch())?;
        for (i, param) in keyword_params.iter().enumerate() {
            stmt.raw_bind_parameter(i + 3, param)?;
        }

        let rows: Vec<(String, String)> = stmt
            .raw_query()
            .mapped(|row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .collect::<Result<_, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, payload) in rows {
            match serde_json::from_str::<TestRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable record {}: {}", id, e),
            }
        }

        if self.debug_queries {
            info!("Record query returned {} records", records.len());
        }
        Ok(records)
    }

    pub fn ping(&self) -> Result<(), SourceError> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    pub fn count(&self) -> Result<i64, SourceError> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM test_results", [], |row| row.get(0))?)
    }
}

impl RecordSource for RecordStore {
    fn kind(&self) -> SourceKind {
        SourceKind::Database
    }

    fn query(&self, query: &RecordQuery) -> Result<Vec<TestRecord>, SourceError> {
        self.find(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_metrics;
    use crate::records::{LegacyTestType, TestCategory, TypeFilter};
    use chrono::DateTime;

    fn window(from: i64, to: i64, filter: TypeFilter) -> RecordQuery {
        RecordQuery::new(
            DateTime::from_timestamp(from, 0).unwrap(),
            DateTime::from_timestamp(to, 0).unwrap(),
            filter,
        )
    }

    #[test]
    fn test_insert_assigns_id_and_round_trips() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut record = TestRecord::new("test_mcb_trip", "s1", 1_000.0, 60.0);
        record
            .extra
            .insert("document_type".to_string(), "function_metadata".into());

        let id = store.insert(&record).unwrap();
        assert!(!id.is_empty());

        let found = store.find(&window(0, 2_000, TypeFilter::All)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_deref(), Some(id.as_str()));
        assert_eq!(found[0].extra["document_type"], "function_metadata");
    }

    #[test]
    fn test_find_applies_bounds_and_keywords() {
        let store = RecordStore::open_in_memory().unwrap();
        store.insert(&TestRecord::new("test_MCB_trip", "a", 1_000.0, 1.0)).unwrap();
        store.insert(&TestRecord::new("test_decabit", "b", 1_500.0, 1.0)).unwrap();
        store.insert(&TestRecord::new("test_telenerg", "c", 2_000.0, 1.0)).unwrap();
        store.insert(&TestRecord::new("test_decabit", "d", 2_001.0, 1.0)).unwrap();

        let all = store.find(&window(1_000, 2_000, TypeFilter::All)).unwrap();
        assert_eq!(all.len(), 3);

        let meters = store
            .find(&window(0, 2_000, TypeFilter::Legacy(LegacyTestType::Meter)))
            .unwrap();
        let sessions: Vec<&str> = meters.iter().map(|r| r.session_uuid4.as_str()).collect();
        assert_eq!(sessions, vec!["b", "c"]);

        let mcb = store
            .find(&window(0, 3_000, TypeFilter::Legacy(LegacyTestType::Mcb)))
            .unwrap();
        assert_eq!(mcb.len(), 1);
    }

    #[test]
    fn test_category_filter_keeps_declared_category_with_neutral_name() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut record = TestRecord::new("breaker check 42", "s1", 1_000.0, 60.0);
        record.category = Some(TestCategory::McbTripTime);
        store.insert(&record).unwrap();

        let filter = TypeFilter::Category(TestCategory::McbTripTime);
        let found = store.find(&window(0, 2_000, filter)).unwrap();
        assert_eq!(found.len(), 1);

        let metrics = compute_metrics(&found, &filter, SourceKind::Database);
        assert_eq!(metrics.total_tests, 1);
        assert_eq!(metrics.declared_categories, 1);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut record = TestRecord::new("test_rcd", "s", 0.0, 1.0);
        record.id = Some("fixed".to_string());
        store.insert(&record).unwrap();
        assert!(store.insert(&record).is_err());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_open_on_disk_and_ping() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("results.db");
        let store = RecordStore::open(&path, true).unwrap();
        assert!(store.ping().is_ok());
        assert_eq!(store.db_path(), Some(path.as_path()));
    }
}
