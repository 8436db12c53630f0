//! Durable mirrors for the dedup set.
//!
//! Every backend stores a flat, ordered list of ids and rewrites it
//! wholesale on `save`. The in-memory set in [`EventDeduplicator`] is the
//! source of truth; a store is only consulted at startup.
//!
//! [`EventDeduplicator`]: crate::pipeline::dedup::EventDeduplicator

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::config::DedupBackend;
use crate::error::PersistenceError;

#[async_trait]
pub trait ProcessedStore: Send + Sync {
    /// Load the persisted ids, oldest first. A missing store is an empty list.
    async fn load(&self) -> Result<Vec<String>, PersistenceError>;

    /// Replace the persisted list with `ids`.
    async fn save(&self, ids: &[String]) -> Result<(), PersistenceError>;
}

/// Build the store selected by configuration. `None` means memory only.
pub async fn open_store(
    backend: &DedupBackend,
) -> Result<Option<Arc<dyn ProcessedStore>>, PersistenceError> {
    match backend {
        DedupBackend::Memory => Ok(None),
        DedupBackend::JsonFile(path) => Ok(Some(Arc::new(JsonFileStore::new(path.clone())))),
        DedupBackend::LibSql(path) => Ok(Some(Arc::new(LibSqlStore::new_local(path).await?))),
    }
}

// ── Memory ──────────────────────────────────────────────────────────

/// Keeps the last saved list in process. Used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    ids: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(ids: Vec<String>) -> Self {
        Self {
            ids: Mutex::new(ids),
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.ids.lock().map(|ids| ids.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ProcessedStore for MemoryStore {
    async fn load(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.snapshot())
    }

    async fn save(&self, ids: &[String]) -> Result<(), PersistenceError> {
        let mut guard = self
            .ids
            .lock()
            .map_err(|_| PersistenceError::Database("memory store lock poisoned".into()))?;
        *guard = ids.to_vec();
        Ok(())
    }
}

// ── JSON file ───────────────────────────────────────────────────────

/// A JSON array of ids in a single file.
///
/// Writes go to a sibling temp file and are renamed into place, so a crash
/// mid-write leaves the previous list intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "processed".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ProcessedStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<String>, PersistenceError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No dedup file yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let ids: Vec<String> = serde_json::from_slice(&raw)?;
        info!(path = %self.path.display(), count = ids.len(), "Loaded processed event ids");
        Ok(ids)
    }

    async fn save(&self, ids: &[String]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_vec_pretty(ids)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

// ── libSQL ──────────────────────────────────────────────────────────

/// One table of `(position, event_id)` rows, rewritten in a transaction.
pub struct LibSqlStore {
    /// Never read, only owned: the database must outlive `conn`, and an
    /// in-memory database is gone once its handle drops.
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| db_err("Failed to open libSQL database", e))?;
        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Dedup database opened");
        Ok(store)
    }

    /// In-memory database (for tests).
    pub async fn new_memory() -> Result<Self, PersistenceError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| db_err("Failed to create in-memory database", e))?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, PersistenceError> {
        let conn = db
            .connect()
            .map_err(|e| db_err("Failed to create connection", e))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS processed_events (
                position INTEGER PRIMARY KEY,
                event_id TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| db_err("Failed to create processed_events", e))?;

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

fn db_err(context: &str, e: libsql::Error) -> PersistenceError {
    PersistenceError::Database(format!("{context}: {e}"))
}

#[async_trait]
impl ProcessedStore for LibSqlStore {
    async fn load(&self) -> Result<Vec<String>, PersistenceError> {
        let mut rows = self
            .conn
            .query(
                "SELECT event_id FROM processed_events ORDER BY position",
                (),
            )
            .await
            .map_err(|e| db_err("Failed to query processed_events", e))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            let id: String = row.get(0).map_err(|e| db_err("Bad event_id column", e))?;
            ids.push(id);
        }
        Ok(ids)
    }

    async fn save(&self, ids: &[String]) -> Result<(), PersistenceError> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        tx.execute("DELETE FROM processed_events", ())
            .await
            .map_err(|e| db_err("Failed to clear processed_events", e))?;
        for (position, id) in ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO processed_events (position, event_id) VALUES (?1, ?2)",
                params![position as i64, id.clone()],
            )
            .await
            .map_err(|e| db_err("Failed to insert event id", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit processed_events", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn json_store_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_store_saves_and_reloads_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("processed.json");
        let store = JsonFileStore::new(&path);

        store.save(&ids(&["0x3", "0x1", "0x2"])).await.unwrap();
        store.save(&ids(&["0x1", "0x2"])).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.load().await.unwrap(), ids(&["0x1", "0x2"]));

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Serialization(_)));
    }

    #[tokio::test]
    async fn libsql_store_rewrites_list() {
        let store = LibSqlStore::new_memory().await.unwrap();
        assert!(store.load().await.unwrap().is_empty());

        store.save(&ids(&["a", "b", "c"])).await.unwrap();
        assert_eq!(store.load().await.unwrap(), ids(&["a", "b", "c"]));

        store.save(&ids(&["c", "d"])).await.unwrap();
        assert_eq!(store.load().await.unwrap(), ids(&["c", "d"]));
    }

    #[tokio::test]
    async fn libsql_memory_store_owns_its_database() {
        // Only the store is moved; the builder's locals are long gone.
        let store: Arc<dyn ProcessedStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let saved = tokio::spawn({
            let store = store.clone();
            async move { store.save(&ids(&["kept"])).await }
        })
        .await
        .unwrap();
        assert!(saved.is_ok());
        assert_eq!(store.load().await.unwrap(), ids(&["kept"]));
    }

    #[tokio::test]
    async fn libsql_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dedup.db");
        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store.save(&ids(&["x", "y"])).await.unwrap();
        }
        let store = LibSqlStore::new_local(&path).await.unwrap();
        assert_eq!(store.load().await.unwrap(), ids(&["x", "y"]));
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::with_ids(ids(&["1"]));
        assert_eq!(store.load().await.unwrap(), ids(&["1"]));
        store.save(&ids(&["2", "3"])).await.unwrap();
        assert_eq!(store.snapshot(), ids(&["2", "3"]));
    }

    #[tokio::test]
    async fn open_store_memory_backend_is_none() {
        assert!(open_store(&DedupBackend::Memory).await.unwrap().is_none());
    }
}
