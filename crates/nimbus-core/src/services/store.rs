//! Local durable store shared by the CLI, the scheduler and the workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    CacheRepository, Database, MutationRepository, SettingsRepository, SqliteCacheRepository,
    SqliteMutationRepository, SqliteSettingsRepository, StateCounts,
};
use crate::models::{CacheClass, CachedEntity, MutationId, PendingMutation, ReportPayload, Settings};
use crate::util::now_millis;
use crate::Result;

/// Thread-safe handle over the report queue and snapshot cache.
///
/// Every operation runs as a single statement on one connection, so each
/// row change is atomic and durable when the call returns.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    max_attempts: Option<u32>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    ///
    /// A file that is not a valid database is moved aside and a fresh store
    /// is created in its place.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path) {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local store at {} is not a valid database: {}. Moving it aside.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path)?
            }
            Err(error) => return Err(error),
        };

        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
            max_attempts: None,
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
            max_attempts: None,
        })
    }

    /// Abandon a mutation after this many failed pushes (`None` retries forever).
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("nimbus.db");
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local store from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale sidecar file {}", path.display());
            }
        }

        Ok(())
    }

    /// Validate and durably queue a report.
    pub async fn enqueue(&self, payload: ReportPayload) -> Result<PendingMutation> {
        let db = self.db.lock().await;
        let repo = SqliteMutationRepository::new(db.connection());
        let mutation = repo.enqueue(payload, now_millis())?;
        tracing::debug!(id = %mutation.id, "Queued report");
        Ok(mutation)
    }

    /// Fetch a mutation in any state.
    pub async fn get_mutation(&self, id: &MutationId) -> Result<Option<PendingMutation>> {
        let db = self.db.lock().await;
        SqliteMutationRepository::new(db.connection()).get(id)
    }

    /// Pending mutations, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<PendingMutation>> {
        let db = self.db.lock().await;
        SqliteMutationRepository::new(db.connection()).list_pending()
    }

    /// Mutations in any state, newest first.
    pub async fn list_mutations(&self, limit: usize) -> Result<Vec<PendingMutation>> {
        let db = self.db.lock().await;
        SqliteMutationRepository::new(db.connection()).list(limit)
    }

    /// IDs starting with `prefix`, for short-id lookups.
    pub async fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<MutationId>> {
        let db = self.db.lock().await;
        SqliteMutationRepository::new(db.connection()).list_ids_by_prefix(prefix, limit)
    }

    pub async fn mark_synced(&self, id: &MutationId) -> Result<()> {
        let db = self.db.lock().await;
        SqliteMutationRepository::new(db.connection()).mark_synced(id, now_millis())
    }

    /// Record a failed push and return the updated row.
    pub async fn mark_failed(&self, id: &MutationId, message: &str) -> Result<PendingMutation> {
        let db = self.db.lock().await;
        SqliteMutationRepository::new(db.connection()).mark_failed(
            id,
            message,
            self.max_attempts,
            now_millis(),
        )
    }

    pub async fn delete_synced_older_than(&self, cutoff: i64) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteMutationRepository::new(db.connection()).delete_synced_older_than(cutoff)
    }

    /// Drop a mutation the user no longer wants delivered.
    pub async fn discard(&self, id: &MutationId) -> Result<()> {
        let db = self.db.lock().await;
        SqliteMutationRepository::new(db.connection()).discard(id)
    }

    /// Put abandoned mutations back in the queue.
    pub async fn requeue_failed(&self) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteMutationRepository::new(db.connection()).requeue_failed(now_millis())
    }

    pub async fn count_by_state(&self) -> Result<StateCounts> {
        let db = self.db.lock().await;
        SqliteMutationRepository::new(db.connection()).count_by_state()
    }

    pub async fn upsert_cache(&self, entity: &CachedEntity) -> Result<()> {
        let db = self.db.lock().await;
        SqliteCacheRepository::new(db.connection()).upsert(entity)
    }

    pub async fn get_cache(&self, key: &str, class: CacheClass) -> Result<Option<CachedEntity>> {
        let db = self.db.lock().await;
        SqliteCacheRepository::new(db.connection()).get(key, class)
    }

    pub async fn list_cache(&self, class: CacheClass) -> Result<Vec<CachedEntity>> {
        let db = self.db.lock().await;
        SqliteCacheRepository::new(db.connection()).list(class)
    }

    /// Delete cache rows of `class` fetched before `cutoff`.
    pub async fn delete_older_than(&self, cutoff: i64, class: CacheClass) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteCacheRepository::new(db.connection()).delete_older_than(cutoff, class)
    }

    pub async fn load_settings(&self) -> Result<Settings> {
        let db = self.db.lock().await;
        SqliteSettingsRepository::new(db.connection()).load()
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let db = self.db.lock().await;
        SqliteSettingsRepository::new(db.connection()).save(settings)
    }

    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute_batch(sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_payload, SyncState};
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn queued_reports_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nimbus.db");

        let queued = {
            let store = LocalStore::open_path(&path).unwrap();
            store.enqueue(sample_payload("Lisbon", 1_000)).await.unwrap()
        };

        let reopened = LocalStore::open_path(&path).unwrap();
        let pending = reopened.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, queued.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn max_attempts_applies_to_mark_failed() {
        let store = LocalStore::open_in_memory()
            .unwrap()
            .with_max_attempts(Some(1));
        let queued = store.enqueue(sample_payload("Lisbon", 1_000)).await.unwrap();

        let failed = store.mark_failed(&queued.id, "timeout").await.unwrap();
        assert_eq!(failed.state, SyncState::Failed);
        assert!(store.list_pending().await.unwrap().is_empty());
    }

    #[test]
    fn detects_corrupted_db_errors() {
        assert!(LocalStore::is_corrupted_db_error(&crate::Error::NotFound(
            "file is not a database".to_string()
        )));
        assert!(!LocalStore::is_corrupted_db_error(
            &crate::Error::InvalidInput("latitude out of range".to_string())
        ));
    }

    #[test]
    fn open_path_quarantines_corrupted_file() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("nimbus.db");
        let wal_path = tmp.path().join("nimbus.db-wal");
        std::fs::write(&db_path, vec![b'x'; 4096]).unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();

        let store = LocalStore::open_path(&db_path).unwrap();
        assert_eq!(store.db_path(), Some(db_path.as_path()));

        let found_backup = std::fs::read_dir(tmp.path()).unwrap().any(|entry| {
            entry
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("nimbus.db.corrupt-")
        });
        assert!(found_backup);
    }
}
