use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::keygen;
use crate::signal::CreatedSignal;

/// Lazily constructed shared database handle.
///
/// The host application builds one of these at startup and hands it to
/// whoever needs storage; the underlying [`Database`] is opened on first
/// [`get`] under a double-checked lock, so concurrent first callers still
/// produce exactly one handle. A failed construction is not cached: the next
/// call retries from scratch.
///
/// [`get`]: LazyDatabase::get
pub struct LazyDatabase {
    data_dir: PathBuf,
    db_path: PathBuf,
    handle: RwLock<Option<Arc<Database>>>,
    created: CreatedSignal,
}

impl LazyDatabase {
    #[must_use]
    pub fn new(data_dir: PathBuf, db_path: PathBuf) -> Self {
        Self {
            data_dir,
            db_path,
            handle: RwLock::new(None),
            created: CreatedSignal::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_dir.clone(), config.db_path.clone())
    }

    /// Returns the shared handle, opening the database on first call.
    ///
    /// Key derivation and the open itself run on the calling thread and may
    /// block. Errors propagate to the caller and leave the slot empty.
    pub fn get(&self) -> Result<Arc<Database>> {
        if let Some(db) = self.handle.read().as_ref() {
            return Ok(Arc::clone(db));
        }

        let mut slot = self.handle.write();
        // Another caller may have won the race while we waited for the lock.
        if let Some(db) = slot.as_ref() {
            return Ok(Arc::clone(db));
        }

        let key = keygen::load_or_create_key(&self.data_dir)?;
        let db = Arc::new(Database::open(&self.db_path, &key)?);
        let newly_created = db.was_created();
        *slot = Some(Arc::clone(&db));
        drop(slot);

        if newly_created {
            // Signalled after the slot is released; set() cannot re-enter get().
            info!(path = %self.db_path.display(), "database file newly created");
            self.created.set();
        }
        Ok(db)
    }

    /// One-shot signal set the first time the database file is newly
    /// created. Never fires for opens of a pre-existing file.
    #[must_use]
    pub fn created(&self) -> &CreatedSignal {
        &self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn lazy_db(dir: &TempDir) -> LazyDatabase {
        LazyDatabase::new(dir.path().to_path_buf(), dir.path().join("test.db"))
    }

    #[test]
    fn test_get_creates_once_and_signals() {
        let dir = TempDir::new().unwrap();
        let lazy = lazy_db(&dir);

        assert!(!lazy.created().is_set());
        let first = lazy.get().unwrap();
        assert!(lazy.created().wait_timeout(Duration::from_secs(1)));

        let second = lazy.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_existing_file_does_not_signal() {
        let dir = TempDir::new().unwrap();
        lazy_db(&dir).get().unwrap();

        // Fresh accessor over the existing file: same handle semantics, no
        // creation signal.
        let lazy = lazy_db(&dir);
        lazy.get().unwrap();
        assert!(!lazy.created().is_set());
    }

    #[test]
    fn test_concurrent_first_calls_share_one_handle() {
        let dir = TempDir::new().unwrap();
        let lazy = lazy_db(&dir);

        let handles: Vec<Arc<Database>> = std::thread::scope(|scope| {
            (0..8)
                .map(|_| scope.spawn(|| lazy.get().unwrap()))
                .collect::<Vec<_>>()
                .into_iter()
                .map(|t| t.join().unwrap())
                .collect()
        });

        for db in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], db));
        }
        // Exactly one of the racing opens created the file.
        assert!(handles[0].was_created());
    }

    #[test]
    fn test_failed_construction_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let lazy = lazy_db(&dir);

        // Occupy the key file path with a directory so key derivation fails.
        let key_path = dir.path().join(keygen::KEY_FILE);
        std::fs::create_dir(&key_path).unwrap();
        assert!(lazy.get().is_err());
        assert!(!lazy.created().is_set());

        // Once the obstruction is gone, the same accessor succeeds.
        std::fs::remove_dir(&key_path).unwrap();
        let db = lazy.get().unwrap();
        assert!(db.was_created());
        assert!(lazy.created().is_set());
    }
}
