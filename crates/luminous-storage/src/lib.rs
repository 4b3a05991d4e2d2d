//! DuckDB-backed persistence for the Luminous Ecosystem.
//!
//! Snapshots are stored as a single JSON payload keyed by a fixed row id.
//! Every operation degrades to a sidecar JSON file when DuckDB misbehaves,
//! so a broken database never halts the simulation.

use duckdb::{Connection, params};
use luminous_core::{EcosystemSnapshot, PersistenceError, StatePersistence};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Row id of the singleton state record.
const STATE_ROW_ID: &str = "main_state";

/// Storage error wrapper.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("fallback file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage worker error: {0}")]
    Worker(String),
}

/// On-disk shape of the sidecar fallback file.
#[derive(Debug, Serialize, Deserialize)]
struct FallbackRecord {
    updated_at: i64,
    snapshot: EcosystemSnapshot,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Synchronous snapshot store over a DuckDB database plus a JSON sidecar.
pub struct Storage {
    conn: Option<Connection>,
    fallback_path: PathBuf,
}

impl Storage {
    /// Open or create a DuckDB database at the provided path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Some(conn),
            fallback_path: fallback_path_for(path),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    /// Build a store that only uses the JSON sidecar, for environments where
    /// the database cannot be opened at all.
    #[must_use]
    pub fn fallback_only(path: impl AsRef<Path>) -> Self {
        Self {
            conn: None,
            fallback_path: fallback_path_for(path.as_ref()),
        }
    }

    /// Whether the DuckDB connection is live (as opposed to sidecar-only).
    #[must_use]
    pub fn is_database_backed(&self) -> bool {
        self.conn.is_some()
    }

    fn initialize_schema(&self) -> Result<(), StorageError> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };
        conn.execute(
            "create table if not exists ecosystem_state (
                id varchar primary key,
                payload varchar not null,
                updated_at bigint not null
            )",
            [],
        )?;
        conn.execute(
            "create table if not exists ecosystem_update (
                id varchar primary key,
                updated_at bigint not null
            )",
            [],
        )?;
        Ok(())
    }

    /// Persist a snapshot, falling back to the sidecar file on any database
    /// failure.
    pub fn save_state(&mut self, snapshot: &EcosystemSnapshot) -> Result<(), StorageError> {
        let payload = serde_json::to_string(snapshot)?;
        let updated_at = now_millis();
        if let Some(conn) = &self.conn {
            match write_state(conn, &payload, updated_at) {
                Ok(()) => {
                    debug!(cycle = snapshot.cycle, "snapshot persisted");
                    return Ok(());
                }
                Err(err) => {
                    warn!(error = %err, "database write failed; using fallback file");
                }
            }
        }
        let record = FallbackRecord {
            updated_at,
            snapshot: snapshot.clone(),
        };
        fs::write(&self.fallback_path, serde_json::to_vec(&record)?)?;
        debug!(path = %self.fallback_path.display(), "snapshot written to fallback file");
        Ok(())
    }

    /// Load the saved snapshot, if any. The sidecar file is consulted when
    /// the database errors or holds no row.
    pub fn load_state(&mut self) -> Result<Option<EcosystemSnapshot>, StorageError> {
        if let Some(conn) = &self.conn {
            match read_state(conn) {
                Ok(Some(payload)) => return Ok(Some(serde_json::from_str(&payload)?)),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "database read failed; trying fallback file");
                }
            }
        }
        self.load_fallback()
    }

    /// Millisecond timestamp of the most recent save, if known.
    pub fn last_update_time(&mut self) -> Result<Option<i64>, StorageError> {
        if let Some(conn) = &self.conn {
            match read_update_time(conn) {
                Ok(Some(updated_at)) => return Ok(Some(updated_at)),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "database read failed; trying fallback file");
                }
            }
        }
        Ok(self
            .load_fallback_record()?
            .map(|record| record.updated_at))
    }

    /// Drop the saved snapshot from both the database and the sidecar.
    pub fn clear_saved_state(&mut self) -> Result<(), StorageError> {
        if let Some(conn) = &self.conn {
            if let Err(err) = clear_state(conn) {
                warn!(error = %err, "database clear failed");
            }
        }
        if self.fallback_path.exists() {
            fs::remove_file(&self.fallback_path)?;
        }
        info!("saved state cleared");
        Ok(())
    }

    fn load_fallback(&self) -> Result<Option<EcosystemSnapshot>, StorageError> {
        Ok(self.load_fallback_record()?.map(|record| record.snapshot))
    }

    fn load_fallback_record(&self) -> Result<Option<FallbackRecord>, StorageError> {
        if !self.fallback_path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.fallback_path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

fn fallback_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".fallback.json");
    PathBuf::from(name)
}

fn write_state(conn: &Connection, payload: &str, updated_at: i64) -> Result<(), StorageError> {
    conn.execute(
        "insert or replace into ecosystem_state (id, payload, updated_at) values (?, ?, ?)",
        params![STATE_ROW_ID, payload, updated_at],
    )?;
    conn.execute(
        "insert or replace into ecosystem_update (id, updated_at) values (?, ?)",
        params![STATE_ROW_ID, updated_at],
    )?;
    Ok(())
}

fn read_state(conn: &Connection) -> Result<Option<String>, StorageError> {
    let mut stmt = conn.prepare("select payload from ecosystem_state where id = ?")?;
    match stmt.query_row(params![STATE_ROW_ID], |row| row.get::<_, String>(0)) {
        Ok(payload) => Ok(Some(payload)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn read_update_time(conn: &Connection) -> Result<Option<i64>, StorageError> {
    let mut stmt = conn.prepare("select updated_at from ecosystem_update where id = ?")?;
    match stmt.query_row(params![STATE_ROW_ID], |row| row.get::<_, i64>(0)) {
        Ok(updated_at) => Ok(Some(updated_at)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn clear_state(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "delete from ecosystem_state where id = ?",
        params![STATE_ROW_ID],
    )?;
    conn.execute(
        "delete from ecosystem_update where id = ?",
        params![STATE_ROW_ID],
    )?;
    Ok(())
}

impl StatePersistence for Storage {
    fn persist(&mut self, snapshot: &EcosystemSnapshot) -> Result<(), PersistenceError> {
        self.save_state(snapshot).map_err(PersistenceError::from)
    }

    fn restore(&mut self) -> Result<Option<EcosystemSnapshot>, PersistenceError> {
        self.load_state().map_err(PersistenceError::from)
    }

    fn last_update(&mut self) -> Result<Option<i64>, PersistenceError> {
        self.last_update_time().map_err(PersistenceError::from)
    }
}

#[derive(Debug)]
enum StorageCommand {
    Save(EcosystemSnapshot),
    Clear,
    Shutdown,
}

/// Asynchronous pipeline that hands saves to a dedicated worker thread so
/// the simulation loop never blocks on disk.
pub struct StoragePipeline {
    tx: mpsc::Sender<StorageCommand>,
    storage: Arc<Mutex<Storage>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StoragePipeline {
    /// Open the database and spawn the worker thread.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_storage(Storage::open(path)?)
    }

    pub fn from_storage(storage: Storage) -> Result<Self, StorageError> {
        let shared = Arc::new(Mutex::new(storage));
        let (tx, rx) = mpsc::channel::<StorageCommand>();
        let worker_storage = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("luminous-storage-worker".into())
            .spawn(move || {
                while let Ok(command) = rx.recv() {
                    match command {
                        StorageCommand::Save(snapshot) => {
                            let mut storage = lock_storage(&worker_storage);
                            if let Err(err) = storage.save_state(&snapshot) {
                                warn!(
                                    cycle = snapshot.cycle,
                                    error = %err,
                                    "failed to persist snapshot asynchronously"
                                );
                            }
                        }
                        StorageCommand::Clear => {
                            let mut storage = lock_storage(&worker_storage);
                            if let Err(err) = storage.clear_saved_state() {
                                warn!(error = %err, "failed to clear saved state");
                            }
                        }
                        StorageCommand::Shutdown => break,
                    }
                }
            })
            .map_err(|err| {
                StorageError::Worker(format!("failed to spawn storage worker thread: {err}"))
            })?;

        Ok(Self {
            tx,
            storage: shared,
            handle: Some(handle),
        })
    }

    /// Shared access to the underlying storage for synchronous reads.
    #[must_use]
    pub fn storage(&self) -> Arc<Mutex<Storage>> {
        Arc::clone(&self.storage)
    }

    /// Request asynchronous removal of the saved state.
    pub fn clear(&self) {
        let _ = self.tx.send(StorageCommand::Clear);
    }
}

fn lock_storage(storage: &Arc<Mutex<Storage>>) -> std::sync::MutexGuard<'_, Storage> {
    match storage.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl StatePersistence for StoragePipeline {
    fn persist(&mut self, snapshot: &EcosystemSnapshot) -> Result<(), PersistenceError> {
        self.tx
            .send(StorageCommand::Save(snapshot.clone()))
            .map_err(|_| {
                PersistenceError::from(StorageError::Worker(
                    "storage worker channel closed".to_string(),
                ))
            })
    }

    fn restore(&mut self) -> Result<Option<EcosystemSnapshot>, PersistenceError> {
        let mut storage = lock_storage(&self.storage);
        storage.load_state().map_err(PersistenceError::from)
    }

    fn last_update(&mut self) -> Result<Option<i64>, PersistenceError> {
        let mut storage = lock_storage(&self.storage);
        storage.last_update_time().map_err(PersistenceError::from)
    }
}

impl Drop for StoragePipeline {
    fn drop(&mut self) {
        let _ = self.tx.send(StorageCommand::Shutdown);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("storage worker thread panicked");
        }
    }
}
