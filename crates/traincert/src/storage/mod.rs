//! Storage layer: the relational store and the issuer key file.
//!
//! # Layout
//!
//! By convention the default root is `~/.traincert/`:
//!
//! ```text
//! ~/.traincert/
//! ├── traincert.db      SQLite: courses, enrollments, gates, exams, certificates
//! ├── issuer.key        encrypted issuer signing key
//! └── config.json       optional engine configuration
//! ```
//!
//! # Modules
//!
//! - [`schema`]: table definitions and schema versioning.
//! - [`audit`]: append-only audit log written inside mutation transactions.
//! - [`key_file`]: `issuer.key` save/load with passphrase encryption.

pub mod audit;
pub mod key_file;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::{Result, TrainError};

pub use key_file::{load_issuer_key, read_public_key, save_issuer_key, IssuerKeyFile};

/// Default database file name inside the data directory.
pub const DB_FILE: &str = "traincert.db";

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed store for every engine table.
///
/// One `Database` owns one connection. Several `Database` values may point at
/// the same file (one per process or thread); consistency between them comes
/// from SQLite transactions and constraints, not from in-process locks.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create a database file and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        log::debug!("opening database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// File backing this database, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a read or single-statement write on the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TrainError::Storage(format!("lock poisoned: {e}")))?;
        f(&conn)
    }

    /// Run `f` inside a transaction. The transaction commits only when `f`
    /// returns `Ok`; any error rolls it back.
    ///
    /// Use [`TransactionBehavior::Immediate`] for read-modify-write work so
    /// the write lock is taken before the first read.
    pub fn with_tx<F, T>(&self, behavior: TransactionBehavior, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| TrainError::Storage(format!("lock poisoned: {e}")))?;
        let tx = conn.transaction_with_behavior(behavior)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Idempotent lookup that is retried once on a storage failure.
    /// Only for reads: writes are never retried.
    pub fn read_retrying<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn(&Connection) -> Result<T>,
    {
        match self.with_conn(&f) {
            Err(TrainError::Storage(first)) => {
                log::warn!("read failed, retrying once: {first}");
                self.with_conn(&f)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

/// Map an optional row: `QueryReturnedNoRows` becomes `None`.
pub(crate) fn optional<T>(r: rusqlite::Result<T>) -> Result<Option<T>> {
    match r {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
