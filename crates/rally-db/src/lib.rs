pub mod error;
pub mod executor;
pub mod migrations;
pub mod models;
pub mod queries;

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use tracing::{error, info};
use uuid::Uuid;

pub use error::DbError;
pub use executor::RetryPolicy;

const READER_POOL_SIZE: usize = 4;

/// SQLite handle with a single writer connection and a small read-only pool.
/// WAL mode lets readers proceed while a write transaction is open.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
    retry: RetryPolicy,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let writer = Connection::open(path)?;
        writer.pragma_update(None, "journal_mode", "WAL")?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            readers.push(Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?);
        }

        info!("Database opened at {} (1 writer + {} readers)", path.display(), READER_POOL_SIZE);
        Self::build(writer, readers)
    }

    /// In-memory database on a shared-cache URI so the reader pool sees the
    /// same data as the writer. Used by tests.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let uri = format!("file:rally-{}?mode=memory&cache=shared", Uuid::new_v4());
        let writer = Connection::open(&uri)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            readers.push(Connection::open_with_flags(
                &uri,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?);
        }

        Self::build(writer, readers)
    }

    fn build(writer: Connection, readers: Vec<Connection>) -> Result<Self, DbError> {
        writer.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&writer)?;
        for reader in &readers {
            reader.pragma_update(None, "foreign_keys", "ON")?;
        }

        Ok(Self {
            writer: Mutex::new(writer),
            readers: readers.into_iter().map(Mutex::new).collect(),
            reader_idx: AtomicUsize::new(0),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx].lock().map_err(|_| DbError::Poisoned)?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.writer.lock().map_err(|_| DbError::Poisoned)?;
        f(&conn)
    }

    /// Single-statement read through the retry policy. The reader lock is
    /// taken and released inside each attempt, never held across a backoff
    /// sleep.
    pub fn read_retry<F, T>(&self, op: &str, mut f: F) -> Result<T, DbError>
    where
        F: FnMut(&Connection) -> Result<T, DbError>,
    {
        executor::retry(&self.retry, op, || self.with_conn(&mut f))
    }

    /// Run `work` inside a write transaction. BEGIN IMMEDIATE takes the
    /// write lock up front; a busy BEGIN or COMMIT is retried under the
    /// policy (re-running `work`). An error from `work` rolls the
    /// transaction back and is returned unchanged; a rollback failure is
    /// logged, never masking the original error.
    pub fn with_tx<T, E, F>(&self, mut work: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnMut(&Transaction<'_>) -> Result<T, E>,
    {
        let mut conn = self.writer.lock().map_err(|_| E::from(DbError::Poisoned))?;

        let mut attempt = 0;
        loop {
            match tx_once(&mut conn, &mut work) {
                Ok(value) => return Ok(value),
                Err(TxFailure::Envelope(err)) if err.is_transient() => {
                    let attempts = attempt + 1;
                    if attempts >= self.retry.max_attempts {
                        error!("transaction: attempt {attempts} failed ({err}), giving up");
                        return Err(E::from(err.into_exhausted(attempts)));
                    }
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        "transaction: attempt {attempts} failed ({err}), retrying in {delay:?}"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(TxFailure::Envelope(err)) => return Err(E::from(err)),
                Err(TxFailure::Work(err)) => return Err(err),
            }
        }
    }
}

enum TxFailure<E> {
    /// BEGIN or COMMIT failed; the unit of work may be re-run.
    Envelope(DbError),
    /// `work` itself failed; rolled back, never retried here.
    Work(E),
}

fn tx_once<T, E, F>(conn: &mut Connection, work: &mut F) -> Result<T, TxFailure<E>>
where
    F: FnMut(&Transaction<'_>) -> Result<T, E>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| TxFailure::Envelope(DbError::from(e)))?;

    match work(&tx) {
        Ok(value) => tx
            .commit()
            .map(|_| value)
            .map_err(|e| TxFailure::Envelope(DbError::from(e))),
        Err(err) => {
            if let Err(rb) = tx.rollback() {
                error!("rollback failed: {rb}");
            }
            Err(TxFailure::Work(err))
        }
    }
}
