//! Store handle and transaction plumbing.

use crate::error::StoreError;
use crate::schema;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use storefront_commerce::StoreConfig;
use tracing::{debug, warn};

/// Handle over one SQLite connection plus the business configuration.
///
/// All multi-statement writes go through [`Store::with_immediate_tx`],
/// which takes the write lock up front so that every read inside the
/// closure sees a stable snapshot and every guarded update is serialized.
pub struct Store {
    pub(crate) conn: Connection,
    pub(crate) config: StoreConfig,
}

impl Store {
    /// Open (and initialize) a store at the given path.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, config)
    }

    /// Open an in-memory store. Each call returns an independent database.
    pub fn open_in_memory(config: StoreConfig) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, config)
    }

    fn from_connection(conn: Connection, config: StoreConfig) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        schema::init(&conn)?;
        debug!("store opened");
        Ok(Self { conn, config })
    }

    /// Business configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Run a closure inside an immediate (write-locking) transaction,
    /// retrying on busy/locked up to the configured attempt count.
    ///
    /// The closure may run more than once; it must not have side effects
    /// outside the transaction.
    pub(crate) fn with_immediate_tx<T>(
        &mut self,
        mut f: impl FnMut(&Transaction<'_>, &StoreConfig) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let config = self.config.clone();
        let attempts = config.write_retry_attempts.max(1);

        for attempt in 1..=attempts {
            let result = Self::run_once(&mut self.conn, &config, &mut f);
            match result {
                Err(err) if err.is_busy() && attempt < attempts => {
                    warn!(attempt, "transaction hit write contention, retrying");
                    continue;
                }
                Err(err) if err.is_busy() => {
                    return Err(StoreError::ConcurrentModification { attempts });
                }
                other => return other,
            }
        }
        Err(StoreError::ConcurrentModification { attempts })
    }

    fn run_once<T>(
        conn: &mut Connection,
        config: &StoreConfig,
        f: &mut impl FnMut(&Transaction<'_>, &StoreConfig) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx, config)?;
        tx.commit()?;
        Ok(value)
    }
}
