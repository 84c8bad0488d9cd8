//! Shareable database handle with an explicit connect/close lifecycle.
//!
//! # Responsibility
//! - Own the single SQLite connection used by repositories.
//! - Hand out scoped access to that connection to one caller at a time.
//! - Give the bootstrap layer a `connect()` that returns its own closer.
//!
//! # Invariants
//! - Store access before `connect()` or after close fails with
//!   `DbError::NotConnected` instead of panicking.
//! - A connection recovered from a poisoned lock never carries a half-open
//!   transaction into the next caller.

use super::open::{open_db, open_db_in_memory};
use super::{DbError, DbResult};
use crate::config::DatabaseConfig;
use log::{info, warn};
use rusqlite::Connection;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shuts the connection opened by [`Database::connect`] down.
pub type Closer = Box<dyn FnOnce() -> DbResult<()> + Send>;

/// Cheaply clonable handle to the users store.
///
/// Clones share one connection; repositories and services hold a clone and
/// nothing else, so they are safe to share between request threads.
#[derive(Clone)]
pub struct Database {
    config: DatabaseConfig,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl Database {
    /// Creates an unconnected handle. Call [`Database::connect`] before use.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates and connects a migrated in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let database = Self::new(DatabaseConfig::in_memory());
        // The handle closes on `close()` or when the last clone drops.
        let _closer = database.connect()?;
        Ok(database)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Opens the configured store, applies migrations and returns the closer.
    ///
    /// Connecting an already connected handle keeps the live connection.
    pub fn connect(&self) -> DbResult<Closer> {
        let mut slot = self.lock();
        if slot.is_some() {
            warn!("event=db_connect module=db status=skipped reason=already_connected");
        } else {
            let conn = match self.config.path.as_ref() {
                Some(path) => open_db(path, self.config.busy_timeout())?,
                None => open_db_in_memory()?,
            };
            *slot = Some(conn);
        }

        let database = self.clone();
        Ok(Box::new(move || database.close()))
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Closes the connection. Closing twice is a no-op.
    ///
    /// When SQLite refuses to close, the connection stays usable and the
    /// error is returned.
    pub fn close(&self) -> DbResult<()> {
        let mut slot = self.lock();
        let Some(conn) = slot.take() else {
            return Ok(());
        };

        match conn.close() {
            Ok(()) => {
                info!("event=db_close module=db status=ok");
                Ok(())
            }
            Err((conn, err)) => {
                *slot = Some(conn);
                Err(DbError::Sqlite(err))
            }
        }
    }

    /// Runs `work` with exclusive access to the live connection.
    pub fn with_conn<T, E>(&self, work: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let slot = self.lock();
        let conn = slot.as_ref().ok_or(DbError::NotConnected)?;
        work(conn)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("event=db_lock module=db status=recovered reason=poisoned");
            self.conn.clear_poison();
            let guard = poisoned.into_inner();
            if let Some(conn) = guard.as_ref() {
                if !conn.is_autocommit() {
                    if let Err(err) = conn.execute_batch("ROLLBACK;") {
                        warn!("event=db_lock module=db status=error error_code=rollback_failed error={err}");
                    }
                }
            }
            guard
        })
    }
}

impl Debug for Database {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
