//! SQLite storage bootstrap, connection handle and schema migrations.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the users store.
//! - Apply schema migrations in deterministic order.
//! - Expose a shareable [`Database`] handle with an explicit connect/close
//!   lifecycle.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No account or follow data is read or written before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod handle;
pub mod migrations;
mod open;

pub use handle::{Closer, Database};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The handle has not been connected yet, or was already closed.
    NotConnected,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::NotConnected => write!(f, "database is not connected"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::NotConnected => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
