//! Users store schema history.
//!
//! # Responsibility
//! - Carry the embedded SQL that builds the account table and both follow
//!   relations.
//! - Bring an opened store up to the newest schema this build knows.
//!
//! # Invariants
//! - Steps are numbered from 1 without gaps; `PRAGMA user_version` holds the
//!   number of the last applied step.
//! - All pending steps commit together. A failing step leaves the store at
//!   its previous version.
//! - A store written by a newer build is refused, never downgraded.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

/// One schema step, applied once per store.
#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "users",
        sql: include_str!("0001_users.sql"),
    },
    SchemaStep {
        version: 2,
        name: "follows",
        sql: include_str!("0002_follows.sql"),
    },
];

/// Schema version a fully migrated store reports.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Applies every step newer than the store's `user_version`.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = stored_version(conn)?;
    let to_version = latest_version();

    if from_version > to_version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: to_version,
        });
    }
    let pending = &SCHEMA_STEPS[from_version as usize..];
    if pending.is_empty() {
        debug!("event=db_migrate module=db status=skipped schema_version={from_version}");
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={from_version} to_version={to_version} steps={}",
        pending.len()
    );
    Ok(())
}

fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

#[cfg(test)]
mod tests {
    use super::{latest_version, SCHEMA_STEPS};

    #[test]
    fn steps_are_numbered_without_gaps() {
        for (index, step) in SCHEMA_STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1, "step {}", step.name);
        }
        assert_eq!(latest_version() as usize, SCHEMA_STEPS.len());
    }
}
