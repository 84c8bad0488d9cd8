//! Single-statement transactions with explicit rollback reporting.
//!
//! # Responsibility
//! - Run one write as begin -> prepare -> execute -> commit.
//! - Roll back on any failing step and surface rollback failure separately.
//! - Bind the request context to the connection while store calls run.
//!
//! # Invariants
//! - The context is checked before every step.
//! - The progress handler is removed before rollback runs, so a cancelled
//!   request can still roll back.

use crate::context::RequestContext;
use crate::repo::user_repo::{RepoError, RepoResult, TxStep};
use log::{error, warn};
use rusqlite::{ffi, Connection, ErrorCode, Params};
use std::ffi::c_int;

/// VM instructions between two context checks inside one statement.
const PROGRESS_CHECK_OPS: c_int = 1_000;

/// Operation name plus the key it acted on, used to tag errors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WriteScope<'a> {
    pub operation: &'static str,
    pub key: &'a str,
}

impl WriteScope<'_> {
    fn cancelled(&self, reason: crate::context::ContextError) -> RepoError {
        RepoError::Cancelled {
            operation: self.operation,
            key: self.key.to_string(),
            reason,
        }
    }
}

/// Interrupts statements on `conn` once `ctx` is cancelled or expired.
pub(crate) struct InterruptGuard<'conn> {
    conn: &'conn Connection,
}

impl<'conn> InterruptGuard<'conn> {
    pub(crate) fn install(conn: &'conn Connection, ctx: &RequestContext) -> Self {
        let ctx = ctx.clone();
        conn.progress_handler(PROGRESS_CHECK_OPS, Some(move || ctx.check().is_err()));
        Self { conn }
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

/// Executes `sql` with `params` in its own transaction.
///
/// Returns the number of changed rows.
pub(crate) fn execute_in_unit_of_work<P: Params>(
    conn: &Connection,
    ctx: &RequestContext,
    scope: WriteScope<'_>,
    sql: &str,
    params: P,
) -> RepoResult<usize> {
    let outcome = {
        let _interrupt = InterruptGuard::install(conn, ctx);
        run_steps(conn, ctx, &scope, sql, params)
    };
    outcome.map_err(|cause| roll_back(conn, &scope, cause))
}

fn run_steps<P: Params>(
    conn: &Connection,
    ctx: &RequestContext,
    scope: &WriteScope<'_>,
    sql: &str,
    params: P,
) -> RepoResult<usize> {
    step(ctx, scope, TxStep::Begin, || {
        conn.execute_batch("BEGIN IMMEDIATE;")
    })?;
    let changed = {
        let mut statement = step(ctx, scope, TxStep::Prepare, || conn.prepare(sql))?;
        step(ctx, scope, TxStep::Execute, || statement.execute(params))?
    };
    step(ctx, scope, TxStep::Commit, || conn.execute_batch("COMMIT;"))?;
    Ok(changed)
}

fn step<T>(
    ctx: &RequestContext,
    scope: &WriteScope<'_>,
    tx_step: TxStep,
    work: impl FnOnce() -> rusqlite::Result<T>,
) -> RepoResult<T> {
    ctx.check().map_err(|reason| scope.cancelled(reason))?;
    work().map_err(|source| classify_failure(ctx, scope, tx_step, source))
}

fn classify_failure(
    ctx: &RequestContext,
    scope: &WriteScope<'_>,
    tx_step: TxStep,
    source: rusqlite::Error,
) -> RepoError {
    if let Err(reason) = ctx.check() {
        return scope.cancelled(reason);
    }
    if tx_step == TxStep::Execute && is_uniqueness_violation(&source) {
        return RepoError::Conflict {
            operation: scope.operation,
            key: scope.key.to_string(),
            source,
        };
    }
    RepoError::Transaction {
        operation: scope.operation,
        step: tx_step,
        key: scope.key.to_string(),
        source,
    }
}

fn is_uniqueness_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

fn roll_back(conn: &Connection, scope: &WriteScope<'_>, cause: RepoError) -> RepoError {
    // Nothing to undo: BEGIN never ran, or SQLite already ended the transaction.
    if conn.is_autocommit() {
        return cause;
    }

    match conn.execute_batch("ROLLBACK;") {
        Ok(()) => {
            warn!(
                "event=tx_rollback module=repo status=ok operation={} error_code={}",
                scope.operation,
                cause.code()
            );
            cause
        }
        Err(source) => {
            error!(
                "event=tx_rollback module=repo status=error operation={} error_code=rollback_failed cause_code={} error={}",
                scope.operation,
                cause.code(),
                source
            );
            RepoError::Rollback {
                operation: scope.operation,
                key: scope.key.to_string(),
                cause: Box::new(cause),
                source,
            }
        }
    }
}
