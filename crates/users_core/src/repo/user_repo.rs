//! User repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Look users up by id, username or email through one shared routine.
//! - Enforce username/email uniqueness before creation.
//! - Persist new users and mutate both follow relations, one transaction per
//!   call.
//!
//! # Invariants
//! - A lookup either returns a fully parsed user or an error; never a blank
//!   record.
//! - The statement executed for a follow mutation is picked from exactly four
//!   kind/action specific texts by [`follow_statement`].
//! - Uniqueness checks fail closed: a lookup error other than "not found" is
//!   returned to the caller instead of being read as "does not exist".

use crate::context::{ContextError, RequestContext};
use crate::db::{Database, DbError};
use crate::model::follow::{FollowAction, FollowEdge};
use crate::model::user::{parse_uuid_text, SourceId, User, UserId};
use crate::repo::unit_of_work::{execute_in_unit_of_work, InterruptGuard, WriteScope};
use log::{debug, info};
use rusqlite::{params, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const USER_SELECT_SQL: &str = "SELECT
    uuid,
    username,
    email,
    hashed_password,
    created_by_uuid,
    created_at,
    updated_by_uuid,
    updated_at
FROM users";

const CREATE_USER_SQL: &str = "INSERT INTO users (
    uuid,
    username,
    email,
    hashed_password,
    created_by_uuid,
    created_at,
    updated_by_uuid,
    updated_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);";

const ADD_USER_FOLLOWER_SQL: &str = "INSERT INTO user_user_follows (follower, followed)
VALUES (?1, ?2)
ON CONFLICT (follower, followed) DO NOTHING;";

const REMOVE_USER_FOLLOWER_SQL: &str = "DELETE FROM user_user_follows
WHERE follower = ?1 AND followed = ?2;";

const ADD_SOURCE_FOLLOWER_SQL: &str = "INSERT INTO user_source_follows (follower, followed)
VALUES (?1, ?2)
ON CONFLICT (follower, followed) DO NOTHING;";

const REMOVE_SOURCE_FOLLOWER_SQL: &str = "DELETE FROM user_source_follows
WHERE follower = ?1 AND followed = ?2;";

pub type RepoResult<T> = Result<T, RepoError>;

/// Column a user lookup is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLookup {
    Id,
    Username,
    Email,
}

impl UserLookup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Username => "username",
            Self::Email => "email",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Id => "uuid",
            Self::Username => "username",
            Self::Email => "email",
        }
    }

    fn operation(self) -> &'static str {
        match self {
            Self::Id => "get_user_by_id",
            Self::Username => "get_user_by_username",
            Self::Email => "get_user_by_email",
        }
    }
}

/// Step of a unit of work that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStep {
    Begin,
    Prepare,
    Execute,
    Commit,
}

impl TxStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin transaction",
            Self::Prepare => "prepare statement",
            Self::Execute => "execute statement",
            Self::Commit => "commit transaction",
        }
    }
}

/// Repository error for user and follow-graph persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Lookup found no row for `key`.
    NotFound { lookup: UserLookup, key: String },
    /// Lookup failed for a reason other than a miss.
    Lookup {
        lookup: UserLookup,
        key: String,
        source: rusqlite::Error,
    },
    /// A write hit a UNIQUE or PRIMARY KEY constraint and was rolled back.
    Conflict {
        operation: &'static str,
        key: String,
        source: rusqlite::Error,
    },
    /// A unit-of-work step failed and the transaction was rolled back.
    Transaction {
        operation: &'static str,
        step: TxStep,
        key: String,
        source: rusqlite::Error,
    },
    /// A step failed and the rollback that followed failed too.
    Rollback {
        operation: &'static str,
        key: String,
        cause: Box<RepoError>,
        source: rusqlite::Error,
    },
    /// The request was cancelled or ran out of time.
    Cancelled {
        operation: &'static str,
        key: String,
        reason: ContextError,
    },
    /// A stored row could not be turned back into a domain record.
    InvalidData(String),
    Db(DbError),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// The failure that triggered a failed rollback.
    pub fn rollback_cause(&self) -> Option<&RepoError> {
        match self {
            Self::Rollback { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Stable label for log records; carries no user data.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Lookup { .. } => "lookup_failed",
            Self::Conflict { .. } => "conflict",
            Self::Transaction { .. } => "transaction_failed",
            Self::Rollback { .. } => "rollback_failed",
            Self::Cancelled { .. } => "cancelled",
            Self::InvalidData(_) => "invalid_data",
            Self::Db(_) => "db_error",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { lookup, key } => {
                write!(f, "failed to find user with {} {key}: not found", lookup.as_str())
            }
            Self::Lookup {
                lookup,
                key,
                source,
            } => write!(
                f,
                "failed to find user with {} {key}: {source}",
                lookup.as_str()
            ),
            Self::Conflict {
                operation,
                key,
                source,
            } => write!(f, "{operation} {key} conflicts with an existing row: {source}"),
            Self::Transaction {
                operation,
                step,
                key,
                source,
            } => write!(
                f,
                "failed to {} for {operation} {key}: {source}",
                step.as_str()
            ),
            Self::Rollback {
                operation,
                key,
                cause,
                source,
            } => write!(
                f,
                "failed to rollback after failing to {operation} {key}: {source} (triggered by: {cause})"
            ),
            Self::Cancelled {
                operation,
                key,
                reason,
            } => write!(f, "{operation} {key} abandoned: {reason}"),
            Self::InvalidData(message) => write!(f, "invalid persisted user data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound { .. } | Self::InvalidData(_) => None,
            Self::Lookup { source, .. }
            | Self::Conflict { source, .. }
            | Self::Transaction { source, .. }
            | Self::Rollback { source, .. } => Some(source),
            Self::Cancelled { reason, .. } => Some(reason),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Data access contract for users and the follow graph.
///
/// Every call takes the request context so abandoned requests stop touching
/// the store.
pub trait UserRepository {
    fn get_user_by_id(&self, ctx: &RequestContext, id: UserId) -> RepoResult<User>;
    fn get_user_by_username(&self, ctx: &RequestContext, username: &str) -> RepoResult<User>;
    fn get_user_by_email(&self, ctx: &RequestContext, email: &str) -> RepoResult<User>;
    /// `Ok(false)` when the candidate's email or username is taken.
    fn validate_for_create(&self, ctx: &RequestContext, candidate: &User) -> RepoResult<bool>;
    fn create_user(&self, ctx: &RequestContext, user: &User) -> RepoResult<()>;
    fn add_user_follower(
        &self,
        ctx: &RequestContext,
        follower: UserId,
        followed: UserId,
    ) -> RepoResult<()>;
    fn remove_user_follower(
        &self,
        ctx: &RequestContext,
        follower: UserId,
        followed: UserId,
    ) -> RepoResult<()>;
    fn add_source_follower(
        &self,
        ctx: &RequestContext,
        follower: UserId,
        followed: SourceId,
    ) -> RepoResult<()>;
    fn remove_source_follower(
        &self,
        ctx: &RequestContext,
        follower: UserId,
        followed: SourceId,
    ) -> RepoResult<()>;
    /// Cheap round trip proving the store answers.
    fn ping(&self, ctx: &RequestContext) -> RepoResult<()>;
}

/// SQL text for one follow mutation.
pub fn follow_statement(edge: FollowEdge, action: FollowAction) -> &'static str {
    match (edge, action) {
        (FollowEdge::User, FollowAction::Add) => ADD_USER_FOLLOWER_SQL,
        (FollowEdge::User, FollowAction::Remove) => REMOVE_USER_FOLLOWER_SQL,
        (FollowEdge::Source, FollowAction::Add) => ADD_SOURCE_FOLLOWER_SQL,
        (FollowEdge::Source, FollowAction::Remove) => REMOVE_SOURCE_FOLLOWER_SQL,
    }
}

/// SQLite-backed user repository.
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    db: Database,
}

impl SqliteUserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn find_user(&self, ctx: &RequestContext, lookup: UserLookup, key: &str) -> RepoResult<User> {
        ctx.check().map_err(|reason| RepoError::Cancelled {
            operation: lookup.operation(),
            key: key.to_string(),
            reason,
        })?;

        self.db.with_conn(|conn| {
            let _interrupt = InterruptGuard::install(conn, ctx);
            let lookup_failed = |source: rusqlite::Error| match ctx.check() {
                Err(reason) => RepoError::Cancelled {
                    operation: lookup.operation(),
                    key: key.to_string(),
                    reason,
                },
                Ok(()) => RepoError::Lookup {
                    lookup,
                    key: key.to_string(),
                    source,
                },
            };

            let mut stmt = conn
                .prepare(&format!(
                    "{USER_SELECT_SQL}\nWHERE {} = ?1;",
                    lookup.column()
                ))
                .map_err(lookup_failed)?;
            let mut rows = stmt.query([key]).map_err(lookup_failed)?;
            let found = match rows.next().map_err(lookup_failed)? {
                Some(row) => parse_user_row(row).map_err(|err| match err {
                    RepoError::Db(DbError::Sqlite(source)) => lookup_failed(source),
                    other => other,
                }),
                None => Err(RepoError::NotFound {
                    lookup,
                    key: key.to_string(),
                }),
            };
            found
        })
    }

    fn mutate_follow(
        &self,
        ctx: &RequestContext,
        edge: FollowEdge,
        action: FollowAction,
        follower: UserId,
        followed: Uuid,
    ) -> RepoResult<()> {
        let key = format!("{follower}->{followed}");
        let operation = match (edge, action) {
            (FollowEdge::User, FollowAction::Add) => "add_user_follower",
            (FollowEdge::User, FollowAction::Remove) => "remove_user_follower",
            (FollowEdge::Source, FollowAction::Add) => "add_source_follower",
            (FollowEdge::Source, FollowAction::Remove) => "remove_source_follower",
        };
        let scope = WriteScope {
            operation,
            key: key.as_str(),
        };

        let changed = self.db.with_conn(|conn| {
            execute_in_unit_of_work(
                conn,
                ctx,
                scope,
                follow_statement(edge, action),
                params![follower.to_string(), followed.to_string()],
            )
        })?;

        debug!(
            "event=follow_write module=repo status=ok edge={} action={} follower={} followed={} changed={}",
            edge.as_str(),
            action.as_str(),
            follower,
            followed,
            changed
        );
        Ok(())
    }
}

impl UserRepository for SqliteUserRepository {
    fn get_user_by_id(&self, ctx: &RequestContext, id: UserId) -> RepoResult<User> {
        self.find_user(ctx, UserLookup::Id, &id.to_string())
    }

    fn get_user_by_username(&self, ctx: &RequestContext, username: &str) -> RepoResult<User> {
        self.find_user(ctx, UserLookup::Username, username)
    }

    fn get_user_by_email(&self, ctx: &RequestContext, email: &str) -> RepoResult<User> {
        self.find_user(ctx, UserLookup::Email, email)
    }

    fn validate_for_create(&self, ctx: &RequestContext, candidate: &User) -> RepoResult<bool> {
        match self.get_user_by_email(ctx, &candidate.email) {
            Ok(_) => {
                debug!(
                    "event=user_validate module=repo status=rejected reason=email_exists candidate_id={}",
                    candidate.id
                );
                return Ok(false);
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        match self.get_user_by_username(ctx, &candidate.username) {
            Ok(_) => {
                debug!(
                    "event=user_validate module=repo status=rejected reason=username_exists candidate_id={}",
                    candidate.id
                );
                Ok(false)
            }
            Err(err) if err.is_not_found() => Ok(true),
            Err(err) => Err(err),
        }
    }

    fn create_user(&self, ctx: &RequestContext, user: &User) -> RepoResult<()> {
        let key = user.id.to_string();
        let scope = WriteScope {
            operation: "create_user",
            key: key.as_str(),
        };

        self.db.with_conn(|conn| {
            execute_in_unit_of_work(
                conn,
                ctx,
                scope,
                CREATE_USER_SQL,
                params![
                    key.as_str(),
                    user.username.as_str(),
                    user.email.as_str(),
                    user.hashed_password.as_str(),
                    user.created_by.to_string(),
                    user.created_at,
                    user.updated_by.map(|id| id.to_string()),
                    user.updated_at,
                ],
            )
        })?;

        info!("event=user_create module=repo status=ok user_id={}", user.id);
        Ok(())
    }

    fn add_user_follower(
        &self,
        ctx: &RequestContext,
        follower: UserId,
        followed: UserId,
    ) -> RepoResult<()> {
        self.mutate_follow(ctx, FollowEdge::User, FollowAction::Add, follower, followed)
    }

    fn remove_user_follower(
        &self,
        ctx: &RequestContext,
        follower: UserId,
        followed: UserId,
    ) -> RepoResult<()> {
        self.mutate_follow(ctx, FollowEdge::User, FollowAction::Remove, follower, followed)
    }

    fn add_source_follower(
        &self,
        ctx: &RequestContext,
        follower: UserId,
        followed: SourceId,
    ) -> RepoResult<()> {
        self.mutate_follow(ctx, FollowEdge::Source, FollowAction::Add, follower, followed)
    }

    fn remove_source_follower(
        &self,
        ctx: &RequestContext,
        follower: UserId,
        followed: SourceId,
    ) -> RepoResult<()> {
        self.mutate_follow(
            ctx,
            FollowEdge::Source,
            FollowAction::Remove,
            follower,
            followed,
        )
    }

    fn ping(&self, ctx: &RequestContext) -> RepoResult<()> {
        ctx.check().map_err(|reason| RepoError::Cancelled {
            operation: "ping",
            key: String::new(),
            reason,
        })?;
        self.db.with_conn(|conn| {
            conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))
                .map_err(DbError::from)?;
            Ok(())
        })
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let id = parse_stored_uuid(row.get("uuid").map_err(DbError::from)?, "users.uuid")?;
    let created_by = parse_stored_uuid(
        row.get("created_by_uuid").map_err(DbError::from)?,
        "users.created_by_uuid",
    )?;
    let updated_by = match row
        .get::<_, Option<String>>("updated_by_uuid")
        .map_err(DbError::from)?
    {
        Some(text) => Some(parse_stored_uuid(text, "users.updated_by_uuid")?),
        None => None,
    };

    Ok(User {
        id,
        username: row.get("username").map_err(DbError::from)?,
        email: row.get("email").map_err(DbError::from)?,
        hashed_password: row.get("hashed_password").map_err(DbError::from)?,
        created_by,
        created_at: row.get("created_at").map_err(DbError::from)?,
        updated_by,
        updated_at: row.get("updated_at").map_err(DbError::from)?,
    })
}

fn parse_stored_uuid(text: String, column: &'static str) -> RepoResult<Uuid> {
    parse_uuid_text(column, &text).map_err(|err| RepoError::InvalidData(err.to_string()))
}
