//! Core of the users service: account storage, credential checks and the
//! user/source follow graph.
//! Transport adapters bind to [`UsersApi`]; everything below it lives here.

pub mod boot;
pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod rpc;
pub mod service;

pub use boot::{register_database, BootError, Lifecycle};
pub use config::{ConfigError, DatabaseConfig, LoggingConfig, ServiceConfig};
pub use context::{ContextError, RequestContext};
pub use db::{Database, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::follow::{FollowAction, FollowEdge};
pub use model::user::{IdError, SourceId, User, UserId};
pub use repo::user_repo::{
    follow_statement, RepoError, RepoResult, SqliteUserRepository, TxStep, UserLookup,
    UserRepository,
};
pub use rpc::{StatusCode, UsersApi};
pub use service::credentials::{hash_password, verify_password, CredentialError};
pub use service::error::ServiceError;
pub use service::user_service::UserService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
