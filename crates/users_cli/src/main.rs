//! Users service command line entry point.
//!
//! # Responsibility
//! - Boot the store through the lifecycle, run one command, shut down.
//! - Print a single result line; failures go to stderr with their status.

mod cli;

use clap::Parser;
use cli::{Cli, Command, FollowArgs, FollowKind, LookupMode};
use log::{error, info};
use std::process::ExitCode;
use users_core::boot::BoxError;
use users_core::rpc::{
    CreateUserRequest, CredentialLookup, FollowRequest, FollowType, GetUserRequest,
    ValidateUserCredentialsRequest, WireUser,
};
use users_core::{
    hash_password, init_logging, register_database, Database, Lifecycle, RequestContext,
    ServiceConfig, ServiceError, SqliteUserRepository, UserService,
};
use uuid::Uuid;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String, BoxError> {
    let mut config = match cli.config.as_ref() {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(path) = cli.database {
        config.database.path = Some(path);
    }
    config.validate()?;
    init_logging(&config.logging.level, config.logging.dir.as_deref())?;

    let database = Database::new(config.database.clone());
    let mut lifecycle = Lifecycle::new();
    register_database(&mut lifecycle, &database);
    lifecycle.connect()?;
    info!(
        "event=cli_start module=cli status=ok core_version={}",
        users_core::core_version()
    );

    let service = UserService::new(SqliteUserRepository::new(database));
    let ctx = RequestContext::with_timeout(config.request_timeout());
    let outcome = execute(&service, &ctx, cli.command);

    for err in lifecycle.shutdown() {
        error!("event=cli_shutdown module=cli status=error error={err}");
    }
    outcome
}

fn execute(
    service: &UserService<SqliteUserRepository>,
    ctx: &RequestContext,
    command: Command,
) -> Result<String, BoxError> {
    match command {
        Command::Health => {
            service.health_check(ctx).map_err(with_status)?;
            Ok("ok".to_string())
        }
        Command::CreateUser {
            username,
            email,
            password,
        } => {
            let request = CreateUserRequest {
                username,
                email,
                hashed_password: hash_password(&password)?,
            };
            let response = service.create_user(ctx, &request).map_err(with_status)?;
            Ok(describe(&response.user))
        }
        Command::GetUser { uuid } => {
            let request = GetUserRequest {
                user_uuid: parse_id("uuid", &uuid)?,
            };
            let response = service.get_user(ctx, &request).map_err(with_status)?;
            Ok(describe(&response.user))
        }
        Command::Verify {
            lookup,
            value,
            password,
        } => {
            let request = match lookup {
                LookupMode::Email => ValidateUserCredentialsRequest {
                    lookup: CredentialLookup::Email,
                    email: value,
                    username: String::new(),
                    password,
                },
                LookupMode::Username => ValidateUserCredentialsRequest {
                    lookup: CredentialLookup::Username,
                    email: String::new(),
                    username: value,
                    password,
                },
            };
            let response = service
                .validate_user_credentials(ctx, &request)
                .map_err(with_status)?;
            Ok(match response.user {
                Some(user) => format!("valid={} {}", response.is_valid, describe(&user)),
                None => format!("valid={}", response.is_valid),
            })
        }
        Command::Follow(args) => {
            service
                .follow(ctx, &follow_request(&args)?)
                .map_err(with_status)?;
            Ok(format!(
                "followed {} {} -> {}",
                kind_name(args.kind),
                args.follower,
                args.followed
            ))
        }
        Command::Unfollow(args) => {
            service
                .unfollow(ctx, &follow_request(&args)?)
                .map_err(with_status)?;
            Ok(format!(
                "unfollowed {} {} -> {}",
                kind_name(args.kind),
                args.follower,
                args.followed
            ))
        }
    }
}

fn follow_request(args: &FollowArgs) -> Result<FollowRequest, BoxError> {
    Ok(FollowRequest {
        follower_uuid: parse_id("follower", &args.follower)?,
        followed_uuid: parse_id("followed", &args.followed)?,
        follow_type: match args.kind {
            FollowKind::User => FollowType::User,
            FollowKind::Source => FollowType::Source,
        },
    })
}

fn kind_name(kind: FollowKind) -> &'static str {
    match kind {
        FollowKind::User => "user",
        FollowKind::Source => "source",
    }
}

fn parse_id(field: &str, text: &str) -> Result<Vec<u8>, BoxError> {
    let id = Uuid::parse_str(text).map_err(|err| format!("{field} is not a uuid: {err}"))?;
    Ok(id.as_bytes().to_vec())
}

fn describe(user: &WireUser) -> String {
    let id = Uuid::from_slice(&user.uuid)
        .map(|id| id.to_string())
        .unwrap_or_else(|_| "<invalid>".to_string());
    format!(
        "id={id} username={} email={} created_at={}",
        user.username, user.email, user.audit_fields.created_at
    )
}

fn with_status(err: ServiceError) -> BoxError {
    format!("{}: {err}", err.code().as_str()).into()
}
