//! CLI argument definitions for the users binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Users service command line
#[derive(Parser, Debug)]
#[command(name = "users")]
#[command(about = "Create, look up, authenticate and follow users")]
#[command(version)]
pub struct Cli {
    /// JSON config file; built-in defaults when absent
    #[arg(short, long, env = "USERS_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite file, overriding `database.path` from the config
    #[arg(short = 'D', long, env = "USERS_DATABASE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the store answers
    Health,
    /// Create a user; the password is hashed before it leaves the CLI
    CreateUser {
        username: String,
        email: String,
        password: String,
    },
    /// Print one user by id
    GetUser { uuid: String },
    /// Check a password by email or username
    Verify {
        lookup: LookupMode,
        value: String,
        password: String,
    },
    /// Follow a user or a source
    Follow(FollowArgs),
    /// Remove a follow edge
    Unfollow(FollowArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LookupMode {
    Email,
    Username,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FollowKind {
    User,
    Source,
}

#[derive(clap::Args, Debug)]
pub struct FollowArgs {
    /// What is being followed
    pub kind: FollowKind,
    /// Id of the following user
    pub follower: String,
    /// Id of the followed user or source
    pub followed: String,
}
