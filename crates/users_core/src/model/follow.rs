//! Follow-edge kinds and their binding to repository operations.
//!
//! # Invariants
//! - `FollowEdge::apply` is the only place a (kind, action) pair is turned
//!   into a repository call.
//! - An unspecified wire type never maps to an edge kind.

use crate::context::RequestContext;
use crate::model::user::UserId;
use crate::repo::user_repo::{RepoResult, UserRepository};
use crate::rpc::FollowType;
use uuid::Uuid;

/// Which relation an edge lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FollowEdge {
    /// user -> user, stored in `user_user_follows`.
    User,
    /// user -> source, stored in `user_source_follows`.
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FollowAction {
    Add,
    Remove,
}

impl FollowEdge {
    /// Maps the wire type to an edge kind; `Unspecified` has none.
    pub fn from_wire(follow_type: FollowType) -> Option<Self> {
        match follow_type {
            FollowType::User => Some(Self::User),
            FollowType::Source => Some(Self::Source),
            FollowType::Unspecified => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Source => "source",
        }
    }

    pub fn apply<R: UserRepository + ?Sized>(
        self,
        repo: &R,
        ctx: &RequestContext,
        action: FollowAction,
        follower: UserId,
        followed: Uuid,
    ) -> RepoResult<()> {
        match (self, action) {
            (Self::User, FollowAction::Add) => repo.add_user_follower(ctx, follower, followed),
            (Self::User, FollowAction::Remove) => {
                repo.remove_user_follower(ctx, follower, followed)
            }
            (Self::Source, FollowAction::Add) => repo.add_source_follower(ctx, follower, followed),
            (Self::Source, FollowAction::Remove) => {
                repo.remove_source_follower(ctx, follower, followed)
            }
        }
    }
}

impl FollowAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}
