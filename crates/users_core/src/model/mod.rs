//! Domain records for accounts and the follow graph.
//!
//! # Responsibility
//! - Define the persistable user record and its hydration/wire conversion.
//! - Define follow-edge kinds and the one place they bind to repository
//!   operations.
//!
//! # Invariants
//! - Every user is identified by a stable `UserId` that is never reused.
//! - Follow edges are plain (follower, followed) pairs without metadata.

pub mod follow;
pub mod user;
