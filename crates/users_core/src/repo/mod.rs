//! Repository layer contracts and SQLite implementation.
//!
//! # Responsibility
//! - Define the data access contract the service layer depends on.
//! - Isolate SQL text, statement preparation and transactions from business
//!   orchestration.
//!
//! # Invariants
//! - Every write runs in its own unit of work and is atomic.
//! - Repository errors carry the operation and key that triggered them.
//! - Repository code knows nothing about wire types.

mod unit_of_work;
pub mod user_repo;
