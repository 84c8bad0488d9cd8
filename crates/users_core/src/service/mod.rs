//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the users service operations.
//! - Validate request input and map outcomes to wire responses and the
//!   status taxonomy.
//!
//! # Invariants
//! - Services hold no state besides their injected repository.
//! - Malformed input is rejected before any store access.

pub mod credentials;
pub mod error;
pub mod user_service;
