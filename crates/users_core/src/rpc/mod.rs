//! Request/response contract consumed by the transport layer.
//!
//! # Responsibility
//! - Define wire-shaped records and request/response envelopes for the
//!   `UsersService` methods.
//! - Define the status codes every failed call is tagged with.
//! - Define [`UsersApi`], the seam a transport adapter binds to.
//!
//! # Invariants
//! - Identifiers on the wire are raw 16-byte UUIDs.
//! - This module carries no storage or business logic.

use crate::context::RequestContext;
use crate::service::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

/// Error category attached to every failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Malformed identifiers, failed validation, unimplemented operation.
    InvalidArgument,
    /// Lookup miss.
    NotFound,
    /// Store or transaction failure, including rollback failure.
    Internal,
}

impl StatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }
}

/// Creation/update audit metadata in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_by_uuid: Vec<u8>,
    /// Unix seconds.
    pub created_at: i64,
    pub updated_by_uuid: Option<Vec<u8>>,
    /// Unix seconds.
    pub updated_at: Option<i64>,
}

/// Outbound user record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireUser {
    pub uuid: Vec<u8>,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub audit_fields: AuditFields,
}

impl Debug for WireUser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireUser")
            .field("uuid", &self.uuid)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("hashed_password", &"<redacted>")
            .field("audit_fields", &self.audit_fields)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserRequest {
    pub user_uuid: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserResponse {
    pub user: WireUser,
}

/// Inbound creation request; the password arrives already hashed (PHC string).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
}

impl Debug for CreateUserRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateUserRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("hashed_password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub user: WireUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub user: WireUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserResponse {
    pub user: WireUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteUserRequest {
    pub user_uuid: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteUserResponse {}

/// Which edge relation a follow/unfollow request targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowType {
    /// Missing or unrecognized on the wire; always rejected.
    #[default]
    Unspecified,
    User,
    Source,
}

/// Shared by `Follow` and `UnFollow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowRequest {
    pub follower_uuid: Vec<u8>,
    pub followed_uuid: Vec<u8>,
    #[serde(default)]
    pub follow_type: FollowType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowResponse {}

/// Field used to find the account whose credentials are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialLookup {
    #[default]
    Unspecified,
    Email,
    Username,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateUserCredentialsRequest {
    #[serde(default)]
    pub lookup: CredentialLookup,
    pub email: String,
    pub username: String,
    /// Plaintext candidate password.
    pub password: String,
}

impl Debug for ValidateUserCredentialsRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidateUserCredentialsRequest")
            .field("lookup", &self.lookup)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Outcome of a credential check. `user` is the account that was checked,
/// with `hashed_password` left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateUserCredentialsResponse {
    pub user: Option<WireUser>,
    pub is_valid: bool,
}

/// Service surface a transport adapter dispatches into.
pub trait UsersApi {
    fn get_user(
        &self,
        ctx: &RequestContext,
        request: &GetUserRequest,
    ) -> Result<GetUserResponse, ServiceError>;
    fn create_user(
        &self,
        ctx: &RequestContext,
        request: &CreateUserRequest,
    ) -> Result<CreateUserResponse, ServiceError>;
    fn update_user(
        &self,
        ctx: &RequestContext,
        request: &UpdateUserRequest,
    ) -> Result<UpdateUserResponse, ServiceError>;
    fn delete_user(
        &self,
        ctx: &RequestContext,
        request: &DeleteUserRequest,
    ) -> Result<DeleteUserResponse, ServiceError>;
    fn follow(
        &self,
        ctx: &RequestContext,
        request: &FollowRequest,
    ) -> Result<FollowResponse, ServiceError>;
    fn unfollow(
        &self,
        ctx: &RequestContext,
        request: &FollowRequest,
    ) -> Result<FollowResponse, ServiceError>;
    fn validate_user_credentials(
        &self,
        ctx: &RequestContext,
        request: &ValidateUserCredentialsRequest,
    ) -> Result<ValidateUserCredentialsResponse, ServiceError>;
    fn health_check(&self, ctx: &RequestContext) -> Result<(), ServiceError>;
}
