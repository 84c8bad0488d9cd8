//! User use-case service.
//!
//! # Responsibility
//! - Serve the users contract: lookup, creation, credential checks and
//!   follow-graph mutation.
//! - Translate repository outcomes into wire responses and `ServiceError`.
//!
//! # Invariants
//! - Identifier and type validation happens before any repository call.
//! - Duplicate-user rejections never reveal whether the email or the
//!   username collided.
//! - A credential mismatch is a normal response, not an error.
//! - Credential responses never echo the stored password hash.

use crate::context::RequestContext;
use crate::model::follow::{FollowAction, FollowEdge};
use crate::model::user::{now_unix, parse_uuid_bytes, IdError, User};
use crate::repo::user_repo::{RepoError, UserRepository};
use crate::rpc::{
    CreateUserRequest, CreateUserResponse, CredentialLookup, DeleteUserRequest,
    DeleteUserResponse, FollowRequest, FollowResponse, GetUserRequest, GetUserResponse,
    UpdateUserRequest, UpdateUserResponse, UsersApi, ValidateUserCredentialsRequest,
    ValidateUserCredentialsResponse,
};
use crate::service::credentials::{is_password_hash, verify_password};
use crate::service::error::ServiceError;
use log::{info, warn};

const USER_EXISTS_MESSAGE: &str = "user already exists by email or username";

/// Users service over an injected repository.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Gets one user by its raw 16-byte id.
    pub fn get_user(
        &self,
        ctx: &RequestContext,
        request: &GetUserRequest,
    ) -> Result<GetUserResponse, ServiceError> {
        let id = parse_uuid_bytes("user_uuid", &request.user_uuid).map_err(invalid_id)?;
        let user = self
            .repo
            .get_user_by_id(ctx, id)
            .map_err(|err| lookup_failure("failed to get user", err))?;
        Ok(GetUserResponse {
            user: user.to_wire(),
        })
    }

    /// Hydrates, checks uniqueness, persists and returns the new user.
    pub fn create_user(
        &self,
        ctx: &RequestContext,
        request: &CreateUserRequest,
    ) -> Result<CreateUserResponse, ServiceError> {
        validate_create_request(request)?;
        let user = User::hydrate_for_create(request, now_unix());

        match self.repo.validate_for_create(ctx, &user) {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    "event=user_create module=service status=rejected reason=already_exists candidate_id={}",
                    user.id
                );
                return Err(ServiceError::InvalidArgument(USER_EXISTS_MESSAGE.to_string()));
            }
            Err(err) => return Err(internal("failed to validate user for create", err)),
        }

        match self.repo.create_user(ctx, &user) {
            Ok(()) => {}
            // Lost a race with a concurrent create for the same email/username.
            Err(err) if err.is_conflict() => {
                info!(
                    "event=user_create module=service status=rejected reason=constraint candidate_id={}",
                    user.id
                );
                return Err(ServiceError::InvalidArgument(USER_EXISTS_MESSAGE.to_string()));
            }
            Err(err) => return Err(internal("failed to create user", err)),
        }

        info!("event=user_create module=service status=ok user_id={}", user.id);
        Ok(CreateUserResponse {
            user: user.to_wire(),
        })
    }

    pub fn update_user(
        &self,
        _ctx: &RequestContext,
        _request: &UpdateUserRequest,
    ) -> Result<UpdateUserResponse, ServiceError> {
        Err(ServiceError::Unimplemented("UpdateUser"))
    }

    pub fn delete_user(
        &self,
        _ctx: &RequestContext,
        _request: &DeleteUserRequest,
    ) -> Result<DeleteUserResponse, ServiceError> {
        Err(ServiceError::Unimplemented("DeleteUser"))
    }

    /// Checks a plaintext password against the stored hash.
    ///
    /// # Contract
    /// - Exactly one lookup mode must be selected.
    /// - Mismatch: `is_valid = false` with the wire user, no error.
    /// - Match: `is_valid = true` with the wire user.
    /// - The returned user never carries the stored hash.
    pub fn validate_user_credentials(
        &self,
        ctx: &RequestContext,
        request: &ValidateUserCredentialsRequest,
    ) -> Result<ValidateUserCredentialsResponse, ServiceError> {
        let lookup = match request.lookup {
            CredentialLookup::Email => {
                require_non_empty("email", &request.email)?;
                self.repo.get_user_by_email(ctx, &request.email)
            }
            CredentialLookup::Username => {
                require_non_empty("username", &request.username)?;
                self.repo.get_user_by_username(ctx, &request.username)
            }
            CredentialLookup::Unspecified => {
                return Err(ServiceError::InvalidArgument(
                    "credential lookup must select email or username".to_string(),
                ));
            }
        };
        let user = lookup.map_err(|err| lookup_failure("failed to get user for credentials", err))?;

        let is_valid = verify_password(&request.password, &user.hashed_password).map_err(
            |source| {
                warn!(
                    "event=credentials_check module=service status=error user_id={} error_code=bad_stored_hash",
                    user.id
                );
                ServiceError::Credential {
                    context: "failed to verify credentials",
                    source,
                }
            },
        )?;

        info!(
            "event=credentials_check module=service status=ok user_id={} valid={}",
            user.id, is_valid
        );
        Ok(ValidateUserCredentialsResponse {
            user: Some(user.to_wire_without_hash()),
            is_valid,
        })
    }

    pub fn follow(
        &self,
        ctx: &RequestContext,
        request: &FollowRequest,
    ) -> Result<FollowResponse, ServiceError> {
        self.mutate_follow(ctx, request, FollowAction::Add)
    }

    pub fn unfollow(
        &self,
        ctx: &RequestContext,
        request: &FollowRequest,
    ) -> Result<FollowResponse, ServiceError> {
        self.mutate_follow(ctx, request, FollowAction::Remove)
    }

    pub fn health_check(&self, ctx: &RequestContext) -> Result<(), ServiceError> {
        self.repo
            .ping(ctx)
            .map_err(|err| internal("health check failed", err))
    }

    fn mutate_follow(
        &self,
        ctx: &RequestContext,
        request: &FollowRequest,
        action: FollowAction,
    ) -> Result<FollowResponse, ServiceError> {
        let follower =
            parse_uuid_bytes("follower_uuid", &request.follower_uuid).map_err(invalid_id)?;
        let followed =
            parse_uuid_bytes("followed_uuid", &request.followed_uuid).map_err(invalid_id)?;
        let edge = FollowEdge::from_wire(request.follow_type).ok_or_else(|| {
            ServiceError::InvalidArgument("follow type must be user or source".to_string())
        })?;

        edge.apply(&self.repo, ctx, action, follower, followed)
            .map_err(|err| {
                internal(
                    match action {
                        FollowAction::Add => "failed to follow",
                        FollowAction::Remove => "failed to unfollow",
                    },
                    err,
                )
            })?;

        info!(
            "event=follow module=service status=ok edge={} action={} follower={} followed={}",
            edge.as_str(),
            action.as_str(),
            follower,
            followed
        );
        Ok(FollowResponse {})
    }
}

impl<R: UserRepository> UsersApi for UserService<R> {
    fn get_user(
        &self,
        ctx: &RequestContext,
        request: &GetUserRequest,
    ) -> Result<GetUserResponse, ServiceError> {
        UserService::get_user(self, ctx, request)
    }

    fn create_user(
        &self,
        ctx: &RequestContext,
        request: &CreateUserRequest,
    ) -> Result<CreateUserResponse, ServiceError> {
        UserService::create_user(self, ctx, request)
    }

    fn update_user(
        &self,
        ctx: &RequestContext,
        request: &UpdateUserRequest,
    ) -> Result<UpdateUserResponse, ServiceError> {
        UserService::update_user(self, ctx, request)
    }

    fn delete_user(
        &self,
        ctx: &RequestContext,
        request: &DeleteUserRequest,
    ) -> Result<DeleteUserResponse, ServiceError> {
        UserService::delete_user(self, ctx, request)
    }

    fn follow(
        &self,
        ctx: &RequestContext,
        request: &FollowRequest,
    ) -> Result<FollowResponse, ServiceError> {
        UserService::follow(self, ctx, request)
    }

    fn unfollow(
        &self,
        ctx: &RequestContext,
        request: &FollowRequest,
    ) -> Result<FollowResponse, ServiceError> {
        UserService::unfollow(self, ctx, request)
    }

    fn validate_user_credentials(
        &self,
        ctx: &RequestContext,
        request: &ValidateUserCredentialsRequest,
    ) -> Result<ValidateUserCredentialsResponse, ServiceError> {
        UserService::validate_user_credentials(self, ctx, request)
    }

    fn health_check(&self, ctx: &RequestContext) -> Result<(), ServiceError> {
        UserService::health_check(self, ctx)
    }
}

fn validate_create_request(request: &CreateUserRequest) -> Result<(), ServiceError> {
    require_non_empty("username", &request.username)?;
    require_non_empty("email", &request.email)?;
    if !is_password_hash(&request.hashed_password) {
        return Err(ServiceError::InvalidArgument(
            "hashed_password must be a PHC password hash".to_string(),
        ));
    }
    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::InvalidArgument(format!(
            "{field} cannot be empty"
        )));
    }
    Ok(())
}

fn invalid_id(err: IdError) -> ServiceError {
    ServiceError::InvalidArgument(err.to_string())
}

fn lookup_failure(context: &'static str, err: RepoError) -> ServiceError {
    if err.is_not_found() {
        return ServiceError::NotFound("user not found".to_string());
    }
    internal(context, err)
}

fn internal(context: &'static str, err: RepoError) -> ServiceError {
    warn!(
        "event=service_failure module=service status=error context=\"{}\" error_code={}",
        context,
        err.code()
    );
    ServiceError::Repo {
        context,
        source: err,
    }
}
