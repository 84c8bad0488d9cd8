//! User domain record.
//!
//! # Responsibility
//! - Define the persisted shape of an account.
//! - Hydrate a full record from a creation request.
//! - Convert a stored record into its wire shape.
//!
//! # Invariants
//! - `id` is immutable once created.
//! - A freshly hydrated user is its own creator and last updater.
//! - `hashed_password` never appears in `Debug` output.

use crate::rpc::{AuditFields, CreateUserRequest, WireUser};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an account.
pub type UserId = Uuid;

/// Stable identifier of a followed source. Sources live outside this store.
pub type SourceId = Uuid;

/// Identifier that could not be turned into a UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    WrongLength { field: &'static str, actual: usize },
    Malformed { field: &'static str, value: String },
}

impl Display for IdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongLength { field, actual } => {
                write!(f, "{field} must be 16 bytes, got {actual}")
            }
            Self::Malformed { field, value } => write!(f, "{field} is not a uuid: `{value}`"),
        }
    }
}

impl Error for IdError {}

/// Parses a raw 16-byte wire identifier.
pub fn parse_uuid_bytes(field: &'static str, bytes: &[u8]) -> Result<Uuid, IdError> {
    Uuid::from_slice(bytes).map_err(|_| IdError::WrongLength {
        field,
        actual: bytes.len(),
    })
}

/// Parses a hyphenated (or simple) textual identifier.
pub fn parse_uuid_text(field: &'static str, text: &str) -> Result<Uuid, IdError> {
    Uuid::parse_str(text).map_err(|_| IdError::Malformed {
        field,
        value: text.to_string(),
    })
}

/// Current wall clock as unix seconds.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Persisted account record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// PHC-formatted password hash.
    pub hashed_password: String,
    pub created_by: UserId,
    /// Unix seconds.
    pub created_at: i64,
    pub updated_by: Option<UserId>,
    /// Unix seconds.
    pub updated_at: Option<i64>,
}

impl User {
    /// Builds a persistable record for a new account.
    ///
    /// No actor identity reaches this layer, so the new id is stamped as both
    /// creator and updater, at `now`.
    pub fn hydrate_for_create(request: &CreateUserRequest, now: i64) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            username: request.username.clone(),
            email: request.email.clone(),
            hashed_password: request.hashed_password.clone(),
            created_by: id,
            created_at: now,
            updated_by: Some(id),
            updated_at: Some(now),
        }
    }

    pub fn to_wire(&self) -> WireUser {
        WireUser {
            uuid: self.id.as_bytes().to_vec(),
            username: self.username.clone(),
            email: self.email.clone(),
            hashed_password: self.hashed_password.clone(),
            audit_fields: AuditFields {
                created_by_uuid: self.created_by.as_bytes().to_vec(),
                created_at: self.created_at,
                updated_by_uuid: self.updated_by.map(|id| id.as_bytes().to_vec()),
                updated_at: self.updated_at,
            },
        }
    }

    /// Wire form with `hashed_password` left empty.
    pub fn to_wire_without_hash(&self) -> WireUser {
        WireUser {
            hashed_password: String::new(),
            ..self.to_wire()
        }
    }
}

impl Debug for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("hashed_password", &"<redacted>")
            .field("created_by", &self.created_by)
            .field("created_at", &self.created_at)
            .field("updated_by", &self.updated_by)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_uuid_bytes, parse_uuid_text, IdError, User};
    use crate::rpc::CreateUserRequest;
    use uuid::Uuid;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            username: "grace".to_string(),
            email: "grace@example.com".to_string(),
            hashed_password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        }
    }

    #[test]
    fn hydration_stamps_audit_fields_with_new_id() {
        let user = User::hydrate_for_create(&request(), 1_700_000_000);

        assert_eq!(user.created_by, user.id);
        assert_eq!(user.updated_by, Some(user.id));
        assert_eq!(user.created_at, 1_700_000_000);
        assert_eq!(user.updated_at, Some(1_700_000_000));
        assert_eq!(user.username, "grace");
        assert_ne!(user.id, Uuid::nil());
    }

    #[test]
    fn hydration_generates_distinct_ids() {
        let first = User::hydrate_for_create(&request(), 1);
        let second = User::hydrate_for_create(&request(), 1);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn wire_user_carries_raw_id_bytes() {
        let user = User::hydrate_for_create(&request(), 42);
        let wire = user.to_wire();

        assert_eq!(wire.uuid.len(), 16);
        assert_eq!(parse_uuid_bytes("uuid", &wire.uuid).unwrap(), user.id);
        assert_eq!(wire.audit_fields.created_by_uuid, user.id.as_bytes().to_vec());
        assert_eq!(wire.audit_fields.updated_at, Some(42));
    }

    #[test]
    fn malformed_identifiers_fail_without_panicking() {
        assert_eq!(
            parse_uuid_bytes("user_uuid", &[1, 2, 3]),
            Err(IdError::WrongLength {
                field: "user_uuid",
                actual: 3
            })
        );
        assert!(matches!(
            parse_uuid_text("uuid", "not-a-uuid"),
            Err(IdError::Malformed { field: "uuid", .. })
        ));
    }

    #[test]
    fn debug_output_redacts_hash() {
        let user = User::hydrate_for_create(&request(), 1);
        assert!(!format!("{user:?}").contains("argon2id"));
    }
}
