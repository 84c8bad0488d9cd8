//! Service error taxonomy.
//!
//! Every variant maps to exactly one wire [`StatusCode`]. Store details stay
//! reachable through `Error::source` for diagnostics but never appear in the
//! caller-facing message.

use crate::repo::user_repo::RepoError;
use crate::rpc::StatusCode;
use crate::service::credentials::CredentialError;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ServiceError {
    /// Malformed input or failed business validation.
    InvalidArgument(String),
    NotFound(String),
    /// Operation exists in the contract but has no implementation.
    Unimplemented(&'static str),
    /// Store or transaction failure.
    Repo {
        context: &'static str,
        source: RepoError,
    },
    /// A stored credential could not be checked.
    Credential {
        context: &'static str,
        source: CredentialError,
    },
}

impl ServiceError {
    pub fn code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::Unimplemented(_) => StatusCode::InvalidArgument,
            Self::NotFound(_) => StatusCode::NotFound,
            Self::Repo { .. } | Self::Credential { .. } => StatusCode::Internal,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) | Self::NotFound(message) => write!(f, "{message}"),
            Self::Unimplemented(operation) => write!(f, "{operation} is unimplemented"),
            Self::Repo { context, .. } | Self::Credential { context, .. } => {
                write!(f, "{context}")
            }
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo { source, .. } => Some(source),
            Self::Credential { source, .. } => Some(source),
            Self::InvalidArgument(_) | Self::NotFound(_) | Self::Unimplemented(_) => None,
        }
    }
}
