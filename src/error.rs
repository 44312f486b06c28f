//! Error types for registry and topology operations

use std::fmt;

use crate::entity::EntityId;
use crate::storage::StorageError;
use crate::topology::Rejection;

/// Result type alias for state operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors surfaced by [`NetworkState`](crate::state::NetworkState) operations
#[derive(Debug)]
pub enum NetworkError {
    /// An entity field failed validation (surfaced to the user)
    Validation { field: &'static str, reason: String },

    /// No entity with this id is registered
    NotFound(EntityId),

    /// A topology action was declined because it would break an invariant
    Rejected(Rejection),

    /// Reading or writing the measurement log failed
    Storage(StorageError),
}

impl NetworkError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        NetworkError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Validation { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
            NetworkError::NotFound(id) => write!(f, "server with id {} not found", id),
            NetworkError::Rejected(rejection) => write!(f, "action declined: {}", rejection),
            NetworkError::Storage(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetworkError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Rejection> for NetworkError {
    fn from(rejection: Rejection) -> Self {
        NetworkError::Rejected(rejection)
    }
}

impl From<StorageError> for NetworkError {
    fn from(err: StorageError) -> Self {
        NetworkError::Storage(err)
    }
}
