//! Caller-facing error taxonomy.

use crate::model::object::GroupVersionResource;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ApiResult<T> = Result<T, ApiError>;

/// Coarse error class a transport maps onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    /// Fix the payload.
    Invalid,
    /// Retry with a different name.
    AlreadyExists,
    /// Object or resource type does not exist.
    NotFound,
    /// Lost an optimistic-concurrency or name-generation race; retry.
    Conflict,
    Cancelled,
    Internal,
}

impl ErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::AlreadyExists => "AlreadyExists",
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::Cancelled => "Cancelled",
            Self::Internal => "InternalError",
        }
    }

    /// HTTP-equivalent status code.
    pub fn status_code(self) -> u16 {
        match self {
            Self::Invalid => 422,
            Self::AlreadyExists | Self::Conflict => 409,
            Self::NotFound => 404,
            Self::Cancelled => 499,
            Self::Internal => 500,
        }
    }
}

impl Display for ErrorReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by `ResourceApiServer` operations.
#[derive(Debug)]
pub enum ApiError {
    /// No collection registered for the requested group/version/resource.
    ResourceNotRegistered(GroupVersionResource),
    /// The caller abandoned the request before it reached the store.
    Cancelled,
    Store {
        gvr: GroupVersionResource,
        source: StoreError,
    },
}

impl ApiError {
    pub fn reason(&self) -> ErrorReason {
        match self {
            Self::ResourceNotRegistered(_) => ErrorReason::NotFound,
            Self::Cancelled => ErrorReason::Cancelled,
            Self::Store { source, .. } => match source {
                StoreError::Invalid(_) => ErrorReason::Invalid,
                StoreError::AlreadyExists { .. } => ErrorReason::AlreadyExists,
                StoreError::NotFound { .. } => ErrorReason::NotFound,
                StoreError::NameGenerationExhausted(_) | StoreError::Conflict { .. } => {
                    ErrorReason::Conflict
                }
                StoreError::Db(_) | StoreError::InvalidData(_) | StoreError::LockPoisoned => {
                    ErrorReason::Internal
                }
            },
        }
    }

    pub fn status_code(&self) -> u16 {
        self.reason().status_code()
    }

    pub fn is_not_found(&self) -> bool {
        self.reason() == ErrorReason::NotFound
    }

    /// Underlying store error, if the failure came from a collection.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store { source, .. } => Some(source),
            Self::ResourceNotRegistered(_) | Self::Cancelled => None,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResourceNotRegistered(gvr) => {
                write!(f, "{}: resource type {gvr} is not registered", self.reason())
            }
            Self::Cancelled => write!(f, "{}: request cancelled", self.reason()),
            Self::Store { gvr, source } => write!(f, "{}: {gvr}: {source}", self.reason()),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store { source, .. } => Some(source),
            Self::ResourceNotRegistered(_) | Self::Cancelled => None,
        }
    }
}
