//! Access errors

use crate::catalog::{CatalogError, NameError};
use crate::signing::SigningError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by redemption, listing and link issuance
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// Missing or malformed input
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown group or item
    #[error("not found: {0}")]
    NotFound(String),

    /// Access code was never issued
    #[error("invalid access code")]
    InvalidToken,

    /// Access code was already redeemed
    #[error("access code already used")]
    AlreadyUsed,

    /// Session does not hold the required grant
    #[error("unauthorized")]
    Unauthorized,

    /// Storage backend failed or timed out while signing; safe to retry
    #[error("upstream signing error: {0}")]
    UpstreamSigning(String),

    /// Token store could not be read or written
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl AccessError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::InvalidToken => 401,
            Self::Unauthorized => 403,
            Self::NotFound(_) => 404,
            Self::AlreadyUsed => 409,
            Self::Persistence(_) => 500,
            Self::UpstreamSigning(_) => 502,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::AlreadyUsed => "ALREADY_USED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::UpstreamSigning(_) => "UPSTREAM_SIGNING_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Message shown to the end user
    pub fn denial_message(&self) -> String {
        match self {
            Self::Validation(detail) => format!("Invalid request: {}.", detail),
            Self::NotFound(detail) => format!("Not found: {}.", detail),
            Self::InvalidToken => "Invalid code.".to_string(),
            Self::AlreadyUsed => "This code has already been used.".to_string(),
            Self::Unauthorized => {
                "Access denied. You need a valid code to download from this folder.".to_string()
            }
            Self::UpstreamSigning(_) => {
                "Error generating download link. Please try again.".to_string()
            }
            Self::Persistence(_) => "Internal error. Please try again later.".to_string(),
        }
    }

    /// Whether the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamSigning(_))
    }
}

impl From<NameError> for AccessError {
    fn from(err: NameError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CatalogError> for AccessError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownGroup(_) | CatalogError::UnknownItem { .. } => {
                Self::NotFound(err.to_string())
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<StorageError> for AccessError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::InvalidToken,
            StorageError::AlreadyUsed => Self::AlreadyUsed,
            StorageError::Persistence(msg) | StorageError::Corrupt(msg) => Self::Persistence(msg),
        }
    }
}

impl From<SigningError> for AccessError {
    fn from(err: SigningError) -> Self {
        Self::UpstreamSigning(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        assert_eq!(AccessError::Validation("x".into()).status_code(), 400);
        assert_eq!(AccessError::InvalidToken.status_code(), 401);
        assert_eq!(AccessError::Unauthorized.status_code(), 403);
        assert_eq!(AccessError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AccessError::AlreadyUsed.status_code(), 409);
        assert_eq!(AccessError::UpstreamSigning("x".into()).status_code(), 502);
        assert_eq!(AccessError::Persistence("x".into()).status_code(), 500);
    }

    #[test]
    fn test_storage_mapping() {
        assert_eq!(AccessError::from(StorageError::NotFound), AccessError::InvalidToken);
        assert_eq!(AccessError::from(StorageError::AlreadyUsed), AccessError::AlreadyUsed);
        assert!(matches!(
            AccessError::from(StorageError::Corrupt("bad".into())),
            AccessError::Persistence(_)
        ));
    }

    #[test]
    fn test_catalog_mapping() {
        let err = AccessError::from(CatalogError::UnknownGroup("G".into()));
        assert!(matches!(err, AccessError::NotFound(_)));
    }

    #[test]
    fn test_only_signing_is_retryable() {
        let err = AccessError::from(SigningError::Timeout(Duration::from_secs(5)));
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "UPSTREAM_SIGNING_ERROR");
        assert!(!AccessError::AlreadyUsed.is_retryable());
    }
}
