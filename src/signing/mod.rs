//! Delegated link signing
//!
//! The object store is reached only through [`LinkSigner`]: given a catalog
//! [`Locator`] and a time-to-live it mints a credential that lets the client
//! fetch exactly that object directly from the store. Swapping storage
//! backends means providing another implementation.

mod s3;

pub use s3::{S3Config, S3Presigner, MAX_PRESIGN_TTL};

use crate::catalog::Locator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Signing errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("signing timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid link lifetime {0:?}")]
    InvalidTtl(Duration),

    #[error("signer configuration error: {0}")]
    Configuration(String),

    #[error("signer rejected request: {0}")]
    Rejected(String),
}

/// A time-boxed URL granting read access to one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedLink {
    pub url: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DelegatedLink {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Storage backend capability: mint delegated, read-only links
#[async_trait]
pub trait LinkSigner: Send + Sync {
    /// Produce a fresh link for `locator`, valid for `ttl`.
    ///
    /// Every call must return a newly minted credential.
    async fn sign(&self, locator: &Locator, ttl: Duration) -> Result<DelegatedLink, SigningError>;
}
