//! Token storage backends
//!
//! - File: JSON document rewritten atomically on every mutation (the default)
//! - Memory: process-local store, for tests and ephemeral setups

mod file;
mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

use crate::auth::{AccessCode, Token, TokenRecord};
pub use async_trait::async_trait;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("access code not found")]
    NotFound,

    #[error("access code already used")]
    AlreadyUsed,

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("corrupt token store: {0}")]
    Corrupt(String),
}

/// Counts for operator output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub used: usize,
}

impl StoreStats {
    pub fn unused(&self) -> usize {
        self.total - self.used
    }
}

/// Trait for access code storage
///
/// Implementations must make `consume` linearizable per code: of any number of
/// concurrent calls for the same code, at most one returns `Ok`, and a change is
/// only reported once it is durable.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Issue `count` fresh, unused codes and persist them before returning
    async fn issue(&self, count: usize) -> Result<Vec<Token>, StorageError>;

    /// Check if a code was ever issued
    async fn exists(&self, code: &AccessCode) -> bool;

    /// Atomically mark a code as used
    async fn consume(&self, code: &AccessCode) -> Result<(), StorageError>;

    /// Current state of a code
    async fn record(&self, code: &AccessCode) -> Option<TokenRecord>;

    /// Total and used counts
    async fn stats(&self) -> StoreStats;
}
