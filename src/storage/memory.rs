//! In-memory token store

use crate::auth::{AccessCode, Token, TokenRecord};
use crate::storage::{StorageError, StoreStats, TokenStore};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Token store that lives only as long as the process
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<IndexMap<AccessCode, TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with known records
    pub fn with_records(records: impl IntoIterator<Item = (AccessCode, TokenRecord)>) -> Self {
        Self {
            tokens: Mutex::new(records.into_iter().collect()),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn issue(&self, count: usize) -> Result<Vec<Token>, StorageError> {
        let mut tokens = self.tokens.lock();
        let mut issued = Vec::with_capacity(count);

        while issued.len() < count {
            let code = AccessCode::generate();
            if tokens.contains_key(&code) {
                continue;
            }
            tokens.insert(code.clone(), TokenRecord::unused());
            issued.push(Token::fresh(code));
        }

        Ok(issued)
    }

    async fn exists(&self, code: &AccessCode) -> bool {
        self.tokens.lock().contains_key(code)
    }

    async fn consume(&self, code: &AccessCode) -> Result<(), StorageError> {
        let mut tokens = self.tokens.lock();
        let record = tokens.get_mut(code).ok_or(StorageError::NotFound)?;
        if record.used {
            return Err(StorageError::AlreadyUsed);
        }
        record.used = true;
        Ok(())
    }

    async fn record(&self, code: &AccessCode) -> Option<TokenRecord> {
        self.tokens.lock().get(code).copied()
    }

    async fn stats(&self) -> StoreStats {
        let tokens = self.tokens.lock();
        StoreStats {
            total: tokens.len(),
            used: tokens.values().filter(|r| r.used).count(),
        }
    }
}
