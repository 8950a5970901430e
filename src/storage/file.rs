//! JSON file token store
//!
//! The whole store is one pretty-printed JSON object, `{ "<code>": { "used": bool } }`,
//! rewritten in full after each mutation via write-temp-then-rename so readers
//! never observe a partial file. The in-memory table and the file are kept in
//! step under a single async mutex: a mutation is rolled back if its write fails.

use crate::auth::{AccessCode, Token, TokenRecord};
use crate::storage::{StorageError, StoreStats, TokenStore};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

type TokenTable = IndexMap<AccessCode, TokenRecord>;

/// File-backed token store
pub struct FileTokenStore {
    path: PathBuf,
    tokens: Mutex<TokenTable>,
}

impl FileTokenStore {
    /// Open an existing store. A missing, unreadable or malformed file is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let tokens = read_table(&path).await?;
        Ok(Self::loaded(path, tokens))
    }

    /// Open a store, starting empty if the file does not exist yet.
    ///
    /// Nothing is written until the first mutation. A file that exists but
    /// cannot be read or parsed is still an error.
    pub async fn open_or_create(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let tokens = match fs::metadata(&path).await {
            Ok(_) => read_table(&path).await?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Token store not found, starting empty");
                TokenTable::new()
            }
            Err(e) => {
                return Err(StorageError::Persistence(format!(
                    "cannot stat {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(Self::loaded(path, tokens))
    }

    fn loaded(path: PathBuf, tokens: TokenTable) -> Self {
        let used = tokens.values().filter(|r| r.used).count();
        info!(
            path = %path.display(),
            total = tokens.len(),
            used = used,
            "Token store loaded"
        );
        Self {
            path,
            tokens: Mutex::new(tokens),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, tokens: &TokenTable) -> Result<(), StorageError> {
        let content = serde_json::to_vec_pretty(tokens)
            .map_err(|e| StorageError::Persistence(e.to_string()))?;

        write_atomic(&self.path, &content).await.map_err(|e| {
            error!(path = %self.path.display(), error = %e, "Failed to persist token store");
            StorageError::Persistence(format!("{}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn issue(&self, count: usize) -> Result<Vec<Token>, StorageError> {
        let mut tokens = self.tokens.lock().await;
        let mut issued = Vec::with_capacity(count);

        while issued.len() < count {
            let code = AccessCode::generate();
            if tokens.contains_key(&code) {
                continue;
            }
            tokens.insert(code.clone(), TokenRecord::unused());
            issued.push(Token::fresh(code));
        }

        if let Err(e) = self.persist(&tokens).await {
            for token in &issued {
                tokens.shift_remove(&token.code);
            }
            return Err(e);
        }

        debug!(count = issued.len(), "Access codes issued");
        Ok(issued)
    }

    async fn exists(&self, code: &AccessCode) -> bool {
        self.tokens.lock().await.contains_key(code)
    }

    async fn consume(&self, code: &AccessCode) -> Result<(), StorageError> {
        // Held across the write: check, flip and persist form one critical section.
        let mut tokens = self.tokens.lock().await;

        match tokens.get_mut(code) {
            None => return Err(StorageError::NotFound),
            Some(record) if record.used => return Err(StorageError::AlreadyUsed),
            Some(record) => record.used = true,
        }

        if let Err(e) = self.persist(&tokens).await {
            if let Some(record) = tokens.get_mut(code) {
                record.used = false;
            }
            return Err(e);
        }

        Ok(())
    }

    async fn record(&self, code: &AccessCode) -> Option<TokenRecord> {
        self.tokens.lock().await.get(code).copied()
    }

    async fn stats(&self) -> StoreStats {
        let tokens = self.tokens.lock().await;
        StoreStats {
            total: tokens.len(),
            used: tokens.values().filter(|r| r.used).count(),
        }
    }
}

async fn read_table(path: &Path) -> Result<TokenTable, StorageError> {
    let content = fs::read(path).await.map_err(|e| {
        StorageError::Persistence(format!("cannot read {}: {}", path.display(), e))
    })?;

    serde_json::from_slice(&content)
        .map_err(|e| StorageError::Corrupt(format!("{}: {}", path.display(), e)))
}

/// Write data to a file atomically by writing to a sibling temporary file and renaming
async fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tokens".to_string());
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    let result = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&temp_path).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_issue_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otps.json");

        let store = FileTokenStore::open_or_create(&path).await.unwrap();
        let issued = store.issue(3).await.unwrap();

        let reopened = FileTokenStore::open(&path).await.unwrap();
        for token in &issued {
            assert_eq!(
                reopened.record(&token.code).await,
                Some(TokenRecord::unused())
            );
        }
        assert_eq!(reopened.stats().await.total, 3);
    }

    #[tokio::test]
    async fn test_consume_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otps.json");

        let store = FileTokenStore::open_or_create(&path).await.unwrap();
        let code = store.issue(1).await.unwrap().remove(0).code;
        store.consume(&code).await.unwrap();

        let reopened = FileTokenStore::open(&path).await.unwrap();
        assert_eq!(reopened.record(&code).await, Some(TokenRecord { used: true }));
        assert_eq!(reopened.consume(&code).await, Err(StorageError::AlreadyUsed));
    }

    #[tokio::test]
    async fn test_reads_existing_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otps.json");
        std::fs::write(
            &path,
            r#"{
  "3f1c9a52-7d0e-4c55-9b1e-2a6f0c8d4e71": { "used": false },
  "b7e2d0c4-1a9f-4e38-8c65-5d4b3a2f1e09": { "used": true }
}"#,
        )
        .unwrap();

        let store = FileTokenStore::open(&path).await.unwrap();
        let stats = store.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.used, 1);

        let fresh = AccessCode::parse("3f1c9a52-7d0e-4c55-9b1e-2a6f0c8d4e71").unwrap();
        store.consume(&fresh).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["3f1c9a52-7d0e-4c55-9b1e-2a6f0c8d4e71"]["used"], true);
        assert!(written.contains('\n'), "store should stay human-readable");
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = FileTokenStore::open(dir.path().join("missing.json")).await;
        assert!(matches!(result, Err(StorageError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_open_corrupt_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otps.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            FileTokenStore::open(&path).await,
            Err(StorageError::Corrupt(_))
        ));
        assert!(matches!(
            FileTokenStore::open_or_create(&path).await,
            Err(StorageError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otps.json");

        let store = FileTokenStore::open_or_create(&path).await.unwrap();
        let code = store.issue(1).await.unwrap().remove(0).code;

        // Removing the directory makes the next write fail
        drop(dir);

        let result = store.consume(&code).await;
        assert!(matches!(result, Err(StorageError::Persistence(_))));
        assert_eq!(store.record(&code).await, Some(TokenRecord::unused()));

        let result = store.issue(2).await;
        assert!(matches!(result, Err(StorageError::Persistence(_))));
        assert_eq!(store.stats().await.total, 1);
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otps.json");

        let store = FileTokenStore::open_or_create(&path).await.unwrap();
        store.issue(5).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["otps.json".to_string()]);
    }
}
