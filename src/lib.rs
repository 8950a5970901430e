//! Lockbox - one-time codes that unlock groups of files in an object store
//!
//! A client redeems a single-use access code to unlock a named group of files
//! for the rest of its session, then fetches each file through a short-lived
//! presigned link minted by the storage backend.

pub mod access;
pub mod auth;
pub mod catalog;
pub mod server;
pub mod signing;
pub mod storage;

pub use access::{AccessError, LinkIssuer, RedemptionService};
pub use auth::{AccessCode, GrantSet, Session, SessionAuthority, SessionId, SessionKey, Token};
pub use catalog::{GroupName, ItemName, Locator, ResourceCatalog};
pub use server::{LockboxServer, LockboxServerConfig};
pub use signing::{DelegatedLink, LinkSigner, S3Config, S3Presigner};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore};
