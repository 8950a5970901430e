//! Access codes and session authorization
//!
//! - `tokens`: single-use access codes and their persisted record
//! - `grants`: the set of groups a session has unlocked
//! - `sessions`: session lifecycle and signed session handles

mod grants;
mod sessions;
mod tokens;

pub use grants::GrantSet;
pub use sessions::{
    Session, SessionAuthority, SessionError, SessionId, SessionKey, DEFAULT_SESSION_LIFETIME,
    MIN_SESSION_SECRET_LEN, SESSION_SWEEP_INTERVAL,
};
pub use tokens::{AccessCode, Token, TokenError, TokenRecord, MAX_CODE_LEN};
