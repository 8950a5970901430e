//! Single-use access codes
//!
//! A code is an opaque, unguessable identifier (UUID v4, 122 random bits).
//! The redemption state of each code lives in a [`TokenStore`](crate::storage::TokenStore);
//! this module only deals with the identifier itself and the persisted record.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on accepted code length, well above a hyphenated UUID.
pub const MAX_CODE_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("access code cannot be empty")]
    Empty,

    #[error("access code is too long ({0} bytes)")]
    TooLong(usize),

    #[error("access code contains invalid characters")]
    InvalidCharacters,
}

/// An access code identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessCode(String);

impl AccessCode {
    /// Generate a fresh random code
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse user input into a code.
    ///
    /// Surrounding whitespace is trimmed. Only the shape is checked here; whether
    /// the code was ever issued is a store lookup.
    pub fn parse(input: &str) -> Result<Self, TokenError> {
        let code = input.trim();
        if code.is_empty() {
            return Err(TokenError::Empty);
        }
        if code.len() > MAX_CODE_LEN {
            return Err(TokenError::TooLong(code.len()));
        }
        if !code.chars().all(|c| c.is_ascii_graphic()) {
            return Err(TokenError::InvalidCharacters);
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Redemption state of a code, as persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub used: bool,
}

impl TokenRecord {
    pub fn unused() -> Self {
        Self { used: false }
    }
}

/// A code together with its state, as returned from issuance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub code: AccessCode,
    pub used: bool,
}

impl Token {
    pub fn fresh(code: AccessCode) -> Self {
        Self { code, used: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_is_parseable() {
        let code = AccessCode::generate();
        let parsed = AccessCode::parse(code.as_str()).unwrap();
        assert_eq!(parsed, code);
        assert!(Uuid::parse_str(code.as_str()).is_ok());
    }

    #[test]
    fn test_generate_unique() {
        let codes: HashSet<_> = (0..1000).map(|_| AccessCode::generate()).collect();
        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let code = AccessCode::parse("  abc-123\n").unwrap();
        assert_eq!(code.as_str(), "abc-123");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(AccessCode::parse(""), Err(TokenError::Empty));
        assert_eq!(AccessCode::parse("   "), Err(TokenError::Empty));
        assert_eq!(AccessCode::parse("ab cd"), Err(TokenError::InvalidCharacters));
        assert!(matches!(
            AccessCode::parse(&"x".repeat(MAX_CODE_LEN + 1)),
            Err(TokenError::TooLong(_))
        ));
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_string(&TokenRecord::unused()).unwrap();
        assert_eq!(json, r#"{"used":false}"#);
    }
}
