//! Group and item names
//!
//! Names come straight from URLs and form fields, so they are validated before
//! any lookup. A valid name is non-empty, has no control characters, no path
//! separators and no parent-directory reference (`..`).

use serde::{Deserialize, Deserializer};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// Upper bound on name length
pub const MAX_NAME_LEN: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name is too long ({0} bytes)")]
    TooLong(usize),

    #[error("parent-directory reference in '{0}'")]
    Traversal(String),

    #[error("path separator in '{0}'")]
    Separator(String),

    #[error("control character in name")]
    ControlCharacter,
}

impl NameError {
    /// True for rejections that indicate a path-traversal attempt
    pub fn is_traversal(&self) -> bool {
        matches!(self, NameError::Traversal(_) | NameError::Separator(_))
    }
}

fn validate(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong(name.len()));
    }
    if name.contains("..") {
        return Err(NameError::Traversal(name.to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(NameError::Separator(name.to_string()));
    }
    if name.chars().any(char::is_control) {
        return Err(NameError::ControlCharacter);
    }
    Ok(())
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn parse(name: &str) -> Result<Self, NameError> {
                validate(name)?;
                Ok(Self(name.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

validated_name!(
    /// Name of a group of items unlocked together
    GroupName
);

validated_name!(
    /// Name of an item within a group
    ItemName
);
