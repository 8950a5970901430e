//! Access control core
//!
//! - `redemption`: spend a code to unlock a group for a session
//! - `links`: list unlocked groups and mint delegated links to their items

mod error;
mod links;
mod redemption;

pub use error::AccessError;
pub use links::{LinkIssuer, DEFAULT_LINK_TTL, DEFAULT_SIGNING_TIMEOUT};
pub use redemption::RedemptionService;
