//! Session-scoped authorization
//!
//! A session accumulates group grants for a fixed absolute lifetime. Expiry is
//! evaluated lazily on every access; an expired session is indistinguishable
//! from a destroyed one and its record is reclaimed when next touched.
//!
//! Clients hold a session through a signed handle (`<id>.<tag>`), see [`SessionKey`].

use crate::auth::grants::GrantSet;
use crate::catalog::GroupName;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Absolute session lifetime
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Minimum accepted length of the session signing secret
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Expired sessions are swept once per this many creations
pub const SESSION_SWEEP_INTERVAL: usize = 256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session secret must be at least {MIN_SESSION_SECRET_LEN} bytes, got {0}")]
    SecretTooShort(usize),
}

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A snapshot of a session's state
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub grants: GrantSet,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl Session {
    fn new(lifetime: Duration) -> Self {
        let now = Instant::now();
        Self {
            id: SessionId::generate(),
            grants: GrantSet::new(),
            created_at: now,
            expires_at: now + lifetime,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left before expiry (zero once expired)
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Owns all live sessions.
///
/// Entries are sharded in a concurrent map, so mutations of one session are
/// serialized against each other without blocking unrelated sessions.
pub struct SessionAuthority {
    sessions: DashMap<SessionId, Session>,
    lifetime: Duration,
    created: AtomicUsize,
}

impl SessionAuthority {
    pub fn new() -> Self {
        Self::with_lifetime(DEFAULT_SESSION_LIFETIME)
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            lifetime,
            created: AtomicUsize::new(0),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Start a new session with no grants
    pub fn create(&self) -> Session {
        let created = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        if created % SESSION_SWEEP_INTERVAL == 0 {
            self.sweep();
        }

        let session = Session::new(self.lifetime);
        self.sessions.insert(session.id.clone(), session.clone());
        info!(session_id = %session.id, "Session created");
        session
    }

    /// Get a live session, reclaiming it if it has expired
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        let expired = match self.sessions.get(id) {
            Some(session) if !session.is_expired() => return Some(session.value().clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.reclaim(id);
        }
        None
    }

    /// Add `group` to the session's grants.
    ///
    /// Granting an already held group is a no-op. Returns false only when the
    /// session is unknown, destroyed or expired, in which case nothing changes.
    pub fn grant(&self, id: &SessionId, group: GroupName) -> bool {
        let expired = match self.sessions.get_mut(id) {
            Some(mut session) if !session.is_expired() => {
                if session.grants.add(group.clone()) {
                    debug!(session_id = %id, group = %group, "Group granted");
                }
                return true;
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.reclaim(id);
        }
        false
    }

    /// Check whether the session holds `group`. Fails closed.
    pub fn is_authorized(&self, id: &SessionId, group: impl AsRef<str>) -> bool {
        self.get(id)
            .map(|session| session.grants.allows(group))
            .unwrap_or(false)
    }

    /// Invalidate a session. Returns false if it did not exist.
    pub fn destroy(&self, id: &SessionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            info!(session_id = %id, "Session destroyed");
        }
        removed
    }

    /// Number of session records currently held (including not yet reclaimed expired ones)
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop every expired session record
    pub fn sweep(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired());
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed = removed, "Expired sessions swept");
        }
        removed
    }

    fn reclaim(&self, id: &SessionId) {
        if self
            .sessions
            .remove_if(id, |_, session| session.is_expired())
            .is_some()
        {
            debug!(session_id = %id, "Expired session reclaimed");
        }
    }
}

impl Default for SessionAuthority {
    fn default() -> Self {
        Self::new()
    }
}

/// Signs session ids into client-held handles and verifies them.
#[derive(Clone)]
pub struct SessionKey {
    key: Vec<u8>,
}

impl SessionKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SessionError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(SessionError::SecretTooShort(secret.len()));
        }
        Ok(Self {
            key: secret.to_vec(),
        })
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size")
    }

    /// Produce the handle handed to the client: `<id>.<tag>`
    pub fn sign(&self, id: &SessionId) -> String {
        let mut mac = self.mac();
        mac.update(id.as_str().as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", id, tag)
    }

    /// Verify a handle and extract the session id
    pub fn verify(&self, handle: &str) -> Option<SessionId> {
        let (id, tag) = handle.split_once('.')?;
        if id.is_empty() {
            return None;
        }
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;

        let mut mac = self.mac();
        mac.update(id.as_bytes());
        mac.verify_slice(&tag).ok()?;

        Some(SessionId(id.to_string()))
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}
