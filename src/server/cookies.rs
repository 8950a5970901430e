//! Session cookie handling

use crate::auth::{SessionId, SessionKey};
use axum::http::{header, HeaderMap, HeaderValue};
use std::time::Duration;

pub const SESSION_COOKIE: &str = "lockbox_session";

/// Extract and verify the session id carried by the request, if any.
///
/// Missing, malformed or forged cookies all yield `None`.
pub fn session_from_headers(headers: &HeaderMap, key: &SessionKey) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| key.verify(value))
}

/// `Set-Cookie` value that hands the session to the client
pub fn session_cookie(
    key: &SessionKey,
    id: &SessionId,
    max_age: Duration,
    secure: bool,
) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        key.sign(id),
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("lockbox_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
