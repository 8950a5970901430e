//! Lockbox HTTP server
//!
//! Wires the token store, catalog and signer into the access core and exposes
//! it over HTTP.

mod cookies;
mod routes;

pub use cookies::{clear_session_cookie, session_cookie, session_from_headers, SESSION_COOKIE};
pub use routes::{create_router, AppState, ErrorResponse, FilesResponse, FoldersResponse};

use crate::access::{LinkIssuer, RedemptionService, DEFAULT_LINK_TTL, DEFAULT_SIGNING_TIMEOUT};
use crate::auth::{SessionAuthority, SessionKey, DEFAULT_SESSION_LIFETIME};
use crate::catalog::ResourceCatalog;
use crate::signing::LinkSigner;
use crate::storage::TokenStore;
use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Server configuration
#[derive(Debug, Clone)]
pub struct LockboxServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Key for signing session cookies
    pub session_key: SessionKey,
    /// Absolute lifetime of a session
    pub session_lifetime: Duration,
    /// Lifetime of issued download links
    pub link_ttl: Duration,
    /// Upper bound on one signing call
    pub signing_timeout: Duration,
    /// Mark the session cookie `Secure` (HTTPS deployments)
    pub secure_cookies: bool,
}

impl LockboxServerConfig {
    pub fn new(bind_addr: SocketAddr, session_key: SessionKey) -> Self {
        Self {
            bind_addr,
            session_key,
            session_lifetime: DEFAULT_SESSION_LIFETIME,
            link_ttl: DEFAULT_LINK_TTL,
            signing_timeout: DEFAULT_SIGNING_TIMEOUT,
            secure_cookies: false,
        }
    }
}

/// The main Lockbox server
pub struct LockboxServer {
    config: LockboxServerConfig,
    state: AppState,
}

impl LockboxServer {
    pub fn new(
        config: LockboxServerConfig,
        store: Arc<dyn TokenStore>,
        catalog: Arc<ResourceCatalog>,
        signer: Arc<dyn LinkSigner>,
    ) -> Self {
        let sessions = Arc::new(SessionAuthority::with_lifetime(config.session_lifetime));
        let redemption = Arc::new(RedemptionService::new(
            store,
            catalog.clone(),
            sessions.clone(),
        ));
        let links = Arc::new(
            LinkIssuer::new(catalog, sessions.clone(), signer)
                .with_link_ttl(config.link_ttl)
                .with_signing_timeout(config.signing_timeout),
        );

        let state = AppState {
            sessions,
            session_key: config.session_key.clone(),
            redemption,
            links,
            secure_cookies: config.secure_cookies,
        };

        Self { config, state }
    }

    /// Get the HTTP router (for embedding or testing)
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Get active session count
    pub fn session_count(&self) -> usize {
        self.state.sessions.count()
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.bind_addr))?;

        info!(addr = %self.config.bind_addr, "Lockbox server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server error")?;

        Ok(())
    }
}
