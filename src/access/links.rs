//! Listing and delegated link issuance for unlocked groups

use crate::access::AccessError;
use crate::auth::{SessionAuthority, SessionId};
use crate::catalog::{GroupName, ItemName, ResourceCatalog};
use crate::signing::{DelegatedLink, LinkSigner, SigningError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Lifetime of an issued link
pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(60);

/// Upper bound on a single call to the signer
pub const DEFAULT_SIGNING_TIMEOUT: Duration = Duration::from_secs(5);

/// Issues short-lived links to items of groups a session has unlocked.
///
/// Holds no mutable state: every call resolves the locator afresh and asks the
/// signer for a new credential. Failed signing is reported, never retried.
pub struct LinkIssuer {
    catalog: Arc<ResourceCatalog>,
    sessions: Arc<SessionAuthority>,
    signer: Arc<dyn LinkSigner>,
    link_ttl: Duration,
    signing_timeout: Duration,
}

impl LinkIssuer {
    pub fn new(
        catalog: Arc<ResourceCatalog>,
        sessions: Arc<SessionAuthority>,
        signer: Arc<dyn LinkSigner>,
    ) -> Self {
        Self {
            catalog,
            sessions,
            signer,
            link_ttl: DEFAULT_LINK_TTL,
            signing_timeout: DEFAULT_SIGNING_TIMEOUT,
        }
    }

    pub fn with_link_ttl(mut self, ttl: Duration) -> Self {
        self.link_ttl = ttl;
        self
    }

    pub fn with_signing_timeout(mut self, signing_timeout: Duration) -> Self {
        self.signing_timeout = signing_timeout;
        self
    }

    /// All group names, no authorization required
    pub fn list_groups(&self) -> Vec<GroupName> {
        self.catalog.group_names().into_iter().cloned().collect()
    }

    /// Item names of a group the session has unlocked
    pub fn list_items(
        &self,
        session: &SessionId,
        group: &str,
    ) -> Result<Vec<ItemName>, AccessError> {
        self.authorize(session, group)?;

        let group = GroupName::parse(group)?;
        let items = self.catalog.item_names(&group)?;
        Ok(items.into_iter().cloned().collect())
    }

    /// Mint a delegated link for one item of an unlocked group
    pub async fn issue(
        &self,
        session: &SessionId,
        group: &str,
        item: &str,
    ) -> Result<DelegatedLink, AccessError> {
        self.authorize(session, group)?;

        let group = GroupName::parse(group)?;
        let item = ItemName::parse(item)?;
        let locator = self.catalog.locator(&group, &item)?;

        let signing = self.signer.sign(locator, self.link_ttl);
        let link = match timeout(self.signing_timeout, signing).await {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                error!(group = %group, item = %item, error = %e, "Failed to sign link");
                return Err(e.into());
            }
            Err(_) => {
                error!(
                    group = %group,
                    item = %item,
                    timeout_ms = self.signing_timeout.as_millis() as u64,
                    "Link signing timed out"
                );
                return Err(SigningError::Timeout(self.signing_timeout).into());
            }
        };

        debug!(
            session_id = %session,
            group = %group,
            item = %item,
            expires_at = %link.expires_at,
            "Delegated link issued"
        );
        Ok(link)
    }

    fn authorize(&self, session: &SessionId, group: &str) -> Result<(), AccessError> {
        if self.sessions.is_authorized(session, group) {
            Ok(())
        } else {
            warn!(session_id = %session, group = group, "Unauthorized access attempt");
            Err(AccessError::Unauthorized)
        }
    }
}
