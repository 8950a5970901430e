//! Code redemption
//!
//! Redeeming a code consumes it and grants its group to the caller's session.
//! Checks run in a fixed order and every rejection before the consume step
//! leaves all state untouched.

use crate::access::AccessError;
use crate::auth::{AccessCode, SessionAuthority, SessionId};
use crate::catalog::{GroupName, ResourceCatalog};
use crate::storage::TokenStore;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct RedemptionService {
    store: Arc<dyn TokenStore>,
    catalog: Arc<ResourceCatalog>,
    sessions: Arc<SessionAuthority>,
}

impl RedemptionService {
    pub fn new(
        store: Arc<dyn TokenStore>,
        catalog: Arc<ResourceCatalog>,
        sessions: Arc<SessionAuthority>,
    ) -> Self {
        Self {
            store,
            catalog,
            sessions,
        }
    }

    /// Redeem `code` for `group` on behalf of `session`.
    ///
    /// On success the code is spent and the group is granted; the returned name
    /// is the group now unlocked. A code is consumed even when the session
    /// already holds the group.
    pub async fn redeem(
        &self,
        code: &str,
        group: &str,
        session: &SessionId,
    ) -> Result<GroupName, AccessError> {
        let code = code.trim();
        let group = group.trim();
        if code.is_empty() || group.is_empty() {
            return Err(AccessError::Validation(
                "access code and group are required".to_string(),
            ));
        }

        // A name that fails validation can never be in the catalog.
        let group = GroupName::parse(group).map_err(|e| {
            warn!(group = group, error = %e, "Redemption for malformed group name");
            AccessError::NotFound(format!("group not found: {}", group))
        })?;
        if !self.catalog.contains_group(&group) {
            warn!(group = %group, "Redemption for unknown group");
            return Err(AccessError::NotFound(format!("group not found: {}", group)));
        }

        let code = AccessCode::parse(code).map_err(|_| AccessError::InvalidToken)?;
        if !self.store.exists(&code).await {
            warn!(group = %group, "Redemption with unknown access code");
            return Err(AccessError::InvalidToken);
        }

        // Refuse before spending the code if there is nowhere to put the grant.
        if self.sessions.get(session).is_none() {
            warn!(session_id = %session, "Redemption on inactive session");
            return Err(AccessError::Unauthorized);
        }

        if let Err(e) = self.store.consume(&code).await {
            let err = AccessError::from(e);
            match &err {
                AccessError::AlreadyUsed => {
                    warn!(group = %group, session_id = %session, "Access code already used")
                }
                other => error!(error = %other, "Failed to consume access code"),
            }
            return Err(err);
        }

        if !self.sessions.grant(session, group.clone()) {
            // Session expired between the check above and now.
            error!(
                session_id = %session,
                group = %group,
                "Access code consumed but session is no longer active"
            );
            return Err(AccessError::Unauthorized);
        }

        info!(group = %group, session_id = %session, "Access code redeemed");
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenRecord;
    use crate::storage::MemoryTokenStore;

    const CATALOG: &str = r#"
        [groups.GROUP_A]
        ITEM1 = "folder/a1.pdf"

        [groups.GROUP_B]
        ITEM1 = "folder/b1.pdf"
    "#;

    struct Fixture {
        store: Arc<MemoryTokenStore>,
        sessions: Arc<SessionAuthority>,
        service: RedemptionService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryTokenStore::new());
        let catalog = Arc::new(ResourceCatalog::from_toml_str(CATALOG).unwrap());
        let sessions = Arc::new(SessionAuthority::new());
        let service = RedemptionService::new(store.clone(), catalog, sessions.clone());
        Fixture {
            store,
            sessions,
            service,
        }
    }

    fn group(name: &str) -> GroupName {
        GroupName::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_redeem_grants_group() {
        let f = fixture();
        let code = f.store.issue(1).await.unwrap().remove(0).code;
        let session = f.sessions.create();

        let unlocked = f
            .service
            .redeem(code.as_str(), "GROUP_A", &session.id)
            .await
            .unwrap();

        assert_eq!(unlocked, group("GROUP_A"));
        assert!(f.sessions.is_authorized(&session.id, &group("GROUP_A")));
        assert!(!f.sessions.is_authorized(&session.id, &group("GROUP_B")));
        assert_eq!(f.store.record(&code).await, Some(TokenRecord { used: true }));
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let f = fixture();
        let session = f.sessions.create();

        for (code, group) in [("", "GROUP_A"), ("abc", ""), ("  ", "  ")] {
            let result = f.service.redeem(code, group, &session.id).await;
            assert!(matches!(result, Err(AccessError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_unknown_group_leaves_code_unused() {
        let f = fixture();
        let code = f.store.issue(1).await.unwrap().remove(0).code;
        let session = f.sessions.create();

        let result = f
            .service
            .redeem(code.as_str(), "NO_SUCH_GROUP", &session.id)
            .await;

        assert!(matches!(result, Err(AccessError::NotFound(_))));
        assert_eq!(f.store.record(&code).await, Some(TokenRecord::unused()));
    }

    #[tokio::test]
    async fn test_malformed_group_is_not_found() {
        let f = fixture();
        let code = f.store.issue(1).await.unwrap().remove(0).code;
        let session = f.sessions.create();

        for name in ["../GROUP_A", "a/b", "GROUP_A\\x"] {
            let result = f.service.redeem(code.as_str(), name, &session.id).await;
            assert!(matches!(result, Err(AccessError::NotFound(_))), "{name}");
        }
        assert_eq!(f.store.record(&code).await, Some(TokenRecord::unused()));
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let f = fixture();
        let session = f.sessions.create();

        let result = f.service.redeem("bogus", "GROUP_A", &session.id).await;
        assert_eq!(result, Err(AccessError::InvalidToken));

        let result = f.service.redeem("not a code", "GROUP_A", &session.id).await;
        assert_eq!(result, Err(AccessError::InvalidToken));

        assert_eq!(f.store.stats().await.total, 0);
        assert!(!f.sessions.is_authorized(&session.id, &group("GROUP_A")));
    }

    #[tokio::test]
    async fn test_second_redemption_rejected() {
        let f = fixture();
        let code = f.store.issue(1).await.unwrap().remove(0).code;
        let first = f.sessions.create();
        let second = f.sessions.create();

        f.service
            .redeem(code.as_str(), "GROUP_A", &first.id)
            .await
            .unwrap();
        let result = f.service.redeem(code.as_str(), "GROUP_B", &second.id).await;

        assert_eq!(result, Err(AccessError::AlreadyUsed));
        assert!(!f.sessions.is_authorized(&second.id, &group("GROUP_B")));
        assert!(!f.sessions.is_authorized(&second.id, &group("GROUP_A")));
    }

    #[tokio::test]
    async fn test_code_consumed_even_if_group_already_held() {
        let f = fixture();
        let codes = f.store.issue(2).await.unwrap();
        let session = f.sessions.create();

        f.service
            .redeem(codes[0].code.as_str(), "GROUP_A", &session.id)
            .await
            .unwrap();
        f.service
            .redeem(codes[1].code.as_str(), "GROUP_A", &session.id)
            .await
            .unwrap();

        assert_eq!(f.store.stats().await.used, 2);
    }

    #[tokio::test]
    async fn test_inactive_session_does_not_spend_code() {
        let f = fixture();
        let code = f.store.issue(1).await.unwrap().remove(0).code;
        let session = f.sessions.create();
        f.sessions.destroy(&session.id);

        let result = f.service.redeem(code.as_str(), "GROUP_A", &session.id).await;

        assert_eq!(result, Err(AccessError::Unauthorized));
        assert_eq!(f.store.record(&code).await, Some(TokenRecord::unused()));
    }
}
