use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;

use crate::ctx::{FilterOutcome, RequestScope};
use crate::error::GatewayError;
use crate::filter::Filter;
use crate::provider::{AuthorizationDecision, IdentityProvider};
use crate::store::SessionStore;

/// Obtains an `AuthorizationDecision` for the request's (identity, URL)
/// pair, consulting the session store before calling the provider and
/// writing the provider's answer back on a miss.
pub struct AuthorizationFilter {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
    provider_access_token: Arc<AsyncMutex<String>>,
    realm: String,
    timeout: StdDuration,
}

impl AuthorizationFilter {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn SessionStore>,
        provider_access_token: Arc<AsyncMutex<String>>,
        realm: String,
        timeout: StdDuration,
    ) -> Self {
        Self {
            provider,
            store,
            provider_access_token,
            realm,
            timeout,
        }
    }
}

#[async_trait]
impl Filter for AuthorizationFilter {
    fn name(&self) -> &'static str {
        "authorization"
    }

    async fn on_request(&self, scope: &mut RequestScope) -> FilterOutcome {
        let Some(identity) = scope.identity.clone() else {
            return FilterOutcome::Error(GatewayError::Internal(
                "authorization filter ran without a verified identity".into(),
            ));
        };

        let url = scope.original_raw_path.clone();

        if self.store.is_enabled() {
            match self.store.get_authz(&identity.raw_token, &url).await {
                Ok(Some(decision)) => return self.apply_decision(decision, scope),
                Ok(None) | Err(_) => {}
            }
        }

        let pat = self.provider_access_token.lock().await.clone();
        let outcome = self
            .provider
            .authorize(&identity.permissions, &url, &self.realm, self.timeout, &pat)
            .await;

        if let Some(classification) = outcome.classification {
            tracing::info!(?classification, subject = %identity.subject, "authorization classification");
        }

        match outcome.decision {
            AuthorizationDecision::Allowed | AuthorizationDecision::Denied => {
                if self.store.is_enabled() {
                    let ttl = (identity.expires_at - Utc::now()).to_std().unwrap_or(StdDuration::ZERO);
                    if ttl > StdDuration::ZERO {
                        if let Err(e) = self.store.store_authz(&identity.raw_token, &url, outcome.decision, ttl).await {
                            tracing::warn!(error = %e, "failed to cache authorization decision");
                        }
                    }
                }
                self.apply_decision(outcome.decision, scope)
            }
            AuthorizationDecision::Undecided => {
                scope.mark_denied();
                FilterOutcome::Error(GatewayError::Internal(
                    "authorization backend could not reach a decision".into(),
                ))
            }
        }
    }
}

impl AuthorizationFilter {
    fn apply_decision(&self, decision: AuthorizationDecision, scope: &mut RequestScope) -> FilterOutcome {
        match decision {
            AuthorizationDecision::Allowed => FilterOutcome::Continue,
            AuthorizationDecision::Denied => {
                scope.mark_denied();
                let state = scope.request_id.clone().unwrap_or_default();
                FilterOutcome::RedirectLogin {
                    location: self.provider.authorize_endpoint(&state),
                    clear_cookies: false,
                }
            }
            AuthorizationDecision::Undecided => {
                scope.mark_denied();
                FilterOutcome::Error(GatewayError::Internal(
                    "authorization backend could not reach a decision".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AuthorizeOutcome, RefreshError, RefreshedTokens, VerificationError, VerifiedClaims, VerifyOptions};
    use crate::store::MemoryStore;
    use http::{HeaderMap, Method, Uri};

    struct FakeProvider {
        decision: AuthorizationDecision,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn verify(&self, _raw_token: &str, _opts: &VerifyOptions) -> Result<VerifiedClaims, VerificationError> {
            unreachable!("not exercised by authorization filter tests")
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
            unreachable!("not exercised by authorization filter tests")
        }

        async fn authorize(
            &self,
            _permissions: &serde_json::Value,
            _request_url: &str,
            _realm: &str,
            _timeout: StdDuration,
            _provider_access_token: &str,
        ) -> AuthorizeOutcome {
            AuthorizeOutcome {
                decision: self.decision,
                classification: None,
            }
        }

        fn authorize_endpoint(&self, state: &str) -> String {
            format!("https://idp.example/oauth/authorize?state={state}")
        }
    }

    fn scope_with_identity() -> RequestScope {
        let mut scope = RequestScope::new(Method::GET, Uri::from_static("/api/x"), HeaderMap::new());
        scope.identity = Some(crate::ctx::Identity {
            subject: "u1".into(),
            preferred_username: None,
            email: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            raw_token: "tok".into(),
            audiences: vec![],
            roles: Default::default(),
            groups: Default::default(),
            permissions: serde_json::Value::Null,
            claims: Default::default(),
        });
        scope
    }

    #[tokio::test]
    async fn allowed_continues_and_caches() {
        let store = Arc::new(MemoryStore::new());
        let filter = AuthorizationFilter::new(
            Arc::new(FakeProvider {
                decision: AuthorizationDecision::Allowed,
            }),
            store.clone(),
            Arc::new(AsyncMutex::new("pat".to_string())),
            "realm".into(),
            StdDuration::from_secs(5),
        );
        let mut scope = scope_with_identity();
        assert!(filter.on_request(&mut scope).await.is_continue());
        assert_eq!(
            store.get_authz("tok", "/api/x").await.unwrap(),
            Some(AuthorizationDecision::Allowed)
        );
    }

    #[tokio::test]
    async fn cached_decision_skips_provider_call() {
        let store = Arc::new(MemoryStore::new());
        store
            .store_authz("tok", "/api/x", AuthorizationDecision::Denied, StdDuration::from_secs(60))
            .await
            .unwrap();
        let filter = AuthorizationFilter::new(
            Arc::new(FakeProvider {
                decision: AuthorizationDecision::Allowed,
            }),
            store,
            Arc::new(AsyncMutex::new("pat".to_string())),
            "realm".into(),
            StdDuration::from_secs(5),
        );
        let mut scope = scope_with_identity();
        let outcome = filter.on_request(&mut scope).await;
        assert!(matches!(outcome, FilterOutcome::RedirectLogin { .. }));
    }

    #[tokio::test]
    async fn denied_redirects_to_login() {
        let filter = AuthorizationFilter::new(
            Arc::new(FakeProvider {
                decision: AuthorizationDecision::Denied,
            }),
            Arc::new(crate::store::NullStore),
            Arc::new(AsyncMutex::new("pat".to_string())),
            "realm".into(),
            StdDuration::from_secs(5),
        );
        let mut scope = scope_with_identity();
        let outcome = filter.on_request(&mut scope).await;
        assert!(matches!(outcome, FilterOutcome::RedirectLogin { .. }));
        assert!(scope.access_denied);
    }
}
