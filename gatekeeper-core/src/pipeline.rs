//! Wires the pipeline's named components into the single ordered chain
//! the request flow follows:
//!
//! ```text
//! entry → request_id → security → method → (per-route) authentication →
//! authorization → admission → identity_header → response_header → upstream
//! ```
//!
//! The entry filter and response-header stage aside, every stage implements
//! `Filter`; `Pipeline` is the thing that actually owns one instance of
//! each and runs them in order for a given request. Resource matching
//! (which determines which per-route admission filter applies) happens
//! after the method check: unmatched paths are treated as public and skip
//! straight to the response-header stage, the skip-admission allow-list
//! behavior every gateway of this shape needs for health checks.

use std::time::Instant;

use http::{HeaderMap, Method, StatusCode, Uri};

use crate::ctx::{FilterOutcome, RequestScope};
use crate::filter::{
    AdmissionFilter, AuthenticationFilter, AuthorizationFilter, EntryFilter, Filter, FilterChain,
    IdentityHeaderFilter, ResponseHeaderFilter,
};

/// One protected resource's admission rule, paired with the URL prefix it
/// matches against. Built once at configuration load and never mutated.
/// `admission` is usually an `AdmissionFilter`, but a resource configured as
/// blocked outright uses a `DenyFilter` here instead.
pub struct ResourceRoute {
    pub url_pattern: String,
    pub admission: Box<dyn Filter>,
}

/// The result of running the full pipeline against one request: the scope
/// it produced (with the original URI restored) and the terminal outcome.
pub struct PipelineOutcome {
    pub scope: RequestScope,
    pub outcome: FilterOutcome,
}

/// Owns one instance of every filter and runs them in a fixed order.
/// `authentication`, `authorization`, and `identity_header` are shared
/// across every protected resource (they are not resource-specific); only
/// the admission filter varies per route.
pub struct Pipeline {
    common: FilterChain,
    routes: Vec<ResourceRoute>,
    authentication: AuthenticationFilter,
    authorization: AuthorizationFilter,
    identity_header: IdentityHeaderFilter,
    response_header: ResponseHeaderFilter,
}

impl Pipeline {
    /// `routes` need not be pre-sorted; construction sorts them so the
    /// longest `url_pattern` is tried first, matching how a more specific
    /// resource (`/admin/reports`) should win over a more general one
    /// (`/admin`) that happens to also prefix-match the path.
    pub fn new(
        common: FilterChain,
        mut routes: Vec<ResourceRoute>,
        authentication: AuthenticationFilter,
        authorization: AuthorizationFilter,
        identity_header: IdentityHeaderFilter,
        response_header: ResponseHeaderFilter,
    ) -> Self {
        routes.sort_by(|a, b| b.url_pattern.len().cmp(&a.url_pattern.len()));
        Self {
            common,
            routes,
            authentication,
            authorization,
            identity_header,
            response_header,
        }
    }

    /// Runs the full pipeline for one inbound request: opens a fresh
    /// scope, normalizes the path, runs every applicable filter, then
    /// restores the pre-normalization URI and records the request's
    /// latency/status metrics.
    pub async fn handle(&self, method: Method, uri: Uri, headers: HeaderMap) -> PipelineOutcome {
        let start = Instant::now();
        let mut scope = EntryFilter::open(method.clone(), uri, headers);

        let outcome = self.run(&mut scope).await;

        let status = Self::status_for(&outcome);
        scope.uri = EntryFilter::restore_original_uri(&scope);
        EntryFilter::record_metrics(&method, status, start.elapsed());

        PipelineOutcome { scope, outcome }
    }

    async fn run(&self, scope: &mut RequestScope) -> FilterOutcome {
        let outcome = self.common.run(scope).await;
        if !outcome.is_continue() {
            return outcome;
        }

        // CORS preflight pass-through: an OPTIONS request that cleared the
        // method allow-list above skips authentication/authorization/
        // admission entirely and goes straight to the response-header
        // filter, matching every other "unprotected" escape hatch this
        // pipeline grants (public resources, unmatched paths).
        if scope.method == Method::OPTIONS {
            return self.response_header.on_request(scope).await;
        }

        if let Some(route) = self.match_route(scope.path()) {
            for outcome in [
                self.authentication.on_request(scope).await,
                self.authorization.on_request(scope).await,
                route.admission.on_request(scope).await,
                self.identity_header.on_request(scope).await,
            ] {
                if !outcome.is_continue() {
                    return outcome;
                }
            }
        }

        self.response_header.on_request(scope).await
    }

    fn match_route(&self, path: &str) -> Option<&ResourceRoute> {
        self.routes.iter().find(|r| path.starts_with(r.url_pattern.as_str()))
    }

    fn status_for(outcome: &FilterOutcome) -> StatusCode {
        match outcome {
            FilterOutcome::Continue => StatusCode::OK,
            FilterOutcome::RedirectLogin { .. } => StatusCode::SEE_OTHER,
            FilterOutcome::Redirect { status, .. } => *status,
            FilterOutcome::Deny { status, .. } => *status,
            FilterOutcome::Error(e) => e.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::{AesGcmCookieCodec, CookieNames};
    use crate::provider::{
        AuthorizationDecision, AuthorizeOutcome, IdentityProvider, RefreshError, RefreshedTokens,
        VerificationError, VerifiedClaims, VerifyOptions,
    };
    use crate::resource::Resource;
    use crate::store::NullStore;
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::Utc;
    use http::Method;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;
    use tokio::sync::Mutex as AsyncMutex;

    struct AllowProvider;

    #[async_trait]
    impl IdentityProvider for AllowProvider {
        async fn verify(&self, _raw_token: &str, _opts: &VerifyOptions) -> Result<VerifiedClaims, VerificationError> {
            Err(VerificationError::Other("not exercised".into()))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
            unreachable!("not exercised by pipeline scenario tests")
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
                decision: AuthorizationDecision::Allowed,
                classification: None,
            }
        }

        fn authorize_endpoint(&self, state: &str) -> String {
            format!("https://idp.example/oauth/authorize?state={state}")
        }
    }

    fn fake_jwt(subject: &str, expires_at: chrono::DateTime<Utc>) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::json!({ "sub": subject, "exp": expires_at.timestamp(), "roles": ["admin"] })
                .to_string()
                .as_bytes(),
        );
        format!("{header}.{payload}.sig")
    }

    fn pipeline() -> Pipeline {
        let common = FilterChain::new()
            .push(crate::filter::RequestIdFilter::new(http::HeaderName::from_static("x-request-id")))
            .push(crate::filter::SecurityHeaderFilter::new(vec![], false, None))
            .push(crate::filter::MethodFilter::new([Method::GET, Method::OPTIONS]));

        let admission = AdmissionFilter::new(
            Resource {
                url_pattern: "/admin".into(),
                required_roles: vec!["admin".into()],
                require_any_role: false,
                required_groups: vec![],
            },
            vec![],
        );

        let authentication = AuthenticationFilter::new(
            Arc::new(AllowProvider),
            VerifyOptions {
                client_id: "client".into(),
                skip_client_id_check: true,
                skip_issuer_check: true,
            },
            true,
            false,
            Arc::new(NullStore),
            Arc::new(AesGcmCookieCodec::new(&[3u8; 32]).unwrap()),
            CookieNames::default(),
            false,
            StdDuration::from_secs(3600),
            true,
        );

        let authorization = AuthorizationFilter::new(
            Arc::new(AllowProvider),
            Arc::new(NullStore),
            Arc::new(AsyncMutex::new("pat".to_string())),
            "realm".into(),
            StdDuration::from_secs(5),
        );

        let identity_header = IdentityHeaderFilter::new(CookieNames::default(), true, true, true, vec![]);
        let response_header = ResponseHeaderFilter::new(vec![]);

        Pipeline::new(
            common,
            vec![ResourceRoute {
                url_pattern: "/admin".into(),
                admission: Box::new(admission),
            }],
            authentication,
            authorization,
            identity_header,
            response_header,
        )
    }

    /// No bearer token at all redirects to the provider's login page.
    #[tokio::test]
    async fn unauthenticated_redirects_to_login() {
        let result = pipeline().handle(Method::GET, Uri::from_static("/admin"), HeaderMap::new()).await;
        assert!(matches!(result.outcome, FilterOutcome::RedirectLogin { .. }));
    }

    /// Skip-verification mode still redirects an expired identity.
    #[tokio::test]
    async fn skip_verify_expired_redirects_to_login() {
        let token = fake_jwt("user-1", Utc::now() - chrono::Duration::hours(1));
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let result = pipeline().handle(Method::GET, Uri::from_static("/admin"), headers).await;
        assert!(matches!(result.outcome, FilterOutcome::RedirectLogin { .. }));
    }

    /// A double-slash-plus-parent-reference path normalizes before
    /// resource matching, and the original raw path is restored afterward.
    #[tokio::test]
    async fn double_slash_normalizes_before_matching_and_restores_after() {
        let result = pipeline()
            .handle(Method::GET, Uri::from_static("//admin/../etc"), HeaderMap::new())
            .await;
        // "/etc" doesn't match the "/admin" resource, so it is treated as
        // public and passes straight through to the response-header stage.
        assert!(result.outcome.is_continue());
        assert_eq!(result.scope.uri.path(), "//admin/../etc");
    }

    #[tokio::test]
    async fn unprotected_path_skips_authentication_entirely() {
        let result = pipeline()
            .handle(Method::GET, Uri::from_static("/healthz"), HeaderMap::new())
            .await;
        assert!(result.outcome.is_continue());
    }

    #[tokio::test]
    async fn valid_identity_with_satisfied_role_reaches_upstream() {
        let token = fake_jwt("user-1", Utc::now() + chrono::Duration::hours(1));
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let result = pipeline().handle(Method::GET, Uri::from_static("/admin"), headers).await;
        assert!(result.outcome.is_continue());
        assert_eq!(result.scope.headers.get("x-auth-subject").unwrap(), "user-1");
    }

    #[tokio::test]
    async fn method_not_on_allow_list_short_circuits_before_resource_matching() {
        let result = pipeline()
            .handle(Method::DELETE, Uri::from_static("/admin"), HeaderMap::new())
            .await;
        assert!(matches!(
            result.outcome,
            FilterOutcome::Error(crate::error::GatewayError::MethodUnsupported)
        ));
    }

    /// An OPTIONS preflight against a protected resource, with no identity at
    /// all, still reaches the response-header stage instead of being
    /// redirected to login.
    #[tokio::test]
    async fn options_preflight_bypasses_authentication_and_admission() {
        let result = pipeline()
            .handle(Method::OPTIONS, Uri::from_static("/admin"), HeaderMap::new())
            .await;
        assert!(result.outcome.is_continue());
    }

    #[tokio::test]
    async fn blocked_resource_route_denies_via_deny_filter() {
        let common = FilterChain::new().push(crate::filter::MethodFilter::new([Method::GET]));
        let pipeline = Pipeline::new(
            common,
            vec![ResourceRoute {
                url_pattern: "/retired".into(),
                admission: Box::new(crate::filter::DenyFilter::new(StatusCode::GONE, "resource retired")),
            }],
            AuthenticationFilter::new(
                Arc::new(AllowProvider),
                VerifyOptions {
                    client_id: "client".into(),
                    skip_client_id_check: true,
                    skip_issuer_check: true,
                },
                true,
                false,
                Arc::new(NullStore),
                Arc::new(AesGcmCookieCodec::new(&[3u8; 32]).unwrap()),
                CookieNames::default(),
                false,
                StdDuration::from_secs(3600),
                true,
            ),
            AuthorizationFilter::new(
                Arc::new(AllowProvider),
                Arc::new(NullStore),
                Arc::new(AsyncMutex::new("pat".to_string())),
                "realm".into(),
                StdDuration::from_secs(5),
            ),
            IdentityHeaderFilter::new(CookieNames::default(), true, true, true, vec![]),
            ResponseHeaderFilter::new(vec![]),
        );
        let token = fake_jwt("user-1", Utc::now() + chrono::Duration::hours(1));
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let result = pipeline.handle(Method::GET, Uri::from_static("/retired"), headers).await;
        assert!(matches!(result.outcome, FilterOutcome::Deny { status, .. } if status == StatusCode::GONE));
    }

    #[tokio::test]
    async fn options_not_on_allow_list_is_still_rejected() {
        let common = FilterChain::new().push(crate::filter::MethodFilter::new([Method::GET]));
        let pipeline = Pipeline::new(
            common,
            vec![],
            AuthenticationFilter::new(
                Arc::new(AllowProvider),
                VerifyOptions {
                    client_id: "client".into(),
                    skip_client_id_check: true,
                    skip_issuer_check: true,
                },
                true,
                false,
                Arc::new(NullStore),
                Arc::new(AesGcmCookieCodec::new(&[3u8; 32]).unwrap()),
                CookieNames::default(),
                false,
                StdDuration::from_secs(3600),
                true,
            ),
            AuthorizationFilter::new(
                Arc::new(AllowProvider),
                Arc::new(NullStore),
                Arc::new(AsyncMutex::new("pat".to_string())),
                "realm".into(),
                StdDuration::from_secs(5),
            ),
            IdentityHeaderFilter::new(CookieNames::default(), true, true, true, vec![]),
            ResponseHeaderFilter::new(vec![]),
        );
        let result = pipeline.handle(Method::OPTIONS, Uri::from_static("/x"), HeaderMap::new()).await;
        assert!(matches!(
            result.outcome,
            FilterOutcome::Error(crate::error::GatewayError::MethodUnsupported)
        ));
    }
}
