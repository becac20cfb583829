use async_trait::async_trait;
use http::{HeaderName, HeaderValue, StatusCode};

use crate::ctx::{FilterOutcome, RequestScope};
use crate::filter::Filter;

/// Host allow-listing, the plaintext→HTTPS redirect, and the fixed set of
/// hardening response headers.
pub struct SecurityHeaderFilter {
    allowed_hosts: Vec<String>,
    https_redirect: bool,
    content_security_policy: Option<String>,
}

impl SecurityHeaderFilter {
    pub fn new(allowed_hosts: Vec<String>, https_redirect: bool, content_security_policy: Option<String>) -> Self {
        Self {
            allowed_hosts,
            https_redirect,
            content_security_policy,
        }
    }

    fn is_https(&self, scope: &RequestScope) -> bool {
        scope
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .map(|proto| proto.eq_ignore_ascii_case("https"))
            .unwrap_or(false)
    }

    fn host(scope: &RequestScope) -> Option<&str> {
        scope.headers.get(http::header::HOST).and_then(|v| v.to_str().ok())
    }
}

#[async_trait]
impl Filter for SecurityHeaderFilter {
    fn name(&self) -> &'static str {
        "security"
    }

    async fn on_request(&self, scope: &mut RequestScope) -> FilterOutcome {
        if !self.allowed_hosts.is_empty() {
            let host = Self::host(scope).map(|h| h.split(':').next().unwrap_or(h).to_string());
            let allowed = host.as_deref().map(|h| self.allowed_hosts.iter().any(|a| a == h)).unwrap_or(false);
            if !allowed {
                scope.mark_denied();
                return FilterOutcome::Deny {
                    status: StatusCode::FORBIDDEN,
                    reason: "host not allowed".into(),
                };
            }
        }

        if self.https_redirect && !self.is_https(scope) {
            let Some(host) = Self::host(scope) else {
                scope.mark_denied();
                return FilterOutcome::Deny {
                    status: StatusCode::BAD_REQUEST,
                    reason: "missing host header for https redirect".into(),
                };
            };
            let location = format!("https://{host}{}", scope.original_raw_path);
            return FilterOutcome::Redirect {
                status: StatusCode::MOVED_PERMANENTLY,
                location,
            };
        }

        scope.push_response_header(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        );
        scope.push_response_header(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY"));
        scope.push_response_header(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        );
        if let Some(csp) = &self.content_security_policy {
            if let Ok(value) = HeaderValue::from_str(csp) {
                scope.push_response_header(HeaderName::from_static("content-security-policy"), value);
            }
        }
        if self.is_https(scope) {
            scope.push_response_header(
                HeaderName::from_static("strict-transport-security"),
                HeaderValue::from_static("max-age=63072000; includeSubDomains"),
            );
        }

        FilterOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Uri};

    fn scope_with_host(host: &str) -> RequestScope {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::HOST, HeaderValue::from_str(host).unwrap());
        RequestScope::new(Method::GET, Uri::from_static("/x"), headers)
    }

    #[tokio::test]
    async fn denies_host_not_in_allow_list() {
        let filter = SecurityHeaderFilter::new(vec!["good.example".into()], false, None);
        let mut scope = scope_with_host("evil.example");
        let outcome = filter.on_request(&mut scope).await;
        assert!(matches!(outcome, FilterOutcome::Deny { status, .. } if status == StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn redirects_plaintext_to_https() {
        let filter = SecurityHeaderFilter::new(vec![], true, None);
        let mut scope = scope_with_host("good.example");
        let outcome = filter.on_request(&mut scope).await;
        match outcome {
            FilterOutcome::Redirect { status, location } => {
                assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
                assert_eq!(location, "https://good.example/x");
            }
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sets_hardening_headers_when_already_https() {
        let filter = SecurityHeaderFilter::new(vec![], true, None);
        let mut scope = scope_with_host("good.example");
        scope
            .headers
            .insert("x-forwarded-proto", HeaderValue::from_static("https"));
        let outcome = filter.on_request(&mut scope).await;
        assert!(outcome.is_continue());
        assert!(scope.response_headers.contains_key("x-content-type-options"));
        assert!(scope.response_headers.contains_key("strict-transport-security"));
    }
}
