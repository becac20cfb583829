use async_trait::async_trait;
use http::{HeaderName, HeaderValue};

use crate::cookie::{self, CookieNames};
use crate::ctx::{ClaimValue, FilterOutcome, RequestScope};
use crate::error::GatewayError;
use crate::filter::Filter;

/// A custom claim-to-header mapping entry: `claim` alone, or `claim|Header`
/// with an explicit header name override.
#[derive(Debug, Clone)]
pub struct ClaimHeaderMapping {
    pub claim: String,
    pub header: Option<String>,
}

impl ClaimHeaderMapping {
    pub fn parse(entry: &str) -> Self {
        match entry.split_once('|') {
            Some((claim, header)) => Self {
                claim: claim.to_string(),
                header: Some(header.to_string()),
            },
            None => Self {
                claim: entry.to_string(),
                header: None,
            },
        }
    }

    fn header_name(&self) -> String {
        match &self.header {
            Some(h) => h.clone(),
            None => format!("X-Auth-{}", title_case(&self.claim)),
        }
    }
}

fn title_case(claim: &str) -> String {
    claim
        .split(['_', '-'])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Injects `X-Auth-*` headers derived from the verified identity onto the
/// request forwarded to the upstream.
pub struct IdentityHeaderFilter {
    cookie_names: CookieNames,
    forward_token_header: bool,
    forward_authorization_header: bool,
    forward_cookies: bool,
    custom_claims: Vec<ClaimHeaderMapping>,
}

impl IdentityHeaderFilter {
    pub fn new(
        cookie_names: CookieNames,
        forward_token_header: bool,
        forward_authorization_header: bool,
        forward_cookies: bool,
        custom_claims: Vec<ClaimHeaderMapping>,
    ) -> Self {
        Self {
            cookie_names,
            forward_token_header,
            forward_authorization_header,
            forward_cookies,
            custom_claims,
        }
    }

    fn set(headers: &mut http::HeaderMap, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
            headers.insert(name, value);
        }
    }
}

#[async_trait]
impl Filter for IdentityHeaderFilter {
    fn name(&self) -> &'static str {
        "identity_header"
    }

    async fn on_request(&self, scope: &mut RequestScope) -> FilterOutcome {
        let Some(identity) = scope.identity.clone() else {
            return FilterOutcome::Error(GatewayError::Internal(
                "identity header filter ran without a verified identity".into(),
            ));
        };

        Self::set(&mut scope.headers, "X-Auth-Subject", &identity.subject);
        Self::set(&mut scope.headers, "X-Auth-Userid", &identity.subject);
        Self::set(
            &mut scope.headers,
            "X-Auth-Username",
            identity.preferred_username.as_deref().unwrap_or(""),
        );
        Self::set(&mut scope.headers, "X-Auth-Email", identity.email.as_deref().unwrap_or(""));
        Self::set(&mut scope.headers, "X-Auth-Audience", &identity.audiences.join(","));
        Self::set(
            &mut scope.headers,
            "X-Auth-ExpiresIn",
            &identity.expires_at.to_rfc3339(),
        );
        Self::set(&mut scope.headers, "X-Auth-Groups", &identity.groups_ordered().join(","));
        Self::set(&mut scope.headers, "X-Auth-Roles", &identity.roles_ordered().join(","));

        if self.forward_token_header {
            Self::set(&mut scope.headers, "X-Auth-Token", &identity.raw_token);
        }
        if self.forward_authorization_header {
            Self::set(&mut scope.headers, "Authorization", &format!("Bearer {}", identity.raw_token));
        }

        for mapping in &self.custom_claims {
            let value = match identity.claim(&mapping.claim) {
                Some(ClaimValue::String(s)) => Some(s.clone()),
                Some(ClaimValue::Strings(items)) => Some(items.join(",")),
                Some(ClaimValue::Other(_)) | None => None,
            };
            if let Some(value) = value {
                Self::set(&mut scope.headers, &mapping.header_name(), &value);
            }
        }

        if !self.forward_cookies {
            cookie::filter_cookies(&mut scope.headers, &self.cookie_names);
        }

        FilterOutcome::Continue
    }
}
