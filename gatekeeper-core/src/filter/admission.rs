use async_trait::async_trait;
use http::StatusCode;

use crate::ctx::{ClaimValue, FilterOutcome, RequestScope};
use crate::error::GatewayError;
use crate::filter::Filter;
use crate::resource::{ClaimMatch, Resource, has_access};

/// One instance per protected resource. Evaluates role, group, and
/// claim-pattern requirements against the request's identity.
pub struct AdmissionFilter {
    resource: Resource,
    claim_matches: Vec<ClaimMatch>,
}

impl AdmissionFilter {
    pub fn new(resource: Resource, claim_matches: Vec<ClaimMatch>) -> Self {
        Self { resource, claim_matches }
    }

    fn forbidden(reason: impl Into<String>) -> FilterOutcome {
        FilterOutcome::Error(GatewayError::Forbidden(reason.into()))
    }
}

#[async_trait]
impl Filter for AdmissionFilter {
    fn name(&self) -> &'static str {
        "admission"
    }

    async fn on_request(&self, scope: &mut RequestScope) -> FilterOutcome {
        if scope.access_denied {
            return FilterOutcome::Continue;
        }

        let Some(identity) = &scope.identity else {
            return FilterOutcome::Error(GatewayError::Internal(
                "admission filter ran without a verified identity".into(),
            ));
        };

        let require_all_roles = !self.resource.require_any_role;
        if !has_access(&self.resource.required_roles, &identity.roles, require_all_roles) {
            return Self::forbidden("role requirements not satisfied");
        }

        if !has_access(&self.resource.required_groups, &identity.groups, false) {
            return Self::forbidden("group requirements not satisfied");
        }

        for rule in &self.claim_matches {
            let matched = match identity.claim(&rule.claim) {
                Some(ClaimValue::String(value)) => rule.pattern.is_match(value),
                Some(ClaimValue::Strings(values)) => values.iter().any(|v| rule.pattern.is_match(v)),
                Some(ClaimValue::Other(_)) => {
                    tracing::warn!(claim = %rule.claim, "claim value is neither a string nor a string sequence");
                    false
                }
                None => false,
            };
            if !matched {
                return FilterOutcome::Deny {
                    status: StatusCode::FORBIDDEN,
                    reason: format!("claim '{}' did not satisfy its match rule", rule.claim),
                };
            }
        }

        FilterOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Identity;
    use chrono::Utc;
    use http::{HeaderMap, Method, Uri};
    use std::collections::{HashMap, HashSet};

    fn identity_with(roles: &[&str], groups: &[&str], claims: HashMap<String, ClaimValue>) -> Identity {
        Identity {
            subject: "u1".into(),
            preferred_username: None,
            email: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            raw_token: "tok".into(),
            audiences: vec![],
            roles: roles.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
            groups: groups.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
            permissions: serde_json::Value::Null,
            claims,
        }
    }

    fn scope_with(identity: Identity) -> RequestScope {
        let mut scope = RequestScope::new(Method::GET, Uri::from_static("/admin"), HeaderMap::new());
        scope.identity = Some(identity);
        scope
    }

    #[tokio::test]
    async fn denies_missing_required_role() {
        let resource = Resource {
            url_pattern: "/admin".into(),
            required_roles: vec!["admin".into()],
            require_any_role: false,
            required_groups: vec![],
        };
        let filter = AdmissionFilter::new(resource, vec![]);
        let mut scope = scope_with(identity_with(&["viewer"], &[], HashMap::new()));
        let outcome = filter.on_request(&mut scope).await;
        assert!(matches!(outcome, FilterOutcome::Error(GatewayError::Forbidden(_))));
    }

    #[tokio::test]
    async fn allows_when_role_satisfied() {
        let resource = Resource {
            url_pattern: "/admin".into(),
            required_roles: vec!["admin".into()],
            require_any_role: false,
            required_groups: vec![],
        };
        let filter = AdmissionFilter::new(resource, vec![]);
        let mut scope = scope_with(identity_with(&["admin"], &[], HashMap::new()));
        assert!(filter.on_request(&mut scope).await.is_continue());
    }

    #[tokio::test]
    async fn claim_match_denies_on_missing_claim() {
        let resource = Resource {
            url_pattern: "/admin".into(),
            required_roles: vec![],
            require_any_role: false,
            required_groups: vec![],
        };
        let claim_match = ClaimMatch::compile("team", "^eng-.*").unwrap();
        let filter = AdmissionFilter::new(resource, vec![claim_match]);
        let mut scope = scope_with(identity_with(&[], &[], HashMap::new()));
        let outcome = filter.on_request(&mut scope).await;
        assert!(matches!(outcome, FilterOutcome::Deny { .. }));
    }

    #[tokio::test]
    async fn claim_match_succeeds_on_string_sequence_element() {
        let resource = Resource {
            url_pattern: "/admin".into(),
            required_roles: vec![],
            require_any_role: false,
            required_groups: vec![],
        };
        let claim_match = ClaimMatch::compile("team", "^eng-.*").unwrap();
        let mut claims = HashMap::new();
        claims.insert(
            "team".to_string(),
            ClaimValue::Strings(vec!["sales-west".into(), "eng-platform".into()]),
        );
        let filter = AdmissionFilter::new(resource, vec![claim_match]);
        let mut scope = scope_with(identity_with(&[], &[], claims));
        assert!(filter.on_request(&mut scope).await.is_continue());
    }

    #[tokio::test]
    async fn claim_match_denies_on_non_string_value() {
        let resource = Resource {
            url_pattern: "/admin".into(),
            required_roles: vec![],
            require_any_role: false,
            required_groups: vec![],
        };
        let claim_match = ClaimMatch::compile("level", "^5$").unwrap();
        let mut claims = HashMap::new();
        claims.insert("level".to_string(), ClaimValue::Other(serde_json::json!(5)));
        let filter = AdmissionFilter::new(resource, vec![claim_match]);
        let mut scope = scope_with(identity_with(&[], &[], claims));
        let outcome = filter.on_request(&mut scope).await;
        assert!(matches!(outcome, FilterOutcome::Deny { .. }));
    }

    #[tokio::test]
    async fn already_denied_scope_passes_through() {
        let resource = Resource {
            url_pattern: "/admin".into(),
            required_roles: vec!["admin".into()],
            require_any_role: false,
            required_groups: vec![],
        };
        let filter = AdmissionFilter::new(resource, vec![]);
        let mut scope = scope_with(identity_with(&[], &[], HashMap::new()));
        scope.mark_denied();
        assert!(filter.on_request(&mut scope).await.is_continue());
    }
}
