use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

/// A claim value as it arrives inside a JWT: a plain string, an ordered
/// sequence of strings (e.g. `groups: ["a", "b"]`), or anything else
/// (numbers, booleans, nested objects) that admission rules cannot match
/// against but that callers may still want to inspect.
///
/// Modeled as a tagged variant rather than re-parsed at every call site.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    String(String),
    Strings(Vec<String>),
    Other(serde_json::Value),
}

impl ClaimValue {
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => ClaimValue::String(s),
            serde_json::Value::Array(items) => {
                let mut strings = Vec::with_capacity(items.len());
                for item in &items {
                    match item {
                        serde_json::Value::String(s) => strings.push(s.clone()),
                        _ => return ClaimValue::Other(serde_json::Value::Array(items)),
                    }
                }
                ClaimValue::Strings(strings)
            }
            other => ClaimValue::Other(other),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            ClaimValue::Strings(s) => Some(s),
            _ => None,
        }
    }
}

/// The verified principal derived from a bearer token.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: String,
    pub preferred_username: Option<String>,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub raw_token: String,
    pub audiences: Vec<String>,
    pub roles: HashSet<String>,
    pub groups: HashSet<String>,
    /// Opaque, provider-specific structure consumed only by the
    /// authorization filter when it calls the provider.
    pub permissions: serde_json::Value,
    pub claims: HashMap<String, ClaimValue>,
}

impl Identity {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn claim(&self, name: &str) -> Option<&ClaimValue> {
        self.claims.get(name)
    }

    /// Roles and groups joined in the identity's own iteration order, used
    /// by the identity-header filter to build stable comma-joined
    /// header values.
    pub fn roles_ordered(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.roles.iter().cloned().collect();
        roles.sort();
        roles
    }

    pub fn groups_ordered(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.groups.iter().cloned().collect();
        groups.sort();
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_value_classifies_string_sequence_and_other() {
        assert_eq!(
            ClaimValue::from_json(serde_json::json!("hello")),
            ClaimValue::String("hello".into())
        );
        assert_eq!(
            ClaimValue::from_json(serde_json::json!(["a", "b"])),
            ClaimValue::Strings(vec!["a".into(), "b".into()])
        );
        assert!(matches!(
            ClaimValue::from_json(serde_json::json!(42)),
            ClaimValue::Other(_)
        ));
        assert!(matches!(
            ClaimValue::from_json(serde_json::json!([1, 2])),
            ClaimValue::Other(_)
        ));
    }

    #[test]
    fn identity_expiry_is_inclusive() {
        let now = Utc::now();
        let identity = Identity {
            subject: "u1".into(),
            preferred_username: None,
            email: None,
            expires_at: now,
            raw_token: "tok".into(),
            audiences: vec![],
            roles: HashSet::new(),
            groups: HashSet::new(),
            permissions: serde_json::Value::Null,
            claims: HashMap::new(),
        };
        assert!(identity.is_expired(now));
    }
}
