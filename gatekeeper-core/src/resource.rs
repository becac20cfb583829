use regex::Regex;

/// Static description of a protected URL prefix.
/// Immutable after configuration load; one admission filter instance is
/// built per resource.
#[derive(Debug, Clone)]
pub struct Resource {
    pub url_pattern: String,
    pub required_roles: Vec<String>,
    pub require_any_role: bool,
    pub required_groups: Vec<String>,
}

/// A single `claim-name -> regex` admission rule, compiled once at
/// construction.
#[derive(Debug, Clone)]
pub struct ClaimMatch {
    pub claim: String,
    pub pattern: Regex,
}

impl ClaimMatch {
    pub fn compile(claim: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            claim: claim.into(),
            pattern: Regex::new(pattern)?,
        })
    }
}

/// `hasAccess` predicate shared by role and group checks:
///
/// accepts iff `(require_all && required ⊆ actual) || (!require_all &&
/// (required.is_empty() || required ∩ actual ≠ ∅))`.
pub fn has_access(required: &[String], actual: &std::collections::HashSet<String>, require_all: bool) -> bool {
    if required.is_empty() {
        return true;
    }

    if require_all {
        required.iter().all(|r| actual.contains(r))
    } else {
        required.iter().any(|r| actual.contains(r))
    }
}
