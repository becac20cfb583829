use serde::Deserialize;

/// A single `claim -> regex` admission rule as it appears in the config
/// file, compiled once when the pipeline is built.
#[derive(Debug, Deserialize, Clone)]
pub struct ClaimMatchConfig {
    pub claim: String,
    pub pattern: String,
}

/// One protected URL prefix and the roles/groups/claims required to reach
/// it. A resource marked `public` skips authentication/authorization/
/// admission entirely — the health-check escape hatch every gateway of
/// this shape needs.
#[derive(Debug, Deserialize, Clone)]
pub struct ResourceConfig {
    pub url_pattern: String,

    #[serde(default)]
    pub required_roles: Vec<String>,

    #[serde(default)]
    pub require_any_role: bool,

    #[serde(default)]
    pub required_groups: Vec<String>,

    #[serde(default)]
    pub public: bool,

    /// Blocks the resource outright instead of evaluating admission rules
    /// against it. Still requires authentication and authorization to pass
    /// first, same as any other protected resource.
    #[serde(default)]
    pub blocked: bool,

    #[serde(default)]
    pub claim_matches: Vec<ClaimMatchConfig>,
}
