use serde::Deserialize;

fn default_provider_timeout_secs() -> u64 {
    5
}

/// The OIDC provider's endpoints and this proxy's client credentials.
/// Discovery itself (resolving these from `/.well-known/openid-configuration`)
/// is out of scope; this struct holds what discovery would have resolved.
#[derive(Debug, Deserialize, Clone)]
pub struct OidcConfig {
    pub issuer: String,
    pub jwks_uri: String,
    pub token_endpoint: String,
    pub authorize_endpoint: String,
    pub authorization_query_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub realm: String,

    #[serde(default)]
    pub skip_client_id_check: bool,

    #[serde(default)]
    pub skip_issuer_check: bool,

    /// Process-wide credential used to call the provider's authorization
    /// endpoint. In production this is rotated out-of-band by an external
    /// collaborator; the value configured here only seeds the shared cell
    /// at startup.
    #[serde(default)]
    pub provider_access_token: String,

    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
}
