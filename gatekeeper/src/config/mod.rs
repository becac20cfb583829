mod oidc;
mod resource;

pub use oidc::OidcConfig;
pub use resource::{ClaimMatchConfig, ResourceConfig};

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading the gateway's config file. Wiring errors
/// that depend on the provider/crypto stack (bad regex, bad cookie key,
/// malformed header names) surface later as `anyhow::Error` out of
/// `crate::runtime::build_pipeline` — this enum only covers getting the
/// YAML document off disk and into typed structs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config as YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// e.g. "0.0.0.0:8080"
    pub listen: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// e.g. "127.0.0.1:9000"
    pub addr: String,

    #[serde(default)]
    pub use_tls: bool,

    #[serde(default)]
    pub sni: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub allowed_hosts: Vec<String>,

    #[serde(default)]
    pub https_redirect: bool,

    #[serde(default)]
    pub content_security_policy: Option<String>,
}

fn default_methods() -> Vec<String> {
    ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MethodsConfig {
    #[serde(default = "default_methods")]
    pub allowed: Vec<String>,
}

impl Default for MethodsConfig {
    fn default() -> Self {
        Self {
            allowed: default_methods(),
        }
    }
}

fn default_request_id_header() -> String {
    "x-request-id".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RequestIdConfig {
    #[serde(default = "default_request_id_header")]
    pub header: String,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            header: default_request_id_header(),
        }
    }
}

fn default_access_token_duration_secs() -> u64 {
    3600
}

/// Skip-verification / refresh / login-redirect toggles for authentication.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthenticationConfig {
    #[serde(default)]
    pub skip_token_verification: bool,

    #[serde(default = "default_true")]
    pub refresh_enabled: bool,

    #[serde(default = "default_true")]
    pub login_redirect_enabled: bool,

    #[serde(default = "default_access_token_duration_secs")]
    pub default_access_token_duration_secs: u64,
}

fn default_access_cookie_name() -> String {
    "gk_access_token".to_string()
}

fn default_refresh_cookie_name() -> String {
    "gk_refresh_token".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CookiesConfig {
    #[serde(default = "default_access_cookie_name")]
    pub access_token_name: String,

    #[serde(default = "default_refresh_cookie_name")]
    pub refresh_token_name: String,

    #[serde(default = "default_true")]
    pub encryption_enabled: bool,

    /// Base64-encoded 32-byte AES-256-GCM key.
    pub encryption_key_base64: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionStoreConfig {
    /// When false, every call site sees `NullStore` rather than a
    /// scattered enabled/disabled flag.
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityHeadersConfig {
    #[serde(default = "default_true")]
    pub forward_token_header: bool,

    #[serde(default = "default_true")]
    pub forward_authorization_header: bool,

    #[serde(default)]
    pub forward_cookies: bool,

    /// Entries of the form `claim` or `claim|HeaderName`.
    #[serde(default)]
    pub custom_claims: Vec<String>,
}

impl Default for IdentityHeadersConfig {
    fn default() -> Self {
        Self {
            forward_token_header: true,
            forward_authorization_header: true,
            forward_cookies: false,
            custom_claims: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResponseHeaderConfig {
    pub name: String,
    pub value: String,
}

/// The gateway's complete configuration document. Read once at startup and
/// handed to `crate::runtime::build_pipeline` to wire the filter chain.
#[derive(Debug, Deserialize, Clone)]
pub struct GatekeeperConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub methods: MethodsConfig,

    #[serde(default)]
    pub request_id: RequestIdConfig,

    pub oidc: OidcConfig,
    pub authentication: AuthenticationConfig,
    pub cookies: CookiesConfig,

    #[serde(default)]
    pub session_store: SessionStoreConfig,

    #[serde(default)]
    pub identity_headers: IdentityHeadersConfig,

    #[serde(default)]
    pub response_headers: Vec<ResponseHeaderConfig>,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,

    /// Optional separate listener exposing the Prometheus exposition text
    /// produced by `gatekeeper_core::metrics`. `None` disables the admin
    /// listener entirely.
    #[serde(default)]
    pub metrics_listen: Option<String>,
}

impl GatekeeperConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}
