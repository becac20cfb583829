mod http_provider;

pub use http_provider::{HttpProviderConfig, HttpIdentityProvider};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Options the verifier must honor: `ClientID` plus the two skip flags.
/// Audience/issuer checks are skipped only when explicitly configured to —
/// never silently.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub client_id: String,
    pub skip_client_id_check: bool,
    pub skip_issuer_check: bool,
}

/// Typed replacement for matching on a substring of the verifier's error
/// message to distinguish "expired" from every other verification failure.
/// A provider that genuinely cannot classify its own failure should map
/// everything uncertain to `Other`, never to `Expired` — conflating the two
/// is the one mistake the refresh state machine cannot tolerate.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("token is expired")]
    Expired,
    #[error("invalid signature")]
    BadSignature,
    #[error("audience mismatch")]
    BadAudience,
    #[error("issuer mismatch")]
    BadIssuer,
    #[error("token verification failed: {0}")]
    Other(String),
}

impl VerificationError {
    pub fn is_expired(&self) -> bool {
        matches!(self, VerificationError::Expired)
    }
}

/// Claims extracted from a successfully verified token, pre-typing into
/// the subset `Identity` needs. The authentication filter is responsible
/// for assembling the full `Identity` from this plus the raw token string.
pub struct VerifiedClaims {
    pub subject: String,
    pub preferred_username: Option<String>,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub audiences: Vec<String>,
    pub roles: std::collections::HashSet<String>,
    pub groups: std::collections::HashSet<String>,
    pub permissions: serde_json::Value,
    pub claims: std::collections::HashMap<String, crate::ctx::ClaimValue>,
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token available")]
    NoRefreshToken,
    #[error("refresh token expired")]
    RefreshTokenExpired,
    #[error("refresh request failed: {0}")]
    Other(String),
}

/// Outputs of a successful refresh.
pub struct RefreshedTokens {
    pub access_token: String,
    /// `None` when the provider did not rotate the refresh token.
    pub refresh_token: Option<String>,
    pub access_expires_at: DateTime<Utc>,
    /// `None` when the provider did not report a refresh-token lifetime;
    /// the authentication filter falls back to parsing `exp` out of the
    /// refresh token itself, then to a configured default.
    pub refresh_expires_in: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Allowed,
    Denied,
    Undecided,
}

/// Non-fatal classification errors the authorization backend may report
/// alongside a decision. These are logged at info level and never escalate
/// into a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationClassification {
    PermissionNotInToken,
    ResourceRetrieveFailure,
    NoIdpResourceForPath,
    ResourceIdAbsent,
    TokenScopeMismatch,
}

pub struct AuthorizeOutcome {
    pub decision: AuthorizationDecision,
    pub classification: Option<AuthorizationClassification>,
}

/// The identity-provider interface the core requires. OIDC discovery/JWKS
/// fetching themselves are out of scope — a concrete implementation owns
/// that; the core only calls through this trait.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(
        &self,
        raw_token: &str,
        opts: &VerifyOptions,
    ) -> Result<VerifiedClaims, VerificationError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError>;

    #[allow(clippy::too_many_arguments)]
    async fn authorize(
        &self,
        permissions: &serde_json::Value,
        request_url: &str,
        realm: &str,
        timeout: Duration,
        provider_access_token: &str,
    ) -> AuthorizeOutcome;

    /// The location to redirect an unauthenticated/denied client to.
    fn authorize_endpoint(&self, state: &str) -> String;
}
