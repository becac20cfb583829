use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};

use crate::cookie::{self, CookieCodec, CookieNames};
use crate::ctx::{ClaimValue, FilterOutcome, Identity, RequestScope};
use crate::error::GatewayError;
use crate::filter::Filter;
use crate::provider::{IdentityProvider, RefreshError, VerificationError, VerifiedClaims, VerifyOptions};
use crate::store::SessionStore;

/// The central authentication filter. Derives an `Identity` from the
/// request's bearer token, verifying it against the configured provider
/// (or, in skip-verification mode, trusting its claims outright) and
/// transparently refreshing an expired access token.
pub struct AuthenticationFilter {
    provider: Arc<dyn IdentityProvider>,
    verify_options: VerifyOptions,
    skip_verification: bool,
    refresh_enabled: bool,
    store: Arc<dyn SessionStore>,
    cookie_codec: Arc<dyn CookieCodec>,
    cookie_names: CookieNames,
    cookie_encryption_enabled: bool,
    default_access_token_duration: StdDuration,
    login_redirect_enabled: bool,
}

impl AuthenticationFilter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        verify_options: VerifyOptions,
        skip_verification: bool,
        refresh_enabled: bool,
        store: Arc<dyn SessionStore>,
        cookie_codec: Arc<dyn CookieCodec>,
        cookie_names: CookieNames,
        cookie_encryption_enabled: bool,
        default_access_token_duration: StdDuration,
        login_redirect_enabled: bool,
    ) -> Self {
        Self {
            provider,
            verify_options,
            skip_verification,
            refresh_enabled,
            store,
            cookie_codec,
            cookie_names,
            cookie_encryption_enabled,
            default_access_token_duration,
            login_redirect_enabled,
        }
    }

    fn extract_raw_token(&self, scope: &RequestScope) -> Option<String> {
        if let Some(bearer) = scope
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        {
            return Some(bearer.to_string());
        }

        let cookie_header = scope.headers.get(http::header::COOKIE)?.to_str().ok()?;
        cookie_header.split(';').map(str::trim).find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            if name.trim() != self.cookie_names.access_token {
                return None;
            }
            self.cookie_codec.decode(value.trim()).ok()
        })
    }

    fn unauthenticated_outcome(&self, scope: &mut RequestScope, clear_cookies: bool) -> FilterOutcome {
        if clear_cookies {
            for set_cookie in cookie::clear_all_cookies(&self.cookie_names) {
                if let Ok(value) = http::HeaderValue::from_str(&set_cookie) {
                    scope.push_response_header(http::header::SET_COOKIE, value);
                }
            }
        }

        if !self.login_redirect_enabled {
            let error = if clear_cookies {
                GatewayError::RefreshExhausted
            } else {
                GatewayError::Unauthenticated
            };
            return FilterOutcome::Error(error);
        }

        let state = scope.request_id.clone().unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
        FilterOutcome::RedirectLogin {
            location: self.provider.authorize_endpoint(&state),
            clear_cookies,
        }
    }

    async fn perform_refresh(&self, scope: &mut RequestScope, identity: &mut Identity) -> Result<(), FilterOutcome> {
        let refresh_token = match self.locate_refresh_token(scope, identity).await {
            Some(token) => token,
            None => return Err(self.unauthenticated_outcome(scope, false)),
        };

        let refreshed = match self.provider.refresh(&refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(RefreshError::RefreshTokenExpired) => return Err(self.unauthenticated_outcome(scope, true)),
            Err(_) => return Err(self.unauthenticated_outcome(scope, false)),
        };

        let access_max_age = refreshed.access_expires_at - Utc::now();

        let access_cookie_value = if self.cookie_encryption_enabled {
            match self.cookie_codec.encode(&refreshed.access_token) {
                Ok(v) => v,
                Err(e) => {
                    return Err(FilterOutcome::Error(GatewayError::Internal(format!(
                        "cookie encryption failed: {e}"
                    ))));
                }
            }
        } else {
            refreshed.access_token.clone()
        };
        if let Ok(value) = http::HeaderValue::from_str(&cookie::access_token_cookie(
            &self.cookie_names,
            &access_cookie_value,
            access_max_age,
        )) {
            scope.push_response_header(http::header::SET_COOKIE, value);
        }

        if let Some(new_refresh) = &refreshed.refresh_token {
            let refresh_ttl = refreshed
                .refresh_expires_in
                .or_else(|| decode_unverified_exp(new_refresh).and_then(|exp| (exp - Utc::now()).to_std().ok()))
                .unwrap_or(self.default_access_token_duration);

            let encrypted = if self.cookie_encryption_enabled {
                match self.cookie_codec.encode(new_refresh) {
                    Ok(v) => v,
                    Err(e) => {
                        return Err(FilterOutcome::Error(GatewayError::Internal(format!(
                            "cookie encryption failed: {e}"
                        ))));
                    }
                }
            } else {
                new_refresh.clone()
            };

            if self.store.is_enabled() {
                let store = Arc::clone(&self.store);
                let old_key = identity.raw_token.clone();
                let new_key = refreshed.access_token.clone();
                let encrypted_bytes = encrypted.into_bytes();
                tokio::spawn(async move {
                    if let Err(e) = store.delete_refresh_token(&old_key).await {
                        tracing::warn!(error = %e, "failed to delete rotated refresh token");
                    }
                    if let Err(e) = store.store_refresh_token(&new_key, encrypted_bytes, refresh_ttl).await {
                        tracing::warn!(error = %e, "failed to store rotated refresh token");
                    }
                });
            } else if let Ok(value) = http::HeaderValue::from_str(&cookie::refresh_token_cookie(
                &self.cookie_names,
                &encrypted,
                chrono::Duration::from_std(refresh_ttl).unwrap_or(chrono::Duration::zero()),
            )) {
                scope.push_response_header(http::header::SET_COOKIE, value);
            }
        }

        identity.raw_token = refreshed.access_token;
        identity.expires_at = refreshed.access_expires_at;
        Ok(())
    }

    async fn locate_refresh_token(&self, scope: &RequestScope, identity: &Identity) -> Option<String> {
        if self.store.is_enabled() {
            if let Ok(Some(encrypted)) = self.store.get_refresh_token(&identity.raw_token).await {
                let encrypted = String::from_utf8(encrypted).ok()?;
                return self.cookie_codec.decode(&encrypted).ok();
            }
            return None;
        }

        let cookie_header = scope.headers.get(http::header::COOKIE)?.to_str().ok()?;
        cookie_header.split(';').map(str::trim).find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            if name.trim() != self.cookie_names.refresh_token {
                return None;
            }
            self.cookie_codec.decode(value.trim()).ok()
        })
    }
}

#[async_trait]
impl Filter for AuthenticationFilter {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn on_request(&self, scope: &mut RequestScope) -> FilterOutcome {
        let Some(raw_token) = self.extract_raw_token(scope) else {
            return self.unauthenticated_outcome(scope, false);
        };

        let identity = if self.skip_verification {
            let Some(claims) = decode_unverified_claims(&raw_token) else {
                return self.unauthenticated_outcome(scope, false);
            };
            if claims.expires_at <= Utc::now() {
                return self.unauthenticated_outcome(scope, false);
            }
            build_identity(raw_token, claims)
        } else {
            match self.provider.verify(&raw_token, &self.verify_options).await {
                Ok(claims) => build_identity(raw_token, claims.into()),
                Err(err) if !err.is_expired() => {
                    return FilterOutcome::Error(GatewayError::Forbidden(err.to_string()));
                }
                Err(_) => {
                    if !self.refresh_enabled {
                        return self.unauthenticated_outcome(scope, false);
                    }

                    // The only verified fact at this point is the (now
                    // rejected) token's own unverified claims — reuse them
                    // to keep the identity's roles/groups/claims in place
                    // across the refresh, per the raw-token/expiry-only
                    // mutation the refresh path performs.
                    let Some(claims) = decode_unverified_claims(&raw_token) else {
                        return self.unauthenticated_outcome(scope, false);
                    };
                    let mut identity = build_identity(raw_token, claims);
                    if let Err(outcome) = self.perform_refresh(scope, &mut identity).await {
                        return outcome;
                    }
                    identity
                }
            }
        };

        scope.identity = Some(identity);
        FilterOutcome::Continue
    }
}

struct UnverifiedClaims {
    subject: String,
    preferred_username: Option<String>,
    email: Option<String>,
    expires_at: DateTime<Utc>,
    audiences: Vec<String>,
    roles: HashSet<String>,
    groups: HashSet<String>,
    permissions: serde_json::Value,
    claims: HashMap<String, ClaimValue>,
}

/// Decodes a JWT's payload segment without checking its signature. Used
/// only where the pipeline is explicitly configured not to verify (skip
/// mode), or to recover the claims of a token the verifier has already
/// rejected so a refresh can carry them forward unchanged.
fn decode_unverified_claims(raw_token: &str) -> Option<UnverifiedClaims> {
    let payload_segment = raw_token.split('.').nth(1)?;
    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_segment).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&payload_bytes).ok()?;

    let exp = claims.get("exp")?.as_i64()?;
    let expires_at = Utc.timestamp_opt(exp, 0).single()?;
    let subject = claims.get("sub")?.as_str()?.to_string();

    let roles = string_set(&claims, "roles");
    let groups = string_set(&claims, "groups");
    let audiences = match claims.get("aud") {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => vec![],
    };

    let mut typed_claims = HashMap::new();
    if let serde_json::Value::Object(map) = &claims {
        for (k, v) in map {
            typed_claims.insert(k.clone(), ClaimValue::from_json(v.clone()));
        }
    }

    Some(UnverifiedClaims {
        subject,
        preferred_username: claims.get("preferred_username").and_then(|v| v.as_str()).map(str::to_string),
        email: claims.get("email").and_then(|v| v.as_str()).map(str::to_string),
        expires_at,
        audiences,
        roles,
        groups,
        permissions: claims.get("authorization").cloned().unwrap_or(serde_json::Value::Null),
        claims: typed_claims,
    })
}

fn string_set(claims: &serde_json::Value, key: &str) -> HashSet<String> {
    claims
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn decode_unverified_exp(raw_token: &str) -> Option<DateTime<Utc>> {
    decode_unverified_claims(raw_token).map(|c| c.expires_at)
}

fn build_identity(raw_token: String, claims: UnverifiedClaims) -> Identity {
    Identity {
        subject: claims.subject,
        preferred_username: claims.preferred_username,
        email: claims.email,
        expires_at: claims.expires_at,
        raw_token,
        audiences: claims.audiences,
        roles: claims.roles,
        groups: claims.groups,
        permissions: claims.permissions,
        claims: claims.claims,
    }
}

impl From<VerifiedClaims> for UnverifiedClaims {
    fn from(v: VerifiedClaims) -> Self {
        Self {
            subject: v.subject,
            preferred_username: v.preferred_username,
            email: v.email,
            expires_at: v.expires_at,
            audiences: v.audiences,
            roles: v.roles,
            groups: v.groups,
            permissions: v.permissions,
            claims: v.claims,
        }
    }
}
