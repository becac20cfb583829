use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::ctx::ClaimValue;
use crate::provider::{
    AuthorizationClassification, AuthorizationDecision, AuthorizeOutcome, IdentityProvider,
    RefreshError, RefreshedTokens, VerificationError, VerifiedClaims, VerifyOptions,
};

/// Configuration for the default HTTP-backed `IdentityProvider`. OIDC
/// discovery is assumed to already have resolved these endpoints; this
/// struct only holds the narrow interface the core needs.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    pub issuer: String,
    pub jwks_uri: String,
    pub token_endpoint: String,
    pub authorize_endpoint: String,
    pub authorization_query_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub realm: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

struct JwksCache {
    keys: RwLock<HashMap<String, Jwk>>,
}

impl JwksCache {
    fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, kid: &str, jwks_uri: &str, client: &reqwest::Client) -> Option<DecodingKey> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Self::to_decoding_key(key);
        }

        self.refresh(jwks_uri, client).await;
        self.keys
            .read()
            .await
            .get(kid)
            .and_then(Self::to_decoding_key)
    }

    async fn refresh(&self, jwks_uri: &str, client: &reqwest::Client) {
        let Ok(resp) = client.get(jwks_uri).send().await else {
            return;
        };
        let Ok(body) = resp.json::<JwksResponse>().await else {
            return;
        };

        let mut keys = self.keys.write().await;
        for jwk in body.keys {
            if let Some(kid) = jwk.kid.clone() {
                keys.insert(kid, jwk);
            }
        }
    }

    fn to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
        match jwk.kty.as_str() {
            "RSA" => DecodingKey::from_rsa_components(jwk.n.as_deref()?, jwk.e.as_deref()?).ok(),
            _ => None,
        }
    }
}

/// Default, network-backed `IdentityProvider`: verifies tokens against a
/// JWKS endpoint with `jsonwebtoken`, and calls the provider's token and
/// authorization endpoints with `reqwest`.
pub struct HttpIdentityProvider {
    config: HttpProviderConfig,
    client: reqwest::Client,
    jwks: Arc<JwksCache>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    refresh_expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct AuthzResponse {
    allowed: bool,
    #[serde(default)]
    classification: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            jwks: Arc::new(JwksCache::new()),
        }
    }

    fn classify(err: &jsonwebtoken::errors::Error) -> VerificationError {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            ErrorKind::InvalidSignature => VerificationError::BadSignature,
            ErrorKind::InvalidAudience => VerificationError::BadAudience,
            ErrorKind::InvalidIssuer => VerificationError::BadIssuer,
            other => VerificationError::Other(format!("{other:?}")),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify(
        &self,
        raw_token: &str,
        opts: &VerifyOptions,
    ) -> Result<VerifiedClaims, VerificationError> {
        let header = decode_header(raw_token)
            .map_err(|e| VerificationError::Other(format!("malformed header: {e}")))?;

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| VerificationError::Other("token missing 'kid'".into()))?;

        let key = self
            .jwks
            .get(kid, &self.config.jwks_uri, &self.client)
            .await
            .ok_or_else(|| VerificationError::Other("unknown signing key".into()))?;

        let mut validation = Validation::new(header.alg.clone());
        validation.algorithms = vec![header.alg];
        validation.validate_exp = true;
        if opts.skip_client_id_check {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&[opts.client_id.clone()]);
        }
        if !opts.skip_issuer_check {
            validation.set_issuer(&[self.config.issuer.clone()]);
        }

        let data = decode::<serde_json::Value>(raw_token, &key, &validation)
            .map_err(|e| Self::classify(&e))?;

        let claims = data.claims;
        let exp = claims
            .get("exp")
            .and_then(|v| v.as_i64())
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .ok_or_else(|| VerificationError::Other("missing 'exp' claim".into()))?;

        let subject = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .ok_or_else(|| VerificationError::Other("missing 'sub' claim".into()))?
            .to_string();

        let roles = claims
            .get("roles")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let groups = claims
            .get("groups")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let audiences = claims
            .get("aud")
            .map(|v| match v {
                serde_json::Value::String(s) => vec![s.clone()],
                serde_json::Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                _ => vec![],
            })
            .unwrap_or_default();

        let mut typed_claims = HashMap::new();
        if let serde_json::Value::Object(map) = &claims {
            for (k, v) in map {
                typed_claims.insert(k.clone(), ClaimValue::from_json(v.clone()));
            }
        }

        Ok(VerifiedClaims {
            subject,
            preferred_username: claims
                .get("preferred_username")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            email: claims.get("email").and_then(|v| v.as_str()).map(str::to_string),
            expires_at: exp,
            audiences,
            roles,
            groups,
            permissions: claims.get("authorization").cloned().unwrap_or(serde_json::Value::Null),
            claims: typed_claims,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let resp = self
            .client
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| RefreshError::Other(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::BAD_REQUEST
            || resp.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(RefreshError::RefreshTokenExpired);
        }

        if !resp.status().is_success() {
            return Err(RefreshError::Other(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| RefreshError::Other(e.to_string()))?;

        let expires_in = body.expires_in.unwrap_or(0).max(0);
        let access_expires_at: DateTime<Utc> = Utc::now() + chrono::Duration::seconds(expires_in);

        Ok(RefreshedTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            access_expires_at,
            refresh_expires_in: body
                .refresh_expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| StdDuration::from_secs(secs as u64)),
        })
    }

    async fn authorize(
        &self,
        permissions: &serde_json::Value,
        request_url: &str,
        realm: &str,
        timeout: StdDuration,
        provider_access_token: &str,
    ) -> AuthorizeOutcome {
        let body = serde_json::json!({
            "permissions": permissions,
            "resource": request_url,
            "realm": realm,
        });

        let result = self
            .client
            .post(&self.config.authorization_query_endpoint)
            .bearer_auth(provider_access_token)
            .timeout(timeout)
            .json(&body)
            .send()
            .await;

        let Ok(resp) = result else {
            return AuthorizeOutcome {
                decision: AuthorizationDecision::Undecided,
                classification: Some(AuthorizationClassification::ResourceRetrieveFailure),
            };
        };

        if !resp.status().is_success() {
            return AuthorizeOutcome {
                decision: AuthorizationDecision::Denied,
                classification: Some(AuthorizationClassification::NoIdpResourceForPath),
            };
        }

        let Ok(parsed) = resp.json::<AuthzResponse>().await else {
            return AuthorizeOutcome {
                decision: AuthorizationDecision::Undecided,
                classification: Some(AuthorizationClassification::ResourceRetrieveFailure),
            };
        };

        let classification = parsed.classification.as_deref().and_then(|c| match c {
            "permission_not_in_token" => Some(AuthorizationClassification::PermissionNotInToken),
            "resource_retrieve_failure" => Some(AuthorizationClassification::ResourceRetrieveFailure),
            "no_idp_resource_for_path" => Some(AuthorizationClassification::NoIdpResourceForPath),
            "resource_id_absent" => Some(AuthorizationClassification::ResourceIdAbsent),
            "token_scope_mismatch" => Some(AuthorizationClassification::TokenScopeMismatch),
            _ => None,
        });

        AuthorizeOutcome {
            decision: if parsed.allowed {
                AuthorizationDecision::Allowed
            } else {
                AuthorizationDecision::Denied
            },
            classification,
        }
    }

    fn authorize_endpoint(&self, state: &str) -> String {
        let encode = |v: &str| url::form_urlencoded::byte_serialize(v.as_bytes()).collect::<String>();
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&state={}",
            self.config.authorize_endpoint,
            encode(&self.config.client_id),
            encode(&self.config.redirect_uri),
            encode(state),
        )
    }
}
