//! Turns a parsed `GatekeeperConfig` into a `Pipeline` — one instance of
//! every filter, wired in the fixed order the pipeline runs them. This is
//! the "runtime state" build step; the config itself stays an inert,
//! read-only document.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::{HeaderName, HeaderValue, Method, StatusCode};
use tokio::sync::Mutex as AsyncMutex;

use gatekeeper_core::cookie::{AesGcmCookieCodec, CookieNames};
use gatekeeper_core::filter::{
    AdmissionFilter, AuthenticationFilter, AuthorizationFilter, ClaimHeaderMapping, DenyFilter, FilterChain,
    IdentityHeaderFilter, MethodFilter, RequestIdFilter, ResponseHeaderFilter, SecurityHeaderFilter,
};
use gatekeeper_core::pipeline::{Pipeline, ResourceRoute};
use gatekeeper_core::provider::{HttpIdentityProvider, HttpProviderConfig, VerifyOptions};
use gatekeeper_core::resource::{ClaimMatch, Resource};
use gatekeeper_core::store::{MemoryStore, NullStore, SessionStore};

use crate::config::GatekeeperConfig;

pub fn build_pipeline(cfg: &GatekeeperConfig) -> Result<Pipeline> {
    let cookie_key = STANDARD
        .decode(&cfg.cookies.encryption_key_base64)
        .context("cookies.encryption_key_base64 is not valid base64")?;
    let cookie_codec = Arc::new(
        AesGcmCookieCodec::new(&cookie_key).context("cookies.encryption_key_base64 did not decode to a 32-byte key")?,
    );
    let cookie_names = CookieNames {
        access_token: cfg.cookies.access_token_name.clone(),
        refresh_token: cfg.cookies.refresh_token_name.clone(),
    };

    let provider = Arc::new(HttpIdentityProvider::new(HttpProviderConfig {
        issuer: cfg.oidc.issuer.clone(),
        jwks_uri: cfg.oidc.jwks_uri.clone(),
        token_endpoint: cfg.oidc.token_endpoint.clone(),
        authorize_endpoint: cfg.oidc.authorize_endpoint.clone(),
        authorization_query_endpoint: cfg.oidc.authorization_query_endpoint.clone(),
        client_id: cfg.oidc.client_id.clone(),
        client_secret: cfg.oidc.client_secret.clone(),
        redirect_uri: cfg.oidc.redirect_uri.clone(),
        realm: cfg.oidc.realm.clone(),
    }));

    let store: Arc<dyn SessionStore> = if cfg.session_store.enabled {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(NullStore)
    };

    let verify_options = VerifyOptions {
        client_id: cfg.oidc.client_id.clone(),
        skip_client_id_check: cfg.oidc.skip_client_id_check,
        skip_issuer_check: cfg.oidc.skip_issuer_check,
    };

    let authentication = AuthenticationFilter::new(
        provider.clone(),
        verify_options,
        cfg.authentication.skip_token_verification,
        cfg.authentication.refresh_enabled,
        store.clone(),
        cookie_codec,
        cookie_names.clone(),
        cfg.cookies.encryption_enabled,
        Duration::from_secs(cfg.authentication.default_access_token_duration_secs),
        cfg.authentication.login_redirect_enabled,
    );

    let authorization = AuthorizationFilter::new(
        provider,
        store,
        Arc::new(AsyncMutex::new(cfg.oidc.provider_access_token.clone())),
        cfg.oidc.realm.clone(),
        Duration::from_secs(cfg.oidc.provider_timeout_secs),
    );

    let custom_claims = cfg
        .identity_headers
        .custom_claims
        .iter()
        .map(|entry| ClaimHeaderMapping::parse(entry))
        .collect();

    let identity_header = IdentityHeaderFilter::new(
        cookie_names,
        cfg.identity_headers.forward_token_header,
        cfg.identity_headers.forward_authorization_header,
        cfg.identity_headers.forward_cookies,
        custom_claims,
    );

    let response_headers = cfg
        .response_headers
        .iter()
        .map(|h| {
            let name = HeaderName::try_from(h.name.as_str())
                .with_context(|| format!("invalid response header name '{}'", h.name))?;
            let value = HeaderValue::from_str(&h.value)
                .with_context(|| format!("invalid response header value for '{}'", h.name))?;
            Ok((name, value))
        })
        .collect::<Result<Vec<_>>>()?;
    let response_header = ResponseHeaderFilter::new(response_headers);

    let allowed_methods = cfg
        .methods
        .allowed
        .iter()
        .map(|m| m.parse::<Method>().with_context(|| format!("invalid HTTP method '{m}'")))
        .collect::<Result<Vec<_>>>()?;

    let common = FilterChain::new()
        .push(RequestIdFilter::new(
            HeaderName::try_from(cfg.request_id.header.as_str()).context("invalid request_id.header")?,
        ))
        .push(SecurityHeaderFilter::new(
            cfg.security.allowed_hosts.clone(),
            cfg.security.https_redirect,
            cfg.security.content_security_policy.clone(),
        ))
        .push(MethodFilter::new(allowed_methods));

    let mut routes = Vec::new();
    for resource_cfg in &cfg.resources {
        // Public resources skip authentication/authorization/admission/
        // identity-header entirely; they never get a route, so the
        // pipeline's resource match simply misses and treats the path as
        // unprotected.
        if resource_cfg.public {
            continue;
        }

        let claim_matches = resource_cfg
            .claim_matches
            .iter()
            .map(|m| {
                ClaimMatch::compile(m.claim.clone(), &m.pattern).with_context(|| {
                    format!(
                        "resource '{}': invalid claim pattern '{}' for claim '{}'",
                        resource_cfg.url_pattern, m.pattern, m.claim
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let admission: Box<dyn gatekeeper_core::filter::Filter> = if resource_cfg.blocked {
            Box::new(DenyFilter::new(
                StatusCode::FORBIDDEN,
                format!("resource '{}' is blocked", resource_cfg.url_pattern),
            ))
        } else {
            let resource = Resource {
                url_pattern: resource_cfg.url_pattern.clone(),
                required_roles: resource_cfg.required_roles.clone(),
                require_any_role: resource_cfg.require_any_role,
                required_groups: resource_cfg.required_groups.clone(),
            };
            Box::new(AdmissionFilter::new(resource, claim_matches))
        };

        routes.push(ResourceRoute {
            url_pattern: resource_cfg.url_pattern.clone(),
            admission,
        });
    }

    Ok(Pipeline::new(common, routes, authentication, authorization, identity_header, response_header))
}
