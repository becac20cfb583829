mod default_codec;

pub use default_codec::AesGcmCookieCodec;

use http::HeaderMap;

/// Names of the cookies the authentication filter manages. Immutable after
/// configuration load.
#[derive(Debug, Clone)]
pub struct CookieNames {
    pub access_token: String,
    pub refresh_token: String,
}

impl Default for CookieNames {
    fn default() -> Self {
        Self {
            access_token: "gk_access_token".to_string(),
            refresh_token: "gk_refresh_token".to_string(),
        }
    }
}

/// Cookie primitives the core consumes. Cookie encryption itself is out of
/// scope — this trait is the seam a concrete cipher is plugged in through.
pub trait CookieCodec: Send + Sync {
    fn encode(&self, plaintext: &str) -> Result<String, CookieError>;
    fn decode(&self, ciphertext: &str) -> Result<String, CookieError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("cookie encryption failed: {0}")]
    Encrypt(String),
    #[error("cookie decryption failed: {0}")]
    Decrypt(String),
}

/// Build the `Set-Cookie` value for the access-token cookie.
pub fn access_token_cookie(names: &CookieNames, value: &str, max_age: chrono::Duration) -> String {
    build_cookie(&names.access_token, value, max_age)
}

/// Build the `Set-Cookie` value for the refresh-token cookie.
pub fn refresh_token_cookie(names: &CookieNames, value: &str, max_age: chrono::Duration) -> String {
    build_cookie(&names.refresh_token, value, max_age)
}

fn build_cookie(name: &str, value: &str, max_age: chrono::Duration) -> String {
    cookie::Cookie::build((name, value.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(cookie::SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(max_age.num_seconds().max(0)))
        .build()
        .to_string()
}

/// Build a `Set-Cookie` header that immediately expires the named cookie —
/// used by `clear_all_cookies`.
pub fn expire_cookie(name: &str) -> String {
    cookie::Cookie::build((name, ""))
        .path("/")
        .max_age(cookie::time::Duration::seconds(-1))
        .build()
        .to_string()
}

/// Clear every cookie the gateway knows about — used when a refresh-token
/// failure forces the client back through the login flow.
pub fn clear_all_cookies(names: &CookieNames) -> Vec<String> {
    vec![expire_cookie(&names.access_token), expire_cookie(&names.refresh_token)]
}

/// Strip the configured cookies from the forwarded request's `Cookie`
/// header (`filterCookies`). Used when cookie forwarding to
/// the upstream is disabled.
pub fn filter_cookies(headers: &mut HeaderMap, names: &CookieNames) {
    let Some(raw) = headers.get(http::header::COOKIE).and_then(|v| v.to_str().ok()) else {
        return;
    };

    let kept: Vec<&str> = raw
        .split(';')
        .map(str::trim)
        .filter(|pair| {
            let name = pair.split('=').next().unwrap_or("").trim();
            name != names.access_token && name != names.refresh_token
        })
        .collect();

    if kept.is_empty() {
        headers.remove(http::header::COOKIE);
    } else if let Ok(value) = http::HeaderValue::from_str(&kept.join("; ")) {
        headers.insert(http::header::COOKIE, value);
    }
}
