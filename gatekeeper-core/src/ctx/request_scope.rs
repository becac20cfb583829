use http::{HeaderMap, Method, Uri};

use crate::ctx::identity::Identity;

/// Shared per-request state carrier threaded through the filter chain.
///
/// Exactly one scope exists per request and it is never shared across
/// requests — it is created fresh by the entry filter and dropped
/// when the response completes.
#[derive(Debug)]
pub struct RequestScope {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,

    /// Captured by the entry filter before URL normalization, restored
    /// onto the request after the chain returns.
    pub original_path: String,
    pub original_raw_path: String,

    pub identity: Option<Identity>,
    pub access_denied: bool,
    pub request_id: Option<String>,

    /// Headers accumulated by filters (security headers, configured
    /// response headers, Set-Cookie) to be written onto the response the
    /// chain ultimately produces. Kept separate from `headers`, which is
    /// the outbound request as forwarded to the upstream.
    pub response_headers: HeaderMap,
}

impl RequestScope {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        let original_path = uri.path().to_string();
        let original_raw_path = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());

        Self {
            method,
            uri,
            headers,
            original_path,
            original_raw_path,
            identity: None,
            access_denied: false,
            request_id: None,
            response_headers: HeaderMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn mark_denied(&mut self) {
        self.access_denied = true;
    }

    /// Appends rather than replaces, since `Set-Cookie` may legally appear
    /// more than once.
    pub fn push_response_header(&mut self, name: http::HeaderName, value: http::HeaderValue) {
        self.response_headers.append(name, value);
    }
}

/// Result of running a single filter, or the whole chain, against a scope.
///
/// A `Continue`/`Respond`/`Error`-style split, generalized to the outcomes
/// the filter chain needs to express.
#[derive(Debug)]
pub enum FilterOutcome {
    /// Proceed to the next filter (or, for the last filter, to the upstream
    /// forwarder).
    Continue,

    /// Redirect the client (303) to the identity provider's authorization
    /// endpoint. Used by authentication/authorization for
    /// `Unauthenticated`/`RefreshExhausted`/`Denied`.
    RedirectLogin {
        location: String,
        clear_cookies: bool,
    },

    /// A plain protocol redirect (e.g. HTTP → HTTPS upgrade), distinct from
    /// `RedirectLogin` in that it carries no login semantics.
    Redirect {
        status: http::StatusCode,
        location: String,
    },

    /// Terminate the request with a fixed status and no upstream dispatch.
    Deny { status: http::StatusCode, reason: String },

    /// A failure that could not be classified into the above and must
    /// invoke the internal-error handler.
    Error(crate::error::GatewayError),
}

impl FilterOutcome {
    pub fn is_continue(&self) -> bool {
        matches!(self, FilterOutcome::Continue)
    }
}
