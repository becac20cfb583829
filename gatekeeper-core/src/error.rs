use thiserror::Error;

/// Errors surfaced by the filter pipeline.
///
/// Each variant maps to one client-visible outcome: `Unauthenticated` and
/// `RefreshExhausted` are the 401 fallback used when login-redirect is
/// disabled (both normally resolve as a `RedirectLogin` instead), `Forbidden`
/// becomes 403, `Internal` becomes 500, `MethodUnsupported` becomes 501.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no verified identity for request")]
    Unauthenticated,

    #[error("refresh token exhausted")]
    RefreshExhausted,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal failure: {0}")]
    Internal(String),

    #[error("method not implemented")]
    MethodUnsupported,
}

impl GatewayError {
    /// The HTTP status a caller without more specific handling should
    /// respond with.
    pub fn status(&self) -> http::StatusCode {
        match self {
            GatewayError::Unauthenticated | GatewayError::RefreshExhausted => http::StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => http::StatusCode::FORBIDDEN,
            GatewayError::Internal(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::MethodUnsupported => http::StatusCode::NOT_IMPLEMENTED,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}
