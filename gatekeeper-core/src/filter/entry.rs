use std::time::Duration;

use http::uri::PathAndQuery;
use http::{HeaderMap, Method, Uri};

use crate::ctx::RequestScope;
use crate::normalization::{normalize_path, rebuild_raw_path};

/// The first stage of the pipeline. Unlike the other nine filters, the
/// entry filter doesn't implement `Filter`: it runs *around* the chain
/// rather than as a step inside it — it builds the scope the rest of the
/// chain operates on, and records metrics once the chain (and whatever ran
/// after it) has produced a final status.
pub struct EntryFilter;

impl EntryFilter {
    /// Build a fresh scope for an inbound request and normalize its path.
    /// The scope retains the pre-normalization path/raw-path so callers can
    /// restore them on the request object once the chain returns.
    pub fn open(method: Method, uri: Uri, headers: HeaderMap) -> RequestScope {
        let mut scope = RequestScope::new(method, uri, headers);

        let normalized_path = normalize_path(scope.uri.path());
        let raw_path = rebuild_raw_path(&normalized_path, scope.uri.query());

        if let Ok(path_and_query) = PathAndQuery::try_from(raw_path.as_str()) {
            let mut parts = scope.uri.clone().into_parts();
            parts.path_and_query = Some(path_and_query);
            if let Ok(rebuilt) = Uri::from_parts(parts) {
                scope.uri = rebuilt;
            }
        }

        scope
    }

    /// Restores the scope's captured pre-normalization path/raw-path onto
    /// the request so external observers (logs, upstream) see the original
    /// URL rather than the normalized one used for resource matching.
    pub fn restore_original_uri(scope: &RequestScope) -> Uri {
        let Ok(path_and_query) = PathAndQuery::try_from(scope.original_raw_path.as_str()) else {
            return scope.uri.clone();
        };
        let mut parts = scope.uri.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        Uri::from_parts(parts).unwrap_or_else(|_| scope.uri.clone())
    }

    pub fn record_metrics(method: &Method, status: http::StatusCode, elapsed: Duration) {
        crate::metrics::record_request(method, status, elapsed);
    }
}
