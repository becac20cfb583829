use async_trait::async_trait;
use http::HeaderName;

use crate::ctx::{FilterOutcome, RequestScope};
use crate::error::GatewayError;
use crate::filter::Filter;

/// Ensures every request carries a client-correlation header, generating
/// one if the client didn't send it.
pub struct RequestIdFilter {
    header: HeaderName,
}

impl RequestIdFilter {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

#[async_trait]
impl Filter for RequestIdFilter {
    fn name(&self) -> &'static str {
        "request_id"
    }

    async fn on_request(&self, scope: &mut RequestScope) -> FilterOutcome {
        if let Some(existing) = scope.headers.get(&self.header).and_then(|v| v.to_str().ok()) {
            scope.request_id = Some(existing.to_string());
            return FilterOutcome::Continue;
        }

        let generated = uuid::Uuid::now_v7().to_string();
        let Ok(value) = http::HeaderValue::from_str(&generated) else {
            return FilterOutcome::Error(GatewayError::Internal(
                "failed to encode generated request id".into(),
            ));
        };

        scope.headers.insert(self.header.clone(), value);
        scope.request_id = Some(generated);
        FilterOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Uri};

    fn header() -> HeaderName {
        HeaderName::from_static("x-request-id")
    }

    #[tokio::test]
    async fn generates_id_when_absent() {
        let filter = RequestIdFilter::new(header());
        let mut scope = RequestScope::new(Method::GET, Uri::from_static("/x"), HeaderMap::new());
        assert!(filter.on_request(&mut scope).await.is_continue());
        assert!(scope.request_id.is_some());
        assert!(scope.headers.contains_key(&header()));
    }

    #[tokio::test]
    async fn preserves_existing_id() {
        let filter = RequestIdFilter::new(header());
        let mut headers = HeaderMap::new();
        headers.insert(header(), http::HeaderValue::from_static("client-supplied"));
        let mut scope = RequestScope::new(Method::GET, Uri::from_static("/x"), headers);
        filter.on_request(&mut scope).await;
        assert_eq!(scope.request_id.as_deref(), Some("client-supplied"));
    }
}
