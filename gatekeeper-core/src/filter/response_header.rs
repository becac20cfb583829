use async_trait::async_trait;
use http::{HeaderName, HeaderValue};

use crate::ctx::{FilterOutcome, RequestScope};
use crate::filter::Filter;

/// Injects a fixed set of configured headers onto the response.
pub struct ResponseHeaderFilter {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl ResponseHeaderFilter {
    pub fn new(headers: Vec<(HeaderName, HeaderValue)>) -> Self {
        Self { headers }
    }
}

#[async_trait]
impl Filter for ResponseHeaderFilter {
    fn name(&self) -> &'static str {
        "response_header"
    }

    async fn on_request(&self, scope: &mut RequestScope) -> FilterOutcome {
        for (name, value) in &self.headers {
            scope.response_headers.insert(name.clone(), value.clone());
        }
        FilterOutcome::Continue
    }
}
