use std::collections::HashSet;

use async_trait::async_trait;
use http::Method;

use crate::ctx::{FilterOutcome, RequestScope};
use crate::error::GatewayError;
use crate::filter::Filter;

/// Rejects any HTTP method not on the configured allow-list.
pub struct MethodFilter {
    allowed: HashSet<Method>,
}

impl MethodFilter {
    pub fn new(allowed: impl IntoIterator<Item = Method>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Filter for MethodFilter {
    fn name(&self) -> &'static str {
        "method"
    }

    async fn on_request(&self, scope: &mut RequestScope) -> FilterOutcome {
        if self.allowed.contains(&scope.method) {
            FilterOutcome::Continue
        } else {
            FilterOutcome::Error(GatewayError::MethodUnsupported)
        }
    }
}
