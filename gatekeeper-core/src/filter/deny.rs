use async_trait::async_trait;
use http::StatusCode;

use crate::ctx::{FilterOutcome, RequestScope};
use crate::filter::Filter;

/// Unconditional deny: terminates the chain with a fixed status regardless
/// of anything in the scope. Used to wire up resources that are blocked
/// outright (e.g. a decommissioned path) without a full admission filter
/// instance.
pub struct DenyFilter {
    status: StatusCode,
    reason: String,
}

impl DenyFilter {
    pub fn new(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Filter for DenyFilter {
    fn name(&self) -> &'static str {
        "deny"
    }

    async fn on_request(&self, scope: &mut RequestScope) -> FilterOutcome {
        scope.mark_denied();
        FilterOutcome::Deny {
            status: self.status,
            reason: self.reason.clone(),
        }
    }
}
