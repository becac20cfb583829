mod admission;
mod authentication;
mod authorization;
mod deny;
mod entry;
mod identity_header;
mod method;
mod request_id;
mod response_header;
mod security;

pub use admission::AdmissionFilter;
pub use authentication::AuthenticationFilter;
pub use authorization::AuthorizationFilter;
pub use deny::DenyFilter;
pub use entry::EntryFilter;
pub use identity_header::{ClaimHeaderMapping, IdentityHeaderFilter};
pub use method::MethodFilter;
pub use request_id::RequestIdFilter;
pub use response_header::ResponseHeaderFilter;
pub use security::SecurityHeaderFilter;

use async_trait::async_trait;

use crate::ctx::{FilterOutcome, RequestScope};

/// One stage of the admission pipeline. Filters run in a fixed order
/// (installed by whoever builds the `FilterChain`); each either lets the
/// request continue or short-circuits the rest of the chain.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Name used in logs and error messages. Defaults to the type name.
    fn name(&self) -> &'static str;

    async fn on_request(&self, scope: &mut RequestScope) -> FilterOutcome;
}

/// An ordered sequence of filters run against one `RequestScope`. Stops and
/// returns as soon as a filter reports anything other than `Continue`.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self { filters: Vec::new() }
    }

    pub fn push(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub async fn run(&self, scope: &mut RequestScope) -> FilterOutcome {
        for filter in &self.filters {
            let outcome = filter.on_request(scope).await;
            if !outcome.is_continue() {
                tracing::debug!(filter = filter.name(), "filter chain short-circuited");
                return outcome;
            }
        }
        FilterOutcome::Continue
    }
}
