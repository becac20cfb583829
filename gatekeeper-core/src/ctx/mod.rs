mod identity;
mod request_scope;

pub use identity::{ClaimValue, Identity};
pub use request_scope::{FilterOutcome, RequestScope};
