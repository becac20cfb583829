mod memory;
mod null;

pub use memory::MemoryStore;
pub use null::NullStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::provider::AuthorizationDecision;

/// The session-store interface, optional. Callers always hold a
/// `dyn SessionStore` rather than branching on an enabled/disabled flag; a
/// disabled store is just `NullStore`, which always reports a miss and
/// succeeds writes silently so every call site behaves identically whether
/// or not persistence is actually configured.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `Ok(None)` means "not found"; `Err` means the store itself is
    /// unavailable, which callers treat the same as a miss — store errors
    /// never escalate into a denial.
    async fn get_authz(
        &self,
        raw_token: &str,
        url: &str,
    ) -> Result<Option<AuthorizationDecision>, StoreError>;

    async fn store_authz(
        &self,
        raw_token: &str,
        url: &str,
        decision: AuthorizationDecision,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn store_refresh_token(
        &self,
        access_token_key: &str,
        encrypted_refresh: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn delete_refresh_token(&self, access_token_key: &str) -> Result<(), StoreError>;

    /// Reads back what `store_refresh_token` wrote for this key. Not part
    /// of the write-side quartet a write-only store would need, but the
    /// refresh protocol cannot recover a refresh token from the store
    /// without it — added as the missing read counterpart to
    /// `store_refresh_token`/`delete_refresh_token`.
    async fn get_refresh_token(&self, access_token_key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Whether this store is a real backend (used only to gate the
    /// authorization filter's lookup-before-call ordering).
    fn is_enabled(&self) -> bool {
        true
    }
}
