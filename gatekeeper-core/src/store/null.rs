use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::provider::AuthorizationDecision;
use crate::store::SessionStore;

/// The "store disabled" capability: every read reports `NotFound`, every
/// write succeeds and is simply discarded. A null implementation lets every
/// call site stay unconditional instead of branching on a configured-or-not
/// flag.
#[derive(Default)]
pub struct NullStore;

#[async_trait]
impl SessionStore for NullStore {
    async fn get_authz(
        &self,
        _raw_token: &str,
        _url: &str,
    ) -> Result<Option<AuthorizationDecision>, StoreError> {
        Ok(None)
    }

    async fn store_authz(
        &self,
        _raw_token: &str,
        _url: &str,
        _decision: AuthorizationDecision,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        _access_token_key: &str,
        _encrypted_refresh: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete_refresh_token(&self, _access_token_key: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_refresh_token(&self, _access_token_key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
