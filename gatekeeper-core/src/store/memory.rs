use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::provider::AuthorizationDecision;
use crate::store::SessionStore;

struct AuthzEntry {
    decision: AuthorizationDecision,
    expires_at: Instant,
}

struct RefreshEntry {
    encrypted: Vec<u8>,
    expires_at: Instant,
}

/// In-process session store. Used as the default when no external store
/// (e.g. Redis) is configured, and in tests. Entries are keyed by
/// `(raw_token, url)` so a cached decision never leaks across tokens or
/// resources. Backed by `DashMap` rather than a mutex-guarded `HashMap`
/// since authorization lookups and refresh-token writes both happen on the
/// hot path of concurrent requests.
#[derive(Default)]
pub struct MemoryStore {
    authz: DashMap<(String, String), AuthzEntry>,
    refresh_tokens: DashMap<String, RefreshEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_authz(
        &self,
        raw_token: &str,
        url: &str,
    ) -> Result<Option<AuthorizationDecision>, StoreError> {
        let key = (raw_token.to_string(), url.to_string());
        match self.authz.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.decision)),
            Some(_) => {
                self.authz.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn store_authz(
        &self,
        raw_token: &str,
        url: &str,
        decision: AuthorizationDecision,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = (raw_token.to_string(), url.to_string());
        self.authz.insert(
            key,
            AuthzEntry {
                decision,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        access_token_key: &str,
        encrypted_refresh: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.refresh_tokens.insert(
            access_token_key.to_string(),
            RefreshEntry {
                encrypted: encrypted_refresh,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete_refresh_token(&self, access_token_key: &str) -> Result<(), StoreError> {
        self.refresh_tokens.remove(access_token_key);
        Ok(())
    }

    async fn get_refresh_token(&self, access_token_key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.refresh_tokens.get(access_token_key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.encrypted.clone())),
            Some(_) => {
                self.refresh_tokens.remove(access_token_key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_retrieves_authz_decision() {
        let store = MemoryStore::new();
        assert!(store.get_authz("tok", "/api").await.unwrap().is_none());

        store
            .store_authz("tok", "/api", AuthorizationDecision::Allowed, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            store.get_authz("tok", "/api").await.unwrap(),
            Some(AuthorizationDecision::Allowed)
        );
    }

    #[tokio::test]
    async fn expired_entries_read_as_miss() {
        let store = MemoryStore::new();
        store
            .store_authz("tok", "/api", AuthorizationDecision::Allowed, Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.get_authz("tok", "/api").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_token_round_trips_and_deletes() {
        let store = MemoryStore::new();
        assert!(store.get_refresh_token("access-key").await.unwrap().is_none());

        store
            .store_refresh_token("access-key", vec![1, 2, 3], Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.get_refresh_token("access-key").await.unwrap(),
            Some(vec![1, 2, 3])
        );

        store.delete_refresh_token("access-key").await.unwrap();
        assert!(store.get_refresh_token("access-key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_refresh_token_reads_as_miss() {
        let store = MemoryStore::new();
        store
            .store_refresh_token("access-key", vec![1, 2, 3], Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.get_refresh_token("access-key").await.unwrap().is_none());
    }
}
