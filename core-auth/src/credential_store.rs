//! Credential Store
//!
//! Holds the session credentials and attributes under four fixed keys in the
//! host [`SecureStore`]:
//!
//! | Key | Value |
//! |-----|-------|
//! | `access_token` | short-lived bearer credential |
//! | `refresh_token` | credential for `POST /auth/refresh` |
//! | `name` | display name |
//! | `role` | user role |
//!
//! ## Consistency
//!
//! Multi-key writes and clears hold the write side of an async `RwLock`, so a
//! reader never observes a half-written session. Every [`CredentialStore::clear`]
//! and [`CredentialStore::write`] bumps a generation counter; a refresh that started before a clear uses
//! [`CredentialStore::write_refreshed`] with the generation it observed and is
//! discarded instead of resurrecting the session.
//!
//! Token values are never logged.

use crate::error::{AuthError, Result};
use crate::types::{CredentialPair, SessionAttributes};
use bridge_traits::storage::SecureStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const NAME_KEY: &str = "name";
pub const ROLE_KEY: &str = "role";

const ALL_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, NAME_KEY, ROLE_KEY];

/// Shared handle to the persisted session.
///
/// Cloning is cheap; all clones see the same state.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    secure_store: Arc<dyn SecureStore>,
    lock: RwLock<()>,
    generation: AtomicU64,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        debug!("Initializing CredentialStore");
        Self {
            inner: Arc::new(StoreInner {
                secure_store,
                lock: RwLock::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// The current credential pair, or `None` if either token is missing.
    ///
    /// Storage failures are logged and reported as absent.
    pub async fn read(&self) -> Option<CredentialPair> {
        let _guard = self.inner.lock.read().await;
        let access_token = self.get(ACCESS_TOKEN_KEY).await?;
        let refresh_token = self.get(REFRESH_TOKEN_KEY).await?;
        Some(CredentialPair::new(access_token, refresh_token))
    }

    pub async fn access_token(&self) -> Option<String> {
        let _guard = self.inner.lock.read().await;
        self.get(ACCESS_TOKEN_KEY).await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        let _guard = self.inner.lock.read().await;
        self.get(REFRESH_TOKEN_KEY).await
    }

    /// Name and role, present only while both are stored.
    pub async fn attributes(&self) -> Option<SessionAttributes> {
        let _guard = self.inner.lock.read().await;
        let name = self.get(NAME_KEY).await?;
        let role = self.get(ROLE_KEY).await?;
        Some(SessionAttributes { name, role })
    }

    /// Number of times the session has been cleared.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Replace the whole session.
    ///
    /// Like [`clear`](Self::clear), this detaches any refresh still in flight
    /// for the previous session.
    ///
    /// On a storage failure the partially written keys are removed so the
    /// store is left empty rather than mixed.
    pub async fn write(&self, pair: &CredentialPair, attributes: &SessionAttributes) -> Result<()> {
        let _guard = self.inner.lock.write().await;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let entries = [
            (ACCESS_TOKEN_KEY, pair.access_token()),
            (REFRESH_TOKEN_KEY, pair.refresh_token()),
            (NAME_KEY, attributes.name.as_str()),
            (ROLE_KEY, attributes.role.as_str()),
        ];
        self.put_all(&entries).await?;

        info!(name = %attributes.name, role = %attributes.role, "Session stored");
        Ok(())
    }

    /// Store a refreshed access token, unless the session was cleared since
    /// `generation` was read.
    ///
    /// The stored refresh token is kept unless the backend rotated it.
    /// Returns `Ok(false)` when the write was discarded.
    pub async fn write_refreshed(
        &self,
        generation: u64,
        access_token: &str,
        rotated_refresh_token: Option<&str>,
        attributes: &SessionAttributes,
    ) -> Result<bool> {
        let _guard = self.inner.lock.write().await;
        if self.generation() != generation {
            info!("Session cleared during refresh, discarding refreshed credential");
            return Ok(false);
        }

        let mut entries = vec![
            (ACCESS_TOKEN_KEY, access_token),
            (NAME_KEY, attributes.name.as_str()),
            (ROLE_KEY, attributes.role.as_str()),
        ];
        if let Some(refresh_token) = rotated_refresh_token {
            entries.push((REFRESH_TOKEN_KEY, refresh_token));
        }
        self.put_all(&entries).await?;

        debug!(rotated = rotated_refresh_token.is_some(), "Refreshed credential stored");
        Ok(true)
    }

    /// Remove the credentials and attributes together.
    ///
    /// Every key is attempted even if one deletion fails; the first failure is
    /// returned.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.inner.lock.write().await;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.delete_all().await
    }

    async fn get(&self, key: &str) -> Option<String> {
        match self.inner.secure_store.get_secret(key).await {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(value) if !value.is_empty() => Some(value),
                Ok(_) => None,
                Err(_) => {
                    warn!(key = key, "Stored value is not valid UTF-8, ignoring");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read from secure storage");
                None
            }
        }
    }

    async fn put_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            if let Err(e) = self.inner.secure_store.set_secret(key, value.as_bytes()).await {
                warn!(key = *key, error = %e, "Failed to write to secure storage");
                let _ = self.delete_all().await;
                return Err(AuthError::SecureStorageUnavailable(e.to_string()));
            }
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut first_error = None;
        for key in ALL_KEYS {
            if let Err(e) = self.inner.secure_store.delete_secret(key).await {
                warn!(key = key, error = %e, "Failed to delete from secure storage");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(AuthError::SecureStorageUnavailable(e.to_string())),
            None => {
                debug!("Session cleared");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockSecureStore {
        storage: Mutex<HashMap<String, Vec<u8>>>,
        fail_writes_for: Option<&'static str>,
        fail_reads: AtomicBool,
    }

    #[async_trait]
    impl SecureStore for MockSecureStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            if self.fail_writes_for == Some(key) {
                return Err(BridgeError::OperationFailed("disk full".to_string()));
            }
            self.storage
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(BridgeError::NotAvailable("locked".to_string()));
            }
            Ok(self.storage.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            self.storage.lock().await.remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(self.storage.lock().await.keys().cloned().collect())
        }

        async fn clear_all(&self) -> BridgeResult<()> {
            self.storage.lock().await.clear();
            Ok(())
        }
    }

    fn sample_session() -> (CredentialPair, SessionAttributes) {
        (
            CredentialPair::new("access-1", "refresh-1"),
            SessionAttributes::new("Dana", "admin"),
        )
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let backing = Arc::new(MockSecureStore::default());
        let store = CredentialStore::new(backing.clone());
        let (pair, attributes) = sample_session();

        store.write(&pair, &attributes).await.unwrap();

        assert_eq!(store.read().await, Some(pair));
        assert_eq!(store.attributes().await, Some(attributes));

        let mut keys = backing.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["access_token", "name", "refresh_token", "role"]);
    }

    #[tokio::test]
    async fn test_clear_removes_everything_and_bumps_generation() {
        let store = CredentialStore::new(Arc::new(MockSecureStore::default()));
        let (pair, attributes) = sample_session();
        store.write(&pair, &attributes).await.unwrap();

        let before = store.generation();
        store.clear().await.unwrap();

        assert_eq!(store.generation(), before + 1);
        assert!(store.read().await.is_none());
        assert!(store.access_token().await.is_none());
        assert!(store.attributes().await.is_none());
    }

    #[tokio::test]
    async fn test_read_requires_both_tokens() {
        let backing = Arc::new(MockSecureStore::default());
        let store = CredentialStore::new(backing.clone());
        backing.set_secret(REFRESH_TOKEN_KEY, b"refresh-only").await.unwrap();

        assert!(store.read().await.is_none());
        assert_eq!(store.refresh_token().await.as_deref(), Some("refresh-only"));
    }

    #[tokio::test]
    async fn test_write_refreshed_keeps_refresh_token() {
        let store = CredentialStore::new(Arc::new(MockSecureStore::default()));
        let (pair, attributes) = sample_session();
        store.write(&pair, &attributes).await.unwrap();

        let written = store
            .write_refreshed(store.generation(), "access-2", None, &attributes)
            .await
            .unwrap();

        assert!(written);
        assert_eq!(
            store.read().await,
            Some(CredentialPair::new("access-2", "refresh-1"))
        );
    }

    #[tokio::test]
    async fn test_write_refreshed_applies_rotation() {
        let store = CredentialStore::new(Arc::new(MockSecureStore::default()));
        let (pair, attributes) = sample_session();
        store.write(&pair, &attributes).await.unwrap();

        store
            .write_refreshed(store.generation(), "access-2", Some("refresh-2"), &attributes)
            .await
            .unwrap();

        assert_eq!(store.refresh_token().await.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn test_write_refreshed_discarded_after_clear() {
        let store = CredentialStore::new(Arc::new(MockSecureStore::default()));
        let (pair, attributes) = sample_session();
        store.write(&pair, &attributes).await.unwrap();

        let generation = store.generation();
        store.clear().await.unwrap();

        let written = store
            .write_refreshed(generation, "access-2", None, &attributes)
            .await
            .unwrap();

        assert!(!written);
        assert!(store.access_token().await.is_none());
    }

    #[tokio::test]
    async fn test_write_refreshed_discarded_after_new_login() {
        let store = CredentialStore::new(Arc::new(MockSecureStore::default()));
        let (pair, attributes) = sample_session();
        store.write(&pair, &attributes).await.unwrap();

        let generation = store.generation();
        store
            .write(&CredentialPair::new("access-9", "refresh-9"), &attributes)
            .await
            .unwrap();

        let written = store
            .write_refreshed(generation, "access-2", None, &attributes)
            .await
            .unwrap();

        assert!(!written);
        assert_eq!(store.access_token().await.as_deref(), Some("access-9"));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_store_empty() {
        let backing = Arc::new(MockSecureStore {
            fail_writes_for: Some(NAME_KEY),
            ..Default::default()
        });
        let store = CredentialStore::new(backing.clone());
        let (pair, attributes) = sample_session();

        let result = store.write(&pair, &attributes).await;

        assert!(matches!(result, Err(AuthError::SecureStorageUnavailable(_))));
        assert!(backing.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_reports_absent() {
        let backing = Arc::new(MockSecureStore::default());
        let store = CredentialStore::new(backing.clone());
        let (pair, attributes) = sample_session();
        store.write(&pair, &attributes).await.unwrap();

        backing.fail_reads.store(true, Ordering::SeqCst);
        assert!(store.read().await.is_none());
    }
}
