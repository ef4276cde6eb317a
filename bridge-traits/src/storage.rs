//! Session Storage Abstraction
//!
//! Where the console keeps its session secrets is up to the host; the core
//! only sees byte values under string keys.

use async_trait::async_trait;

use crate::error::Result;

/// Key/value store for session credentials.
///
/// Hosts decide the lifetime of the values:
/// - Desktop: in-memory, gone when the process exits
/// - Browser shells: `sessionStorage` behind a host adapter
///
/// Implementations must not log stored values, and removing a key that is
/// not present succeeds.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn remember_role(store: &dyn SecureStore, role: &str) -> Result<()> {
///     store.set_secret("role", role.as_bytes()).await
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Write `value` under `key`, overwriting what was there.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// `Ok(None)` when nothing is stored under `key`.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn delete_secret(&self, key: &str) -> Result<()>;

    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }

    /// Stored keys, never values.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Remove every stored entry.
    async fn clear_all(&self) -> Result<()>;
}
