//! Navigation Abstraction
//!
//! The session layer needs to send the user somewhere (the login page after a
//! failed refresh, the dashboard after login) without knowing how the host
//! renders pages. Hosts implement [`Navigator`] over their router.

use async_trait::async_trait;

use crate::error::Result;

/// Host router.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::navigation::Navigator;
///
/// async fn go_home(navigator: &dyn Navigator) -> Result<()> {
///     navigator.navigate("/dashboard").await
/// }
/// ```
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Replace the current location with `route`.
    async fn navigate(&self, route: &str) -> Result<()>;

    /// The route currently displayed, if the host tracks one.
    async fn current_route(&self) -> Option<String> {
        None
    }
}
