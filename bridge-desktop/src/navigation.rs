//! Channel-backed navigator

use async_trait::async_trait;
use bridge_traits::{error::Result, navigation::Navigator};
use tokio::sync::watch;
use tracing::info;

/// Publishes route changes on a `watch` channel.
///
/// The host UI holds a receiver and renders whatever route was published
/// last. The latest route is retained even while no receiver is attached.
pub struct ChannelNavigator {
    sender: watch::Sender<String>,
}

impl ChannelNavigator {
    /// Create a navigator starting at `initial_route`, returning the receiver
    /// the host listens on.
    pub fn new(initial_route: impl Into<String>) -> (Self, watch::Receiver<String>) {
        let (sender, receiver) = watch::channel(initial_route.into());
        (Self { sender }, receiver)
    }

    /// Another receiver for the same route stream.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Navigator for ChannelNavigator {
    async fn navigate(&self, route: &str) -> Result<()> {
        info!(route = route, "Navigating");
        self.sender.send_replace(route.to_string());
        Ok(())
    }

    async fn current_route(&self) -> Option<String> {
        Some(self.sender.borrow().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_navigate_publishes_route() {
        let (navigator, mut routes) = ChannelNavigator::new("/dashboard");
        assert_eq!(*routes.borrow(), "/dashboard");

        navigator.navigate("/login").await.unwrap();
        routes.changed().await.unwrap();

        assert_eq!(*routes.borrow(), "/login");
        assert_eq!(navigator.current_route().await.as_deref(), Some("/login"));
    }

    #[tokio::test]
    async fn test_navigate_without_listener_keeps_route() {
        let (navigator, routes) = ChannelNavigator::new("/dashboard");
        drop(routes);

        navigator.navigate("/login").await.unwrap();
        assert_eq!(navigator.current_route().await.as_deref(), Some("/login"));
        assert_eq!(*navigator.subscribe().borrow(), "/login");
    }
}
