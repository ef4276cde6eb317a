//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and CLI hosts.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `SecureStore` as a process-scoped in-memory map, mirroring browser
//!   session storage: credentials vanish when the process exits
//! - `Navigator` over a `tokio::sync::watch` channel the host UI subscribes to
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ChannelNavigator, ReqwestHttpClient, SessionSecureStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let store = SessionSecureStore::new();
//!     let (navigator, mut routes) = ChannelNavigator::new("/login");
//!     // Use in core configuration
//! }
//! ```

mod http;
mod navigation;
mod secure_store;

pub use http::ReqwestHttpClient;
pub use navigation::ChannelNavigator;
pub use secure_store::SessionSecureStore;
