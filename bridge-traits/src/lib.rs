//! # Host Bridge Traits
//!
//! Capabilities the admin core needs from its host but does not implement
//! itself.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Raw HTTP transport
//! - [`SecureStore`](storage::SecureStore) - Session credential persistence
//! - [`Navigator`](navigation::Navigator) - Route changes (login redirect, dashboard)
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to the host
//!
//! ## Implementations
//!
//! | Host | Implementation Crate |
//! |------|---------------------|
//! | Desktop / CLI | `bridge-desktop` |
//! | Tests | hand-written fakes and `mockall` mocks |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let navigator = config.navigator.ok_or_else(|| Error::CapabilityMissing {
//!     capability: "Navigator".to_string(),
//!     message: "No navigator provided. Inject the host router adapter.".to_string(),
//! })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). HTTP
//! implementations report every server response as `Ok`, reserving `Err` for
//! transport failures so the session layer can tell a 401 from a dead socket.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the session layer shares them
//! across tokio tasks behind `Arc<dyn Trait>`.

pub mod error;
pub mod http;
pub mod logging;
pub mod navigation;
pub mod storage;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use logging::{LogEntry, LogLevel, LoggerSink};
pub use navigation::Navigator;
pub use storage::SecureStore;
