//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, secure
//! storage, navigation) into the session layer and exposes a single handle to
//! the admin console. Desktop hosts typically enable the `desktop-shims`
//! feature, which fills any bridge they do not inject with the
//! `bridge-desktop` adapters.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! let core = core_service::bootstrap()?;
//!
//! core.auth().login("dana", "hunter2").await?;
//! let products: serde_json::Value = core.api().get_json("/products").await?;
//! # let _ = products;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;

pub use api::{ApiClient, ApiError};
pub use error::{CoreError, Result};

use std::sync::Arc;

use core_auth::AuthManager;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream};
use tracing::info;

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share the session.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    event_bus: EventBus,
    auth: Arc<AuthManager>,
    api: ApiClient,
}

impl CoreService {
    /// Create a new service from a built configuration.
    pub fn new(config: CoreConfig) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        let auth = Arc::new(AuthManager::new(&config, event_bus.clone()));
        let api = ApiClient::new(auth.client(), config.api_base_url.clone());

        info!(api = %config.api_base_url, "Core service initialized");
        Self {
            config: Arc::new(config),
            event_bus,
            auth,
            api,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Login, logout, session checks and the route guard.
    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Stream of core events, optionally narrowed with
    /// [`EventStream::filter`].
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Stream of session lifecycle events only.
    pub fn subscribe_auth_events(&self) -> EventStream {
        self.subscribe_events()
            .filter(|event| matches!(event, CoreEvent::Auth(_)))
    }
}

/// Build a service from the process environment and default bridges.
///
/// # Errors
///
/// [`CoreError::CapabilityMissing`] when a bridge has no default for this
/// build, [`CoreError::InitializationFailed`] for invalid settings.
pub fn bootstrap() -> Result<CoreService> {
    let config = CoreConfig::from_env().build()?;
    Ok(CoreService::new(config))
}
