//! # Core Configuration Module
//!
//! Provides configuration for the TradeOps admin core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding the backend location, the session routes and the host
//! bridges. It enforces fail-fast validation so a misconfigured console fails
//! at startup rather than on the first request.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - transport to the backend (desktop default: reqwest)
//! - `SecureStore` - credential persistence (desktop default: in-memory session store)
//! - `Navigator` - route changes (desktop default: watch-channel navigator)
//!
//! When the `desktop-shims` feature is enabled, missing bridges are filled
//! with `bridge-desktop` implementations. Otherwise a missing bridge is a
//! [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::from_env()
//!     .refresh_timeout(Duration::from_secs(10))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, Navigator, SecureStore};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Environment variable overriding the backend base URL.
pub const API_URL_ENV: &str = "TRADEOPS_API_URL";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
pub const DEFAULT_HOME_ROUTE: &str = "/dashboard";
pub const DEFAULT_LOGIN_PATH: &str = "/users/login";
pub const DEFAULT_REGISTER_PATH: &str = "/auth/register";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// Core configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Backend origin, e.g. `http://localhost:8000`
    pub api_base_url: String,

    /// Route shown when there is no session
    pub login_route: String,

    /// Route shown after a successful login
    pub home_route: String,

    /// Routes reachable without a session
    pub public_routes: Vec<String>,

    /// Backend login endpoint path
    pub login_path: String,

    /// Backend refresh endpoint path
    pub refresh_path: String,

    /// Endpoint path prefixes sent without credentials and never retried on 401
    pub public_endpoints: Vec<String>,

    /// Upper bound on a single refresh call
    pub refresh_timeout: Duration,

    /// Default per-request timeout
    pub request_timeout: Duration,

    /// Capacity of the event bus
    pub event_buffer_size: usize,

    pub http_client: Arc<dyn HttpClient>,

    pub secure_store: Arc<dyn SecureStore>,

    pub navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field("login_route", &self.login_route)
            .field("home_route", &self.home_route)
            .field("public_routes", &self.public_routes)
            .field("login_path", &self.login_path)
            .field("refresh_path", &self.refresh_path)
            .field("public_endpoints", &self.public_endpoints)
            .field("refresh_timeout", &self.refresh_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("navigator", &"Navigator { ... }")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Builder seeded from the process environment.
    ///
    /// Reads [`API_URL_ENV`]; everything else keeps its default.
    pub fn from_env() -> CoreConfigBuilder {
        let builder = CoreConfigBuilder::default();
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => builder.api_base_url(url.trim()),
            _ => builder,
        }
    }

    /// Absolute URL for a backend path.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The base URL parses and uses http or https
    /// - Routes and endpoint paths are absolute
    /// - Timeouts and the event buffer are non-zero
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url).map_err(|e| {
            Error::Config(format!(
                "Invalid API base URL '{}': {}",
                self.api_base_url, e
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "API base URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        let paths = [
            ("login route", &self.login_route),
            ("home route", &self.home_route),
            ("login path", &self.login_path),
            ("refresh path", &self.refresh_path),
        ];
        for (label, path) in paths
            .into_iter()
            .chain(self.public_routes.iter().map(|p| ("public route", p)))
            .chain(self.public_endpoints.iter().map(|p| ("public endpoint", p)))
        {
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "The {} must start with '/', got '{}'",
                    label, path
                )));
            }
        }

        if self.refresh_timeout.is_zero() {
            return Err(Error::Config(
                "Refresh timeout must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    Ok(Arc::new(ReqwestHttpClient::with_timeout(timeout)))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "An HttpClient implementation is required to reach the backend. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Other hosts: inject a platform transport."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::SessionSecureStore;

    Ok(Arc::new(SessionSecureStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "A SecureStore implementation is required for session credentials. \
                 Desktop: enable the 'desktop-shims' feature to use SessionSecureStore. \
                 Browser hosts: inject a session-storage adapter."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_navigator(login_route: &str) -> Result<Arc<dyn Navigator>> {
    use bridge_desktop::ChannelNavigator;

    let (navigator, _routes) = ChannelNavigator::new(login_route);
    Ok(Arc::new(navigator))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_navigator(_login_route: &str) -> Result<Arc<dyn Navigator>> {
    Err(Error::CapabilityMissing {
        capability: "Navigator".to_string(),
        message: "A Navigator implementation is required to redirect on session expiry. \
                 Desktop: enable the 'desktop-shims' feature to use ChannelNavigator. \
                 Other hosts: inject the host router adapter."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Every setting has a default; [`build()`](CoreConfigBuilder::build) fills
/// missing bridges (see module docs) and validates the result.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    login_route: Option<String>,
    home_route: Option<String>,
    public_routes: Option<Vec<String>>,
    login_path: Option<String>,
    refresh_path: Option<String>,
    public_endpoints: Option<Vec<String>>,
    refresh_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl CoreConfigBuilder {
    /// Backend origin. Defaults to [`DEFAULT_API_BASE_URL`].
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = Some(route.into());
        self
    }

    pub fn home_route(mut self, route: impl Into<String>) -> Self {
        self.home_route = Some(route.into());
        self
    }

    /// Routes reachable without a session. Defaults to the login route only.
    pub fn public_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_routes = Some(routes.into_iter().map(Into::into).collect());
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Endpoint prefixes exempt from credential handling.
    ///
    /// Defaults to the login path and `/auth/register`. The refresh path is
    /// always exempt regardless of this list.
    pub fn public_endpoints<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_endpoints = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a bridge is absent and no desktop
    ///   default is compiled in
    /// - [`Error::Config`] when validation fails
    pub fn build(self) -> Result<CoreConfig> {
        let login_route = self
            .login_route
            .unwrap_or_else(|| DEFAULT_LOGIN_ROUTE.to_string());
        let login_path = self
            .login_path
            .unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let navigator = match self.navigator {
            Some(navigator) => navigator,
            None => provide_default_navigator(&login_route)?,
        };

        let config = CoreConfig {
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            public_routes: self
                .public_routes
                .unwrap_or_else(|| vec![login_route.clone()]),
            public_endpoints: self
                .public_endpoints
                .unwrap_or_else(|| vec![login_path.clone(), DEFAULT_REGISTER_PATH.to_string()]),
            login_route,
            home_route: self
                .home_route
                .unwrap_or_else(|| DEFAULT_HOME_ROUTE.to_string()),
            login_path,
            refresh_path: self
                .refresh_path
                .unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string()),
            refresh_timeout: self.refresh_timeout.unwrap_or(DEFAULT_REFRESH_TIMEOUT),
            request_timeout,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER),
            http_client,
            secure_store,
            navigator,
        };

        config.validate()?;

        Ok(config)
    }
}
