//! # Authenticated Client
//!
//! The dispatch interceptor: an [`HttpClient`] that attaches the stored bearer
//! credential to every protected request and recovers from a single 401 by
//! renewing the credential and replaying the request once.
//!
//! ## Flow
//!
//! ```text
//! send ──public?──yes──> transport (untouched)
//!   │
//!   no
//!   ▼
//! attach token ─> transport ─> 401? ──no──> response
//!                               │
//!                              yes, first attempt
//!                               ▼
//!                 ensure_fresh_credential ─> replay once ─> response
//! ```
//!
//! A replayed request that is rejected again is returned as is. Transport
//! errors pass through without touching the session.
//!
//! Because [`AuthenticatedClient`] implements [`HttpClient`] it can be handed
//! to any component that expects a plain client.

use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::refresh::RefreshCoordinator;
use crate::types::PendingRequest;
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy, AUTHORIZATION};
use core_runtime::events::{CoreEvent, EventBus, RequestEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// HTTP client that manages the session credential on behalf of callers.
#[derive(Clone)]
pub struct AuthenticatedClient {
    transport: Arc<dyn HttpClient>,
    store: CredentialStore,
    coordinator: RefreshCoordinator,
    event_bus: EventBus,
    public_endpoints: Arc<[String]>,
    request_timeout: Option<Duration>,
}

impl AuthenticatedClient {
    /// Wrap `transport`.
    ///
    /// Public endpoints are given either as absolute URLs or as bare paths.
    /// Absolute URLs are reduced to their path, so an endpoint built on a
    /// base URL such as `http://host/api` is matched as `/api/users/login`.
    /// `refresh_endpoint` is always treated as public in addition to
    /// `public_endpoints`.
    pub fn new(
        transport: Arc<dyn HttpClient>,
        store: CredentialStore,
        coordinator: RefreshCoordinator,
        event_bus: EventBus,
        public_endpoints: impl IntoIterator<Item = String>,
        refresh_endpoint: &str,
    ) -> Self {
        let mut endpoints: Vec<String> = public_endpoints
            .into_iter()
            .map(|p| url_path(&p))
            .collect();
        let refresh_path = url_path(refresh_endpoint);
        if !endpoints.contains(&refresh_path) {
            endpoints.push(refresh_path);
        }

        Self {
            transport,
            store,
            coordinator,
            event_bus,
            public_endpoints: endpoints.into(),
            request_timeout: None,
        }
    }

    /// Timeout applied to requests that do not carry their own.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Whether `url` targets an endpoint that bypasses credential handling.
    ///
    /// Matching is by whole path segments, so `/auth/refresh` covers
    /// `/auth/refresh/` but not `/auth/refreshments`.
    pub fn is_public(&self, url: &str) -> bool {
        let path = url_path(url);

        self.public_endpoints.iter().any(|prefix| {
            path == *prefix
                || prefix == "/"
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Send a request, renewing the credential and replaying once on 401.
    ///
    /// The returned response may still be a 401 when the replay was rejected
    /// too; [`send_authorized`](Self::send_authorized) turns that into an
    /// error.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionExpired`] when the credential could not be
    ///   renewed
    /// - [`AuthError::Network`] on transport failure
    #[instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.dispatch(request, None).await
    }

    /// Like [`send`](Self::send), with a final 401 reported as
    /// [`AuthError::Unauthorized`].
    pub async fn send_authorized(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.send(request).await?;
        if response.is_unauthorized() {
            return Err(AuthError::Unauthorized);
        }
        Ok(response)
    }

    async fn dispatch(
        &self,
        request: HttpRequest,
        policy: Option<RetryPolicy>,
    ) -> Result<HttpResponse> {
        let request = match (request.timeout, self.request_timeout) {
            (None, Some(timeout)) => request.timeout(timeout),
            _ => request,
        };

        if self.is_public(&request.url) {
            debug!("Public endpoint, sending without credential");
            let request = request.without_header(AUTHORIZATION);
            return Ok(self.transmit(request, policy).await?);
        }

        let mut pending = PendingRequest::new(request);
        let mut token = self.store.access_token().await;

        loop {
            let response = self
                .transmit(pending.authorized(token.as_deref()), policy.clone())
                .await?;

            if pending.is_retried() {
                let _ = self
                    .event_bus
                    .emit(CoreEvent::Request(RequestEvent::Replayed {
                        method: pending.request().method.as_str().to_string(),
                        url: pending.request().url.clone(),
                        status: response.status,
                    }));
                if response.is_unauthorized() {
                    warn!("Replayed request rejected again, returning response");
                }
                return Ok(response);
            }

            if !response.is_unauthorized() {
                return Ok(response);
            }

            debug!("Received 401, renewing credential");
            let sent = token.take();
            token = match self.store.access_token().await {
                Some(current) if sent.as_deref() != Some(current.as_str()) => {
                    debug!("Credential already renewed by another request");
                    Some(current)
                }
                _ => match self.coordinator.ensure_fresh_credential().await {
                    Ok(fresh) => Some(fresh),
                    Err(e) => {
                        self.reject(&pending, &e);
                        return Err(AuthError::SessionExpired);
                    }
                },
            };

            if self.store.access_token().await.is_none() {
                let e = AuthError::SessionExpired;
                self.reject(&pending, &e);
                return Err(e);
            }

            pending = pending.into_retry();
        }
    }

    async fn transmit(
        &self,
        request: HttpRequest,
        policy: Option<RetryPolicy>,
    ) -> BridgeResult<HttpResponse> {
        match policy {
            Some(policy) => self.transport.execute_with_retry(request, policy).await,
            None => self.transport.execute(request).await,
        }
    }

    fn reject(&self, pending: &PendingRequest, error: &AuthError) {
        warn!(error = %error, "Request abandoned, session ended");
        let _ = self
            .event_bus
            .emit(CoreEvent::Request(RequestEvent::Rejected {
                method: pending.request().method.as_str().to_string(),
                url: pending.request().url.clone(),
                reason: error.to_string(),
            }));
    }
}

#[async_trait]
impl HttpClient for AuthenticatedClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        Ok(self.dispatch(request, None).await?)
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> BridgeResult<HttpResponse> {
        Ok(self.dispatch(request, Some(policy)).await?)
    }
}

/// Normalized path of an absolute URL, or of a bare path with any query or
/// fragment removed.
fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => normalize_path(parsed.path()),
        Err(_) => normalize_path(url.split(['?', '#']).next().unwrap_or(url)),
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
