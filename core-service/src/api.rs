//! Typed JSON access to the admin backend.
//!
//! Every call goes through the [`AuthenticatedClient`], so credentials and
//! session renewal are handled transparently.

use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse};
use core_auth::types::error_detail;
use core_auth::{AuthError, AuthenticatedClient};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Failed to encode request body: {0}")]
    Encode(String),

    #[error("Failed to decode response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiClient {
    client: AuthenticatedClient,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: AuthenticatedClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    #[instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .dispatch(HttpRequest::new(HttpMethod::Get, self.url(path)))
            .await?;
        decode(&response)
    }

    #[instrument(skip(self, body))]
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = encode(HttpRequest::new(HttpMethod::Post, self.url(path)), body)?;
        decode(&self.dispatch(request).await?)
    }

    #[instrument(skip(self, body))]
    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = encode(HttpRequest::new(HttpMethod::Patch, self.url(path)), body)?;
        decode(&self.dispatch(request).await?)
    }

    /// Delete a resource; any 2xx counts as success and the body is ignored.
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.dispatch(HttpRequest::new(HttpMethod::Delete, self.url(path)))
            .await?;
        Ok(())
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.client.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let detail = error_detail(&response);
        debug!(status = response.status, detail = %detail, "Backend returned an error");
        Err(ApiError::Status {
            status: response.status,
            detail,
        })
    }
}

fn encode<B: Serialize>(request: HttpRequest, body: &B) -> Result<HttpRequest> {
    request
        .json(body)
        .map_err(|e| ApiError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    // 204 and empty bodies decode as JSON null, which suits `()` and `Option`.
    if response.body.is_empty() {
        return serde_json::from_str("null").map_err(|e| ApiError::Decode(e.to_string()));
    }
    response.json().map_err(|e| ApiError::Decode(e.to_string()))
}
