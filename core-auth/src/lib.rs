//! # Authentication Module
//!
//! Session management for the TradeOps admin console.
//!
//! ## Overview
//!
//! The backend issues a short-lived access token and a long-lived refresh
//! token at login. This crate keeps that pair in the host's secure store,
//! attaches the access token to every protected request and, when the
//! backend answers 401, renews it through a single shared refresh call
//! before replaying the request once.
//!
//! ## Components
//!
//! - [`CredentialStore`] - the four session keys in the host secure store
//! - [`RefreshCoordinator`] - single-flight token renewal with FIFO waiters
//! - [`AuthenticatedClient`] - the dispatch interceptor, itself an `HttpClient`
//! - [`SessionFailureHandler`] - purge and redirect when renewal fails
//! - [`AuthManager`] - login, logout and session checks
//! - [`RouteGuard`] - keeps unauthenticated users on public routes

pub mod client;
pub mod credential_store;
pub mod error;
pub mod guard;
pub mod manager;
pub mod refresh;
pub mod session;
pub mod types;

pub use client::AuthenticatedClient;
pub use credential_store::CredentialStore;
pub use error::{AuthError, Result};
pub use guard::{RouteDecision, RouteGuard};
pub use manager::AuthManager;
pub use refresh::RefreshCoordinator;
pub use session::SessionFailureHandler;
pub use types::{AuthState, CredentialPair, ExpiryReason, PendingRequest, SessionAttributes};
