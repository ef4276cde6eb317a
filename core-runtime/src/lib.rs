//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the TradeOps admin core:
//! - Logging and tracing setup
//! - Configuration management
//! - Event bus for session lifecycle notifications
//!
//! Every other core crate depends on this one for its configuration type and
//! its event vocabulary.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
