//! # API Shared
//!
//! Shared utilities and definitions for the Raccord APIs.
//!
//! Contains:
//! - JSON wire types with OpenAPI schemas (`wire` module)
//! - Caller authentication from request headers
//! - Environment-driven configuration used by every binary
//! - Shared services like `HealthService`

pub mod auth;
pub mod config;
pub mod health;
pub mod wire;

pub use auth::{authenticate, AuthError};
pub use health::HealthService;
pub use wire::*;
