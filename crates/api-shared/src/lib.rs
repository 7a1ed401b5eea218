//! # API Shared
//!
//! Shared utilities and definitions for the clinic authorisation API.
//!
//! Contains:
//! - Request and response types (`dto` module) with their OpenAPI schemas
//! - Shared services like `HealthService`
//! - API key authentication for mutating endpoints
//!
//! Used by `api-rest` and the workspace binary.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{ApiKey, AuthError};
pub use health::HealthService;
