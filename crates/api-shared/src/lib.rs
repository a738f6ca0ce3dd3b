//! # API Shared
//!
//! Shared definitions for the clinic APIs.
//!
//! Contains:
//! - Wire types (`wire` module): request and response bodies with their OpenAPI schemas
//! - Shared services like `HealthService`
//! - Bearer credential parsing
//!
//! Used by `clinic-core` (which produces the response types) and `api-rest`.

pub mod auth;
pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
