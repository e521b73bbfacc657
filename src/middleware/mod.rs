//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Enforce the caller's role
//! - Short-circuit requests (reject unauthorized)

/// API key authentication and role guard
pub mod auth;
