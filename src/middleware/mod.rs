//! Middleware for the BARTR API
//!
//! Request tracing, security headers and the session extractor.

pub mod auth;
mod security;
mod tracing;

pub use auth::AuthenticatedUser;
pub use security::security_headers;
pub use tracing::request_tracing;
