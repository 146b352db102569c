//! Authentication module for BARTR
//!
//! Session issuance belongs to the identity provider; this module validates
//! the session tokens it signs.

mod session;

pub use session::{Session, SessionClaims, SessionError, SessionVerifier};
