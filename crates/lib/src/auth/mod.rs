//! Identity verification and sessions.
//!
//! Login turns a signed identity assertion into an opaque session id via
//! [`SessionManager::verify_identity`]; every later request resolves that id
//! with [`SessionManager::validate`].

pub mod errors;
pub mod identity;
pub mod session;

pub use errors::AuthError;
pub use identity::{
    Claims, Identity, IdentityVerifier, KeySet, SignedAssertionVerifier, encode_assertion,
};
pub use session::{Session, SessionManager, SessionState};
