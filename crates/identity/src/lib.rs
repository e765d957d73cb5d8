//! `confreg-identity` — sessions, credentials, and the authentication
//! boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. The `Session`
//! aggregate models the anonymous-to-credentialed upgrade as an explicit state
//! transition rather than a side effect buried in a wizard step.

pub mod authorize;
pub mod claims;
pub mod credentials;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod session;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use credentials::{CredentialError, validate_email, validate_simple_password};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use principal::{PrincipalId, SocietyMembership};
pub use roles::Role;
pub use session::{
    AbortUpgrade, BeginUpgrade, CompleteUpgrade, Session, SessionCommand, SessionEvent,
    SessionId, SessionState, StartAnonymousSession,
};
