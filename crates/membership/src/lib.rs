//! `confreg-membership` — member identity verification and grade
//! reconciliation.
//!
//! The remote verification function is a seam: `MemberVerifier` abstracts it,
//! `StaticDirectoryVerifier` is the in-memory implementation for dev/tests.

pub mod reconcile;
pub mod verifier;

pub use reconcile::{GradeSelection, reconcile_grade};
pub use verifier::{
    MemberVerifier, StaticDirectoryVerifier, VerificationRequest, VerifiedMember, VerifyError,
    VerificationOutcome,
};
