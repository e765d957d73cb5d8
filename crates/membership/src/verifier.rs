use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use confreg_core::SocietyId;

/// Request to verify an attendee's society membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub name: String,
    pub member_code: String,
    /// Attendee must consent to the lookup of their membership record.
    pub consent: bool,
}

/// A verified member record as returned by the society's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedMember {
    pub name: String,
    pub member_code: String,
    /// Grade string as the directory stores it (free-form, admin-entered).
    pub grade: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a verification attempt.
///
/// "Member not found" is a successful call with `success=false`, not an
/// error: the wizard shows the message and leaves the grade selection alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub success: bool,
    pub member: Option<VerifiedMember>,
    pub is_expired: bool,
    pub message: String,
}

impl VerificationOutcome {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            success: false,
            member: None,
            is_expired: false,
            message: message.into(),
        }
    }

    pub fn verified(member: VerifiedMember, now: DateTime<Utc>) -> Self {
        let is_expired = member.expires_at.is_some_and(|exp| exp <= now);
        let message = if is_expired {
            "membership has expired".to_string()
        } else {
            "membership verified".to_string()
        };
        Self {
            success: true,
            member: Some(member),
            is_expired,
            message,
        }
    }
}

/// Verification call failure (transport/contract level, not "not found").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("verification requires consent")]
    ConsentRequired,

    #[error("verification request is incomplete: {0}")]
    IncompleteRequest(String),

    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// Seam for the society's remote member-identity verification.
pub trait MemberVerifier: Send + Sync {
    fn verify(
        &self,
        society_id: SocietyId,
        request: &VerificationRequest,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, VerifyError>;
}

/// In-memory member directory, keyed by (society, member code).
///
/// Dev/test implementation; matches name + code the way the remote function
/// does (code exact, name exact after trimming).
#[derive(Debug, Default)]
pub struct StaticDirectoryVerifier {
    members: RwLock<HashMap<(SocietyId, String), VerifiedMember>>,
}

impl StaticDirectoryVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, society_id: SocietyId, member: VerifiedMember) {
        if let Ok(mut members) = self.members.write() {
            members.insert((society_id, member.member_code.clone()), member);
        }
    }
}

impl MemberVerifier for StaticDirectoryVerifier {
    fn verify(
        &self,
        society_id: SocietyId,
        request: &VerificationRequest,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, VerifyError> {
        if !request.consent {
            return Err(VerifyError::ConsentRequired);
        }
        if request.name.trim().is_empty() || request.member_code.trim().is_empty() {
            return Err(VerifyError::IncompleteRequest(
                "name and member code are required".to_string(),
            ));
        }

        let members = self
            .members
            .read()
            .map_err(|_| VerifyError::Unavailable("directory lock poisoned".to_string()))?;

        match members.get(&(society_id, request.member_code.clone())) {
            Some(member) if member.name.trim() == request.name.trim() => {
                tracing::debug!(member_code = %member.member_code, "member verified");
                Ok(VerificationOutcome::verified(member.clone(), now))
            }
            _ => Ok(VerificationOutcome::not_found(
                "no matching member record found",
            )),
        }
    }
}
