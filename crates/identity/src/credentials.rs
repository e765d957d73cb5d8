//! Credential validation for the account upgrade flow.
//!
//! Guests registering without membership set a "simple password" so they can
//! authenticate again and resume a pending registration. Validation mirrors
//! the provider's rules so failures surface before the upgrade is attempted.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("invalid email address")]
    InvalidEmail,

    #[error("password too weak: {0}")]
    WeakPassword(String),
}

/// Syntactic email check (local part, one '@', dotted domain).
pub fn validate_email(email: &str) -> Result<(), CredentialError> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(CredentialError::InvalidEmail);
    };
    if local.is_empty() || domain.is_empty() {
        return Err(CredentialError::InvalidEmail);
    }
    if domain.contains('@') || !domain.contains('.') {
        return Err(CredentialError::InvalidEmail);
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(CredentialError::InvalidEmail);
    }
    if email.chars().any(char::is_whitespace) {
        return Err(CredentialError::InvalidEmail);
    }
    Ok(())
}

/// Minimum strength for the guest "simple password".
pub fn validate_simple_password(password: &str) -> Result<(), CredentialError> {
    if password.len() < 6 {
        return Err(CredentialError::WeakPassword(
            "must be at least 6 characters".to_string(),
        ));
    }
    if password.chars().all(char::is_whitespace) {
        return Err(CredentialError::WeakPassword(
            "must not be blank".to_string(),
        ));
    }
    Ok(())
}
