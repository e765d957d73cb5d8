use thiserror::Error;

/// Payment failure categories.
///
/// Each category maps to a distinct user-facing message and none of them is
/// retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Checkout was requested before a session was initialized.
    #[error("payment session is not initialized")]
    SessionNotInitialized,

    /// The session exists but the provider's payment methods have not
    /// finished loading.
    #[error("payment methods are not ready yet")]
    MethodsNotReady,

    /// The provider client key is missing or malformed.
    #[error("payment provider is misconfigured: {0}")]
    ProviderMisconfigured(String),
}
