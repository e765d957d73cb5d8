//! `confreg-payments` — payment session lifecycle and checkout handoff.
//!
//! The provider widget itself is out of scope; this crate owns the
//! server-side bookkeeping: one session per registration per payment-step
//! entry, readiness tracking, and callback URL construction.

pub mod checkout;
pub mod error;
pub mod session;

pub use checkout::{CallbackUrls, CheckoutData, RegistrantSnapshot, build_callback_urls};
pub use error::PaymentError;
pub use session::{PaymentSession, PaymentSessionManager, SessionInit};
