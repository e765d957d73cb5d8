//! Checkout data and provider callback URL construction.

use serde::{Deserialize, Serialize};
use url::Url;

use confreg_core::AttendeeId;

use crate::error::PaymentError;

/// Registrant fields carried through the provider redirect so the callback
/// handler can act without a prior lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrantSnapshot {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub grade: String,
    pub attendee_id: AttendeeId,
    pub anonymous: bool,
}

/// Success/fail redirect targets handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackUrls {
    pub success: String,
    pub fail: String,
}

/// Everything the checkout surface needs to hand off to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutData {
    pub order_id: String,
    pub amount: u64,
    pub client_key: String,
    pub urls: CallbackUrls,
}

/// Build the success/fail callback URLs.
///
/// The registrant snapshot travels as a single URL-encoded JSON query value;
/// `Url::query_pairs_mut` performs the encoding.
pub fn build_callback_urls(
    base: &str,
    order_id: &str,
    snapshot: &RegistrantSnapshot,
) -> Result<CallbackUrls, PaymentError> {
    let base = Url::parse(base)
        .map_err(|e| PaymentError::ProviderMisconfigured(format!("bad callback base URL: {e}")))?;
    let registrant = serde_json::to_string(snapshot)
        .map_err(|e| PaymentError::ProviderMisconfigured(format!("snapshot encode: {e}")))?;

    let build = |path: &str| -> Result<String, PaymentError> {
        let mut url = base.join(path).map_err(|e| {
            PaymentError::ProviderMisconfigured(format!("bad callback path {path}: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("order", order_id)
            .append_pair("registrant", &registrant);
        Ok(url.into())
    };

    Ok(CallbackUrls {
        success: build("payments/callback/success")?,
        fail: build("payments/callback/fail")?,
    })
}
