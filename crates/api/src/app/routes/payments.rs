//! Provider payment callbacks.
//!
//! These endpoints are public: the provider redirects the payer's browser
//! here after checkout. Authentication is by order id, which must match the
//! order recorded on the aggregate when the payment attempt began.

use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::post,
};
use chrono::Utc;

use confreg_core::SocietyId;
use confreg_registration::{
    ConfirmPayment, FailPayment, RegistrationCommand, RegistrationId,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/callback/success", post(callback_success))
        .route("/callback/fail", post(callback_fail))
}

pub async fn callback_success(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PaymentCallbackRequest>,
) -> axum::response::Response {
    let society_id = SocietyId::from_uuid(body.society_id);
    let registration_id = RegistrationId::new(body.registration_id.into());

    let Some(amount) = body.amount else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "success callback requires the captured amount",
        );
    };

    let cmd = RegistrationCommand::ConfirmPayment(ConfirmPayment {
        society_id,
        registration_id,
        order_id: body.order_id,
        amount,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch_registration(society_id, registration_id, cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // The payment session has served its purpose once the payment is
    // confirmed.
    services.payment_sessions().teardown(registration_id.0);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": registration_id.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn callback_fail(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PaymentCallbackRequest>,
) -> axum::response::Response {
    let society_id = SocietyId::from_uuid(body.society_id);
    let registration_id = RegistrationId::new(body.registration_id.into());

    let cmd = RegistrationCommand::FailPayment(FailPayment {
        society_id,
        registration_id,
        order_id: body.order_id,
        reason: body
            .reason
            .unwrap_or_else(|| "payment failed".to_string()),
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch_registration(society_id, registration_id, cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": registration_id.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}
