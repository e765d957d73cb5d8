use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use confreg_infra::command_dispatcher::DispatchError;
use confreg_payments::PaymentError;
use confreg_pricing::PeriodKind;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => {
            json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized")
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
        DispatchError::SocietyIsolation(msg) => {
            json_error(StatusCode::FORBIDDEN, "society_isolation", msg)
        }
    }
}

pub fn payment_error_to_response(err: PaymentError) -> axum::response::Response {
    let (status, code) = match &err {
        PaymentError::SessionNotInitialized => (StatusCode::CONFLICT, "payment_session_missing"),
        PaymentError::MethodsNotReady => (StatusCode::CONFLICT, "payment_methods_not_ready"),
        PaymentError::ProviderMisconfigured(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "provider_misconfigured")
        }
    };
    json_error(status, code, err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_period_kind(s: &str) -> Result<PeriodKind, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "early" => Ok(PeriodKind::Early),
        "regular" => Ok(PeriodKind::Regular),
        "onsite" => Ok(PeriodKind::Onsite),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_period_kind",
            "kind must be one of: early, regular, onsite",
        )),
    }
}
