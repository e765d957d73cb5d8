use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use confreg_identity::Permission;
use confreg_infra::DispatchError;
use confreg_pricing::{RegistrationPeriod, resolve_price};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_period).get(list_periods))
        .route("/active", get(active_period))
}

pub async fn create_period(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<crate::context::SocietyContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreatePeriodRequest>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("periods.create")],
    };
    if let Err(e) = crate::authz::authorize_command(&society, &principal, &auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let kind = match errors::parse_period_kind(&body.kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    let period = match RegistrationPeriod::new(
        body.name,
        kind,
        body.starts_at,
        body.ends_at,
        body.prices.into_iter().map(|p| (p.key, p.amount)),
    ) {
        Ok(p) => p,
        Err(e) => return errors::dispatch_error_to_response(DispatchError::from(e)),
    };

    if let Err(e) = services.periods().add(society.society_id(), period.clone()) {
        return errors::dispatch_error_to_response(DispatchError::from(e));
    }

    (StatusCode::CREATED, Json(dto::period_to_json(&period))).into_response()
}

pub async fn list_periods(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<crate::context::SocietyContext>,
) -> axum::response::Response {
    let items = services
        .periods()
        .list(society.society_id())
        .iter()
        .map(dto::period_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// The active period plus its grades with resolved prices, as the wizard's
/// grade-selection step renders them.
pub async fn active_period(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<crate::context::SocietyContext>,
) -> axum::response::Response {
    let now = Utc::now();
    let Some(period) = services.active_period(society.society_id(), now) else {
        return errors::json_error(
            StatusCode::NOT_FOUND,
            "no_active_period",
            "no registration period is active",
        );
    };

    let grades = services
        .active_grades(society.society_id(), now)
        .iter()
        .map(|g| dto::grade_to_json(g, resolve_price(&period, g).amount()))
        .collect::<Vec<_>>();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "period": dto::period_to_json(&period),
            "grades": grades,
        })),
    )
        .into_response()
}
