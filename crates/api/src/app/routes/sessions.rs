use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use confreg_core::{AggregateId, AttendeeId};
use confreg_identity::{
    AbortUpgrade, BeginUpgrade, CompleteUpgrade, Permission, SessionCommand, SessionId,
    StartAnonymousSession,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, SocietyContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(start_session))
        .route("/:id", get(get_session))
        .route("/:id/upgrade", post(begin_upgrade))
        .route("/:id/upgrade/complete", post(complete_upgrade))
        .route("/:id/upgrade/abort", post(abort_upgrade))
}

fn parse_id(id: &str) -> Result<AggregateId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid session id")
    })
}

fn dispatch(
    services: &AppServices,
    society: &SocietyContext,
    principal: &PrincipalContext,
    session_id: SessionId,
    command: SessionCommand,
) -> Result<Vec<confreg_infra::StoredEvent>, axum::response::Response> {
    let cmd_auth = CmdAuth {
        inner: command,
        required: vec![Permission::new("sessions.write")],
    };
    if let Err(e) = crate::authz::authorize_command(society, principal, &cmd_auth) {
        return Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            e.to_string(),
        ));
    }

    services
        .dispatch_session(society.society_id(), session_id, cmd_auth.inner)
        .map_err(errors::dispatch_error_to_response)
}

pub async fn start_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let session_id = crate::app::services::new_session_id();

    let cmd = SessionCommand::StartAnonymous(StartAnonymousSession {
        society_id: society.society_id(),
        session_id,
        attendee_id: AttendeeId::from_uuid(*principal.principal_id().as_uuid()),
        occurred_at: Utc::now(),
    });

    let committed = match dispatch(&services, &society, &principal, session_id, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": session_id.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn get_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .sessions()
        .get(society.society_id(), &SessionId::new(agg))
    {
        Some(rm) => (StatusCode::OK, Json(dto::session_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "session not found"),
    }
}

/// Begin the anonymous-to-credentialed upgrade.
///
/// The email must not already be bound to another session in this society;
/// that check is a read-model courtesy, the provider enforces it for real.
pub async fn begin_upgrade(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpgradeRequest>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let session_id = SessionId::new(agg);

    if services
        .sessions()
        .email_in_use(society.society_id(), &body.email)
    {
        return errors::json_error(
            StatusCode::CONFLICT,
            "duplicate_email",
            "email is already in use",
        );
    }

    let cmd = SessionCommand::BeginUpgrade(BeginUpgrade {
        society_id: society.society_id(),
        session_id,
        email: body.email,
        password: body.password,
        occurred_at: Utc::now(),
    });

    match dispatch(&services, &society, &principal, session_id, cmd) {
        Ok(c) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": session_id.to_string(),
                "events_committed": c.len(),
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn complete_upgrade(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let session_id = SessionId::new(agg);

    let cmd = SessionCommand::CompleteUpgrade(CompleteUpgrade {
        society_id: society.society_id(),
        session_id,
        occurred_at: Utc::now(),
    });

    match dispatch(&services, &society, &principal, session_id, cmd) {
        Ok(c) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": session_id.to_string(),
                "events_committed": c.len(),
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn abort_upgrade(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AbortUpgradeRequest>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let session_id = SessionId::new(agg);

    let cmd = SessionCommand::AbortUpgrade(AbortUpgrade {
        society_id: society.society_id(),
        session_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    match dispatch(&services, &society, &principal, session_id, cmd) {
        Ok(c) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": session_id.to_string(),
                "events_committed": c.len(),
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}
