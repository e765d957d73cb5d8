use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use confreg_core::{AggregateId, AttendeeId, ConferenceId};
use confreg_identity::Permission;
use confreg_membership::{GradeSelection, VerificationRequest, VerifyError, reconcile_grade};
use confreg_payments::{CheckoutData, RegistrantSnapshot, build_callback_urls};
use confreg_registration::{
    AcceptTerms, Agreements, AttendeeInfo, BeginPayment, CancelRegistration, GoBack, GradeChoice,
    MemberVerificationRecord, RecordMemberVerification, RegistrationCommand, RegistrationEvent,
    RegistrationId, SelectGrade, StartRegistration, SubmitAttendeeInfo,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, SocietyContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(start_registration).get(list_registrations))
        .route("/draft", get(get_draft))
        .route("/:id", get(get_registration))
        .route("/:id/terms", post(accept_terms))
        .route("/:id/attendee", post(submit_attendee_info))
        .route("/:id/grade", post(select_grade))
        .route("/:id/verify", post(verify_member))
        .route("/:id/back", post(go_back))
        .route("/:id/cancel", post(cancel_registration))
        .route("/:id/payment/session", post(create_payment_session))
}

/// The attendee identity bound to the request's principal.
fn attendee_of(principal: &PrincipalContext) -> AttendeeId {
    AttendeeId::from_uuid(*principal.principal_id().as_uuid())
}

fn parse_id(id: &str) -> Result<AggregateId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid registration id")
    })
}

fn dispatch(
    services: &AppServices,
    society: &SocietyContext,
    principal: &PrincipalContext,
    registration_id: RegistrationId,
    command: RegistrationCommand,
) -> Result<Vec<confreg_infra::StoredEvent>, axum::response::Response> {
    let cmd_auth = CmdAuth {
        inner: command,
        required: vec![Permission::new("registrations.write")],
    };
    if let Err(e) = crate::authz::authorize_command(society, principal, &cmd_auth) {
        return Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            e.to_string(),
        ));
    }

    services
        .dispatch_registration(society.society_id(), registration_id, cmd_auth.inner)
        .map_err(errors::dispatch_error_to_response)
}

fn committed_response(id: RegistrationId, committed: &[confreg_infra::StoredEvent]) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": id.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn start_registration(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::StartRegistrationRequest>,
) -> axum::response::Response {
    let registration_id = crate::app::services::new_registration_id();

    let cmd = RegistrationCommand::Start(StartRegistration {
        society_id: society.society_id(),
        registration_id,
        conference_id: ConferenceId::from_uuid(body.conference_id),
        attendee_id: attendee_of(&principal),
        occurred_at: Utc::now(),
    });

    let committed = match dispatch(&services, &society, &principal, registration_id, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": registration_id.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn list_registrations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
) -> axum::response::Response {
    let items = services
        .registrations()
        .list(society.society_id())
        .into_iter()
        .map(dto::registration_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// The principal's resumable draft, if one exists.
pub async fn get_draft(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services
        .registrations()
        .draft_for(society.society_id(), attendee_of(&principal))
    {
        Some(rm) => (StatusCode::OK, Json(dto::registration_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "no draft registration"),
    }
}

pub async fn get_registration(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .registrations()
        .get(society.society_id(), &RegistrationId::new(agg))
    {
        Some(rm) => (StatusCode::OK, Json(dto::registration_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "registration not found"),
    }
}

pub async fn accept_terms(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TermsRequest>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let registration_id = RegistrationId::new(agg);

    let cmd = RegistrationCommand::AcceptTerms(AcceptTerms {
        society_id: society.society_id(),
        registration_id,
        agreements: Agreements {
            terms_of_service: body.terms_of_service,
            privacy_policy: body.privacy_policy,
            third_party_sharing: body.third_party_sharing,
        },
        occurred_at: Utc::now(),
    });

    match dispatch(&services, &society, &principal, registration_id, cmd) {
        Ok(c) => committed_response(registration_id, &c),
        Err(resp) => resp,
    }
}

pub async fn submit_attendee_info(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AttendeeInfoRequest>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let registration_id = RegistrationId::new(agg);

    let cmd = RegistrationCommand::SubmitAttendeeInfo(SubmitAttendeeInfo {
        society_id: society.society_id(),
        registration_id,
        attendee: AttendeeInfo {
            name: body.name,
            email: body.email,
            phone: body.phone,
            affiliation: body.affiliation,
            license_number: body.license_number,
        },
        occurred_at: Utc::now(),
    });

    match dispatch(&services, &society, &principal, registration_id, cmd) {
        Ok(c) => committed_response(registration_id, &c),
        Err(resp) => resp,
    }
}

/// Manual grade selection against the active period's price map.
pub async fn select_grade(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SelectGradeRequest>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let registration_id = RegistrationId::new(agg);

    let (grade, resolution) =
        match services.resolve_grade(society.society_id(), &body.grade_key, Utc::now()) {
            Ok(pair) => pair,
            Err(e) => return errors::dispatch_error_to_response(e.into()),
        };

    let choice = GradeChoice {
        grade_id: grade.id.clone(),
        grade_code: grade.code.clone(),
        amount: resolution.amount(),
        fallback: false,
    };

    let cmd = RegistrationCommand::SelectGrade(SelectGrade {
        society_id: society.society_id(),
        registration_id,
        choice: choice.clone(),
        occurred_at: Utc::now(),
    });

    match dispatch(&services, &society, &principal, registration_id, cmd) {
        Ok(c) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": registration_id.to_string(),
                "events_committed": c.len(),
                "grade": {
                    "id": choice.grade_id,
                    "code": choice.grade_code,
                    "amount": choice.amount,
                    "fallback": choice.fallback,
                },
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

/// Verify society membership, record the outcome, and reconcile the grade.
///
/// "Not found" is a 200 with `success=false`; the current selection is left
/// alone. A successful verification records the identity for audit and, when
/// reconciliation picks a grade, selects it (advancing the wizard).
pub async fn verify_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::VerifyMemberRequest>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let registration_id = RegistrationId::new(agg);
    let now = Utc::now();

    let request = VerificationRequest {
        name: body.name,
        member_code: body.member_code,
        consent: body.consent,
    };
    let outcome = match services.verifier().verify(society.society_id(), &request, now) {
        Ok(o) => o,
        Err(VerifyError::ConsentRequired) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "consent_required",
                "verification requires consent",
            );
        }
        Err(VerifyError::IncompleteRequest(msg)) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg);
        }
        Err(VerifyError::Unavailable(msg)) => {
            return errors::json_error(StatusCode::BAD_GATEWAY, "verifier_unavailable", msg);
        }
    };

    let mut events_committed = 0usize;

    if let Some(member) = &outcome.member {
        let cmd = RegistrationCommand::RecordMemberVerification(RecordMemberVerification {
            society_id: society.society_id(),
            registration_id,
            record: MemberVerificationRecord {
                member: member.clone(),
                is_expired: outcome.is_expired,
                verified_at: now,
            },
            occurred_at: now,
        });
        match dispatch(&services, &society, &principal, registration_id, cmd) {
            Ok(c) => events_committed += c.len(),
            Err(resp) => return resp,
        }
    }

    let grades = services.active_grades(society.society_id(), now);
    let selection = reconcile_grade(&outcome, &grades);

    let selected = match &selection {
        GradeSelection::Selected { grade, fallback } => {
            let amount = services
                .active_period(society.society_id(), now)
                .map(|period| confreg_pricing::resolve_price(&period, grade).amount())
                .unwrap_or(None);
            let choice = GradeChoice {
                grade_id: grade.id.clone(),
                grade_code: grade.code.clone(),
                amount,
                fallback: *fallback,
            };
            let cmd = RegistrationCommand::SelectGrade(SelectGrade {
                society_id: society.society_id(),
                registration_id,
                choice: choice.clone(),
                occurred_at: now,
            });
            match dispatch(&services, &society, &principal, registration_id, cmd) {
                Ok(c) => events_committed += c.len(),
                Err(resp) => return resp,
            }
            Some(choice)
        }
        GradeSelection::Unchanged => None,
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": registration_id.to_string(),
            "events_committed": events_committed,
            "verification": {
                "success": outcome.success,
                "is_expired": outcome.is_expired,
                "message": outcome.message,
            },
            "selection": selected.map(|c| serde_json::json!({
                "id": c.grade_id,
                "code": c.grade_code,
                "amount": c.amount,
                "fallback": c.fallback,
            })),
        })),
    )
        .into_response()
}

pub async fn go_back(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let registration_id = RegistrationId::new(agg);

    let cmd = RegistrationCommand::GoBack(GoBack {
        society_id: society.society_id(),
        registration_id,
        occurred_at: Utc::now(),
    });

    match dispatch(&services, &society, &principal, registration_id, cmd) {
        Ok(c) => committed_response(registration_id, &c),
        Err(resp) => resp,
    }
}

pub async fn cancel_registration(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelRequest>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let registration_id = RegistrationId::new(agg);

    let cmd = RegistrationCommand::Cancel(CancelRegistration {
        society_id: society.society_id(),
        registration_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    match dispatch(&services, &society, &principal, registration_id, cmd) {
        Ok(c) => committed_response(registration_id, &c),
        Err(resp) => resp,
    }
}

/// Start a payment attempt and hand back everything the checkout surface
/// needs: order id, amount, provider client key, and callback URLs.
pub async fn create_payment_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let registration_id = RegistrationId::new(agg);

    let Some(rm) = services
        .registrations()
        .get(society.society_id(), &registration_id)
    else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "registration not found");
    };
    let Some(attendee) = rm.attendee else {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "attendee information is missing",
        );
    };
    let Some(grade) = rm.grade else {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "no grade is selected",
        );
    };

    let order_id = format!("reg-{}", uuid::Uuid::now_v7());
    let cmd = RegistrationCommand::BeginPayment(BeginPayment {
        society_id: society.society_id(),
        registration_id,
        order_id: order_id.clone(),
        occurred_at: Utc::now(),
    });
    let committed = match dispatch(&services, &society, &principal, registration_id, cmd) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    // The aggregate decided the amount; read it off the committed event
    // rather than the possibly-stale read model.
    let amount = committed.iter().find_map(|stored| {
        match serde_json::from_value::<RegistrationEvent>(stored.payload.clone()) {
            Ok(RegistrationEvent::PaymentStarted(e)) => Some(e.amount),
            _ => None,
        }
    });
    let Some(amount) = amount else {
        return errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "payment_start_missing",
            "payment start was not recorded",
        );
    };

    let config = services.payment_config().clone();
    let manager = services.payment_sessions();
    if let Err(e) = manager.ensure_session(&config.client_key, agg, amount) {
        return errors::payment_error_to_response(e);
    }
    if let Err(e) = manager.mark_methods_ready(agg) {
        return errors::payment_error_to_response(e);
    }
    let session = match manager.checkout_session(agg) {
        Ok(s) => s,
        Err(e) => return errors::payment_error_to_response(e),
    };

    let snapshot = RegistrantSnapshot {
        name: attendee.name,
        email: attendee.email,
        phone: attendee.phone,
        grade: grade.grade_code,
        attendee_id: rm.attendee_id,
        anonymous: principal.is_anonymous(),
    };
    let urls = match build_callback_urls(&config.callback_base, &order_id, &snapshot) {
        Ok(u) => u,
        Err(e) => return errors::payment_error_to_response(e),
    };

    let checkout = CheckoutData {
        order_id,
        amount,
        client_key: session.client_key,
        urls,
    };

    (StatusCode::CREATED, Json(serde_json::json!(checkout))).into_response()
}
