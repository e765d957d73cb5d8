//! Society-admin routes: grade display labels and the dev member directory.

use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::post,
};

use confreg_identity::Permission;
use confreg_membership::VerifiedMember;
use confreg_pricing::{BilingualLabel, GradeLabels};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/labels", post(set_labels))
        .route("/members", post(seed_member))
}

/// Replace the society's grade label map.
pub async fn set_labels(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<crate::context::SocietyContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<Vec<dto::GradeLabelRequest>>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("admin.labels")],
    };
    if let Err(e) = crate::authz::authorize_command(&society, &principal, &auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let mut labels = GradeLabels::new();
    for entry in body {
        labels.insert(entry.key, BilingualLabel::new(entry.english, entry.local));
    }
    services.set_labels(society.society_id(), labels);

    StatusCode::NO_CONTENT.into_response()
}

/// Seed a member record into the in-memory verification directory.
pub async fn seed_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<crate::context::SocietyContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::SeedMemberRequest>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("admin.members")],
    };
    if let Err(e) = crate::authz::authorize_command(&society, &principal, &auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    services.seed_member(
        society.society_id(),
        VerifiedMember {
            name: body.name,
            member_code: body.member_code,
            grade: body.grade,
            expires_at: body.expires_at,
        },
    );

    StatusCode::CREATED.into_response()
}
