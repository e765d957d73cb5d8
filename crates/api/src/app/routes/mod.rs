use axum::{Router, routing::get};

pub mod admin;
pub mod common;
pub mod payments;
pub mod periods;
pub mod registrations;
pub mod sessions;
pub mod system;

/// Router for all authenticated (society-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/periods", periods::router())
        .nest("/registrations", registrations::router())
        .nest("/sessions", sessions::router())
        .nest("/admin", admin::router())
}
