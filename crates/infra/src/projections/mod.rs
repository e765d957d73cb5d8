//! Projection implementations (read model builders).
//!
//! Projections consume domain events and build query-optimized read models.
//! All projections are rebuildable from the stream, society-isolated, and
//! idempotent under at-least-once delivery.

pub mod registrations;
pub mod sessions;

pub use registrations::{
    RegistrationProjectionError, RegistrationReadModel, RegistrationsProjection,
};
pub use sessions::{SessionProjectionError, SessionReadModel, SessionsProjection};
