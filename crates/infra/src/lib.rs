//! Infrastructure layer: event store, command dispatch, read models.

pub mod catalog;
pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;

#[cfg(test)]
mod integration_tests;

pub use catalog::PeriodCatalog;
pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, PublishingEventStore, StoredEvent,
    UncommittedEvent,
};
pub use projections::{
    RegistrationReadModel, RegistrationsProjection, SessionReadModel, SessionsProjection,
};
pub use read_model::{InMemorySocietyStore, SocietyStore};
