//! Society-isolated read model storage abstractions.

pub mod society_store;

pub use society_store::{InMemorySocietyStore, SocietyStore};
