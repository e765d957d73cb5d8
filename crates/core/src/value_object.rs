//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Two value
/// objects with the same attribute values are the same value. A
/// `RegistrationPeriod` is a value object; a `Registration` is an entity.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
