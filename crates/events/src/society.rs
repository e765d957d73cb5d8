use confreg_core::SocietyId;

use crate::EventEnvelope;

/// Helper trait for society-scoped messages.
///
/// Marks types that carry a society ID so infrastructure components can
/// filter subscriptions by society and validate that messages belong to the
/// expected society.
pub trait SocietyScoped {
    fn society_id(&self) -> SocietyId;
}

impl<E> SocietyScoped for EventEnvelope<E> {
    fn society_id(&self) -> SocietyId {
        EventEnvelope::society_id(self)
    }
}
