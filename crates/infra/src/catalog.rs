//! Society-scoped period catalog.
//!
//! Periods are admin-curated reference data, not an event-sourced aggregate;
//! the catalog is a plain society-isolated store the API reads on every
//! pricing decision.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use confreg_core::{DomainError, SocietyId};
use confreg_pricing::{RegistrationPeriod, active_period};

/// In-memory period catalog.
#[derive(Debug, Default)]
pub struct PeriodCatalog {
    periods: RwLock<HashMap<SocietyId, Vec<RegistrationPeriod>>>,
}

impl PeriodCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a period. Period names are unique within a society.
    pub fn add(&self, society_id: SocietyId, period: RegistrationPeriod) -> Result<(), DomainError> {
        let mut map = self
            .periods
            .write()
            .map_err(|_| DomainError::invariant("catalog lock poisoned"))?;
        let periods = map.entry(society_id).or_default();
        if periods.iter().any(|p| p.name() == period.name()) {
            return Err(DomainError::conflict(format!(
                "a period named '{}' already exists",
                period.name()
            )));
        }
        periods.push(period);
        Ok(())
    }

    pub fn list(&self, society_id: SocietyId) -> Vec<RegistrationPeriod> {
        self.periods
            .read()
            .ok()
            .and_then(|map| map.get(&society_id).cloned())
            .unwrap_or_default()
    }

    /// The period whose range contains `now`, earliest start winning overlaps.
    pub fn active(&self, society_id: SocietyId, now: DateTime<Utc>) -> Option<RegistrationPeriod> {
        let list = self.list(society_id);
        active_period(&list, now).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use confreg_pricing::PeriodKind;

    fn period(name: &str, start_day: u32, end_day: u32) -> RegistrationPeriod {
        RegistrationPeriod::new(
            name,
            PeriodKind::Early,
            Utc.with_ymd_and_hms(2026, 3, start_day, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, end_day, 0, 0, 0).unwrap(),
            [("Member".to_string(), 100_000)],
        )
        .unwrap()
    }

    #[test]
    fn catalog_is_society_scoped() {
        let catalog = PeriodCatalog::new();
        let a = SocietyId::new();
        let b = SocietyId::new();
        catalog.add(a, period("early", 1, 10)).unwrap();

        assert_eq!(catalog.list(a).len(), 1);
        assert!(catalog.list(b).is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let catalog = PeriodCatalog::new();
        let society = SocietyId::new();
        catalog.add(society, period("early", 1, 10)).unwrap();
        let err = catalog.add(society, period("early", 11, 20)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn active_resolves_by_date() {
        let catalog = PeriodCatalog::new();
        let society = SocietyId::new();
        catalog.add(society, period("early", 1, 10)).unwrap();
        catalog.add(society, period("regular", 10, 20)).unwrap();

        let now = Utc.with_ymd_and_hms(2026, 3, 12, 0, 0, 0).unwrap();
        assert_eq!(catalog.active(society, now).unwrap().name(), "regular");
    }
}
