use serde::{Deserialize, Serialize};

use crate::grade::Grade;
use crate::period::{RegistrationPeriod, canonical_key};

/// Outcome of a price lookup.
///
/// `Missing` is distinct from `Amount(0)`: a zero price is a legitimately
/// free tier, while a missing price means the admin never configured the
/// grade and the caller must surface "contact admin" instead of charging
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceResolution {
    Amount { amount: u64 },
    Missing,
}

impl PriceResolution {
    pub fn amount(self) -> Option<u64> {
        match self {
            PriceResolution::Amount { amount } => Some(amount),
            PriceResolution::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, PriceResolution::Missing)
    }
}

/// Resolve the fee for a single grade key against a period's price map.
///
/// Lookup order: exact raw key, case-insensitive raw key, canonical key.
pub fn resolve_price_key(period: &RegistrationPeriod, key: &str) -> PriceResolution {
    let entries = period.prices();

    if let Some(e) = entries.iter().find(|e| e.raw_key == key) {
        return PriceResolution::Amount { amount: e.amount };
    }

    let lower = key.to_lowercase();
    if let Some(e) = entries.iter().find(|e| e.raw_key.to_lowercase() == lower) {
        return PriceResolution::Amount { amount: e.amount };
    }

    let canonical = canonical_key(key);
    if let Some(e) = entries.iter().find(|e| e.canonical_key == canonical) {
        return PriceResolution::Amount { amount: e.amount };
    }

    PriceResolution::Missing
}

/// Resolve the fee for a grade.
///
/// Tries the grade's code, then id, then display name, each through the
/// per-key cascade. Admin-entered price maps rarely agree on one spelling,
/// so the match is deliberately forgiving at read time.
pub fn resolve_price(period: &RegistrationPeriod, grade: &Grade) -> PriceResolution {
    for key in [&grade.code, &grade.id, &grade.name] {
        let resolved = resolve_price_key(period, key);
        if !resolved.is_missing() {
            return resolved;
        }
    }
    PriceResolution::Missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::GradeLabels;
    use crate::period::PeriodKind;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn period_with(prices: Vec<(String, u64)>) -> RegistrationPeriod {
        RegistrationPeriod::new(
            "Regular",
            PeriodKind::Regular,
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            prices,
        )
        .unwrap()
    }

    fn sample_period() -> RegistrationPeriod {
        period_with(vec![
            ("Non-member".to_string(), 100_000),
            ("Dental hygienist".to_string(), 80_000),
            ("Free observer".to_string(), 0),
        ])
    }

    #[test]
    fn exact_key_resolves() {
        let p = sample_period();
        assert_eq!(
            resolve_price_key(&p, "Non-member"),
            PriceResolution::Amount { amount: 100_000 }
        );
    }

    #[test]
    fn case_insensitive_key_resolves() {
        let p = sample_period();
        assert_eq!(
            resolve_price_key(&p, "non-member").amount(),
            Some(100_000)
        );
        assert_eq!(
            resolve_price_key(&p, "DENTAL HYGIENIST").amount(),
            Some(80_000)
        );
    }

    #[test]
    fn normalized_grade_code_resolves() {
        // The grade code uses underscores while the price key is hyphenated.
        let p = sample_period();
        assert_eq!(resolve_price_key(&p, "non_member").amount(), Some(100_000));
    }

    #[test]
    fn missing_key_is_missing_not_zero() {
        let p = sample_period();
        let resolved = resolve_price_key(&p, "exhibitor");
        assert!(resolved.is_missing());
        assert_eq!(resolved.amount(), None);
    }

    #[test]
    fn zero_price_is_a_valid_amount() {
        let p = sample_period();
        assert_eq!(
            resolve_price_key(&p, "Free observer"),
            PriceResolution::Amount { amount: 0 }
        );
    }

    #[test]
    fn grade_cascade_falls_through_code_then_id_then_name() {
        let p = sample_period();
        let grade = Grade {
            id: "non_member".to_string(),
            code: "guest_code_not_in_map".to_string(),
            name: "Guest".to_string(),
        };
        assert_eq!(resolve_price(&p, &grade).amount(), Some(100_000));

        let by_name = Grade {
            id: "nowhere".to_string(),
            code: "also_nowhere".to_string(),
            name: "Dental hygienist".to_string(),
        };
        assert_eq!(resolve_price(&p, &by_name).amount(), Some(80_000));
    }

    #[test]
    fn enumerated_grades_always_resolve() {
        let p = sample_period();
        let labels = GradeLabels::new();
        for grade in Grade::enumerate(&p, &labels) {
            assert!(
                !resolve_price(&p, &grade).is_missing(),
                "grade {grade:?} must resolve against its own period"
            );
        }
    }

    proptest! {
        /// Any stored key resolves to its stored amount, under casing and
        /// separator variants of the key.
        #[test]
        fn stored_keys_resolve_under_variants(
            base in "[A-Za-z][A-Za-z ]{0,14}[A-Za-z]",
            amount in 0u64..10_000_000,
        ) {
            let p = period_with(vec![(base.clone(), amount)]);

            prop_assert_eq!(resolve_price_key(&p, &base).amount(), Some(amount));
            prop_assert_eq!(resolve_price_key(&p, &base.to_lowercase()).amount(), Some(amount));
            prop_assert_eq!(resolve_price_key(&p, &base.to_uppercase()).amount(), Some(amount));
            prop_assert_eq!(
                resolve_price_key(&p, &base.replace(' ', "_")).amount(),
                Some(amount)
            );
            prop_assert_eq!(
                resolve_price_key(&p, &base.replace(' ', "-")).amount(),
                Some(amount)
            );
        }

        /// Keys sharing no canonical form with any entry never resolve.
        #[test]
        fn unrelated_keys_stay_missing(amount in 0u64..10_000_000) {
            let p = period_with(vec![("Member".to_string(), amount)]);
            prop_assert!(resolve_price_key(&p, "totally unrelated tier").is_missing());
        }
    }
}
