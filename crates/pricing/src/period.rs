use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use confreg_core::{DomainError, DomainResult, ValueObject};

/// Registration pricing window kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Early,
    Regular,
    Onsite,
}

/// One price entry in a period's price map.
///
/// `raw_key` is the key exactly as the society admin entered it (kept for
/// display and exact matching). `canonical_key` is computed once at write
/// time so lookups don't have to re-derive matches against free-form text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub raw_key: String,
    pub canonical_key: String,
    /// Amount in smallest currency unit. Zero is a legitimately free tier.
    pub amount: u64,
}

/// A registration pricing window (Early/Regular/Onsite).
///
/// Read-only from the wizard's perspective; the "active period" is the one
/// whose date range contains now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPeriod {
    name: String,
    kind: PeriodKind,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    prices: Vec<PriceEntry>,
}

impl ValueObject for RegistrationPeriod {}

impl RegistrationPeriod {
    pub fn new(
        name: impl Into<String>,
        kind: PeriodKind,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        prices: impl IntoIterator<Item = (String, u64)>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("period name cannot be empty"));
        }
        if ends_at <= starts_at {
            return Err(DomainError::validation("period must end after it starts"));
        }

        let mut entries: Vec<PriceEntry> = Vec::new();
        for (raw_key, amount) in prices {
            if raw_key.trim().is_empty() {
                return Err(DomainError::validation("price key cannot be empty"));
            }
            let canonical = canonical_key(&raw_key);
            if entries.iter().any(|e| e.canonical_key == canonical) {
                return Err(DomainError::validation(format!(
                    "duplicate price key after normalization: '{raw_key}'"
                )));
            }
            entries.push(PriceEntry {
                raw_key,
                canonical_key: canonical,
                amount,
            });
        }

        Ok(Self {
            name,
            kind,
            starts_at,
            ends_at,
            prices: entries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PeriodKind {
        self.kind
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    pub fn prices(&self) -> &[PriceEntry] {
        &self.prices
    }

    /// Whether the period's date range contains `now` (inclusive start,
    /// exclusive end).
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }
}

/// Pick the active period: the one whose range contains `now`.
///
/// Overlapping periods are admin error; the earliest-starting match wins so
/// the outcome is at least deterministic.
pub fn active_period(
    periods: &[RegistrationPeriod],
    now: DateTime<Utc>,
) -> Option<&RegistrationPeriod> {
    periods
        .iter()
        .filter(|p| p.contains(now))
        .min_by_key(|p| p.starts_at)
}

/// Canonical form of an admin-entered grade/price key.
///
/// Lowercases, trims, and collapses runs of whitespace and hyphens to a
/// single underscore, so "Non-member", "non member" and "NON_MEMBER" all
/// share the canonical key "non_member".
pub fn canonical_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0).unwrap()
    }

    fn period(
        name: &str,
        kind: PeriodKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RegistrationPeriod {
        RegistrationPeriod::new(name, kind, start, end, [("Member".to_string(), 50_000u64)])
            .unwrap()
    }

    #[test]
    fn canonical_key_normalizes_case_space_and_hyphen() {
        assert_eq!(canonical_key("Non-member"), "non_member");
        assert_eq!(canonical_key("  non  member "), "non_member");
        assert_eq!(canonical_key("NON_MEMBER"), "non_member");
        assert_eq!(canonical_key("Dental hygienist"), "dental_hygienist");
    }

    #[test]
    fn rejects_end_before_start() {
        let err = RegistrationPeriod::new(
            "Early",
            PeriodKind::Early,
            ts(2026, 3, 1),
            ts(2026, 2, 1),
            [],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_keys_that_collide_after_normalization() {
        let err = RegistrationPeriod::new(
            "Early",
            PeriodKind::Early,
            ts(2026, 1, 1),
            ts(2026, 2, 1),
            [
                ("Non-member".to_string(), 100_000u64),
                ("non member".to_string(), 90_000u64),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn active_period_picks_containing_range() {
        let periods = vec![
            period("Early", PeriodKind::Early, ts(2026, 1, 1), ts(2026, 2, 1)),
            period("Regular", PeriodKind::Regular, ts(2026, 2, 1), ts(2026, 3, 1)),
        ];

        assert_eq!(active_period(&periods, ts(2026, 2, 10)).unwrap().name(), "Regular");
        assert!(active_period(&periods, ts(2025, 12, 1)).is_none());
    }

    #[test]
    fn overlapping_periods_resolve_to_earliest_start() {
        let periods = vec![
            period("Late early", PeriodKind::Early, ts(2026, 1, 15), ts(2026, 3, 1)),
            period("Early", PeriodKind::Early, ts(2026, 1, 1), ts(2026, 2, 1)),
        ];

        assert_eq!(active_period(&periods, ts(2026, 1, 20)).unwrap().name(), "Early");
    }

    #[test]
    fn period_end_is_exclusive() {
        let p = period("Early", PeriodKind::Early, ts(2026, 1, 1), ts(2026, 2, 1));
        assert!(p.contains(ts(2026, 1, 1)));
        assert!(!p.contains(ts(2026, 2, 1)));
    }
}
