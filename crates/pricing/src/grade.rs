use serde::{Deserialize, Serialize};

use confreg_core::ValueObject;

use crate::labels::GradeLabels;
use crate::period::{RegistrationPeriod, canonical_key};

/// A registration pricing tier, projected from a period's price map.
///
/// Grades are not stored entities: `id` is the canonical price key, `code`
/// the raw admin-entered key, and `name` the resolved display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub id: String,
    pub code: String,
    pub name: String,
}

impl ValueObject for Grade {}

impl Grade {
    /// Enumerate the grades available in a period, in price-map order.
    pub fn enumerate(period: &RegistrationPeriod, labels: &GradeLabels) -> Vec<Grade> {
        period
            .prices()
            .iter()
            .map(|entry| Grade {
                id: entry.canonical_key.clone(),
                code: entry.raw_key.clone(),
                name: labels.display_name(&entry.raw_key),
            })
            .collect()
    }

    /// Whether this grade is the non-member tier.
    ///
    /// Matches a "non-member" marker in the code or name, tolerant of the
    /// spelling variants societies actually enter.
    pub fn is_non_member(&self) -> bool {
        let code = canonical_key(&self.code);
        let name = canonical_key(&self.name);
        code.contains("non_member")
            || code.contains("nonmember")
            || name.contains("non_member")
            || name.contains("nonmember")
            || name.contains("비회원")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::BilingualLabel;
    use crate::period::PeriodKind;
    use chrono::{TimeZone, Utc};

    fn sample_period() -> RegistrationPeriod {
        RegistrationPeriod::new(
            "Regular",
            PeriodKind::Regular,
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            [
                ("Member".to_string(), 50_000u64),
                ("Non-member".to_string(), 100_000u64),
                ("Dental hygienist".to_string(), 80_000u64),
            ],
        )
        .unwrap()
    }

    #[test]
    fn enumerate_projects_price_keys_in_order() {
        let mut labels = GradeLabels::new();
        labels.insert("Member", BilingualLabel::new("Member", Some("회원".to_string())));

        let grades = Grade::enumerate(&sample_period(), &labels);
        assert_eq!(grades.len(), 3);
        assert_eq!(grades[0].id, "member");
        assert_eq!(grades[0].code, "Member");
        assert_eq!(grades[0].name, "Member");
        assert_eq!(grades[1].id, "non_member");
        // No label entry: display name falls back to the raw key.
        assert_eq!(grades[2].name, "Dental hygienist");
    }

    #[test]
    fn non_member_marker_matches_spelling_variants() {
        for code in ["Non-member", "non member", "NONMEMBER", "non_member"] {
            let grade = Grade {
                id: canonical_key(code),
                code: code.to_string(),
                name: code.to_string(),
            };
            assert!(grade.is_non_member(), "expected non-member for {code:?}");
        }

        let member = Grade {
            id: "member".to_string(),
            code: "Member".to_string(),
            name: "Member".to_string(),
        };
        assert!(!member.is_non_member());
    }
}
