use serde::{Deserialize, Serialize};

use confreg_pricing::Grade;

use crate::verifier::VerificationOutcome;

/// Result of reconciling a verification outcome against the enumerated grades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeSelection {
    /// A grade was selected (verified match, or non-member/first fallback).
    Selected {
        grade: Grade,
        /// True when the selection is a fallback rather than a direct match
        /// (expired membership, or verified grade absent from the price map);
        /// callers surface a warning in that case.
        fallback: bool,
    },
    /// Verification did not succeed; leave the current selection untouched.
    Unchanged,
}

/// Reconcile a verification outcome against the grades enumerated from the
/// active period.
///
/// - Success, not expired: match the verified grade string case-insensitively
///   against each grade's `code`, then `id`, then `name`. No match falls back
///   to the non-member grade (marker match), flagged as fallback.
/// - Expired: unconditionally the non-member grade, else the first grade;
///   the verified identity is still recorded by the caller for audit.
/// - Not found: `Unchanged`.
pub fn reconcile_grade(outcome: &VerificationOutcome, grades: &[Grade]) -> GradeSelection {
    if !outcome.success {
        return GradeSelection::Unchanged;
    }

    if outcome.is_expired {
        let fallback = grades
            .iter()
            .find(|g| g.is_non_member())
            .or_else(|| grades.first());
        return match fallback {
            Some(grade) => GradeSelection::Selected {
                grade: grade.clone(),
                fallback: true,
            },
            None => GradeSelection::Unchanged,
        };
    }

    let Some(member) = &outcome.member else {
        return GradeSelection::Unchanged;
    };
    let wanted = member.grade.to_lowercase();

    let direct = grades
        .iter()
        .find(|g| g.code.to_lowercase() == wanted)
        .or_else(|| grades.iter().find(|g| g.id.to_lowercase() == wanted))
        .or_else(|| grades.iter().find(|g| g.name.to_lowercase() == wanted));
    if let Some(pick) = direct {
        return GradeSelection::Selected {
            grade: pick.clone(),
            fallback: false,
        };
    }

    match grades.iter().find(|g| g.is_non_member()) {
        Some(grade) => GradeSelection::Selected {
            grade: grade.clone(),
            fallback: true,
        },
        None => GradeSelection::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::VerifiedMember;
    use chrono::{TimeZone, Utc};

    fn grades() -> Vec<Grade> {
        vec![
            Grade {
                id: "member".to_string(),
                code: "Member".to_string(),
                name: "Member".to_string(),
            },
            Grade {
                id: "non_member".to_string(),
                code: "Non-member".to_string(),
                name: "Non-member".to_string(),
            },
            Grade {
                id: "student".to_string(),
                code: "Student".to_string(),
                name: "Student".to_string(),
            },
        ]
    }

    fn outcome(grade: &str, expired: bool) -> VerificationOutcome {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap();
        let expires_at = if expired {
            Some(now - chrono::Duration::days(1))
        } else {
            None
        };
        VerificationOutcome::verified(
            VerifiedMember {
                name: "Kim Minji".to_string(),
                member_code: "M-100".to_string(),
                grade: grade.to_string(),
                expires_at,
            },
            now,
        )
    }

    #[test]
    fn case_insensitive_code_match_selects_that_grade() {
        let selection = reconcile_grade(&outcome("MEMBER", false), &grades());
        match selection {
            GradeSelection::Selected { grade, fallback } => {
                assert_eq!(grade.id, "member");
                assert!(!fallback);
            }
            other => panic!("expected selection, got {other:?}"),
        }
    }

    #[test]
    fn unknown_grade_falls_back_to_non_member() {
        let selection = reconcile_grade(&outcome("honorary fellow", false), &grades());
        match selection {
            GradeSelection::Selected { grade, fallback } => {
                assert_eq!(grade.id, "non_member");
                assert!(fallback);
            }
            other => panic!("expected fallback selection, got {other:?}"),
        }
    }

    #[test]
    fn expired_membership_always_selects_non_member() {
        // Even when the verified grade would match directly.
        let selection = reconcile_grade(&outcome("Member", true), &grades());
        match selection {
            GradeSelection::Selected { grade, fallback } => {
                assert_eq!(grade.id, "non_member");
                assert!(fallback);
            }
            other => panic!("expected fallback selection, got {other:?}"),
        }
    }

    #[test]
    fn expired_without_non_member_grade_selects_first() {
        let only_members = vec![
            Grade {
                id: "member".to_string(),
                code: "Member".to_string(),
                name: "Member".to_string(),
            },
            Grade {
                id: "student".to_string(),
                code: "Student".to_string(),
                name: "Student".to_string(),
            },
        ];
        let selection = reconcile_grade(&outcome("Member", true), &only_members);
        match selection {
            GradeSelection::Selected { grade, fallback } => {
                assert_eq!(grade.id, "member");
                assert!(fallback);
            }
            other => panic!("expected fallback selection, got {other:?}"),
        }
    }

    #[test]
    fn not_found_leaves_selection_unchanged() {
        let outcome = VerificationOutcome::not_found("no matching member record found");
        assert_eq!(reconcile_grade(&outcome, &grades()), GradeSelection::Unchanged);
    }
}
