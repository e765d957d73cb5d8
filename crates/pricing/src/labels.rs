use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use confreg_core::ValueObject;

/// A bilingual display label for a grade, maintained manually per society.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualLabel {
    pub primary: String,
    pub secondary: Option<String>,
}

impl BilingualLabel {
    pub fn new(primary: impl Into<String>, secondary: Option<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary,
        }
    }
}

/// Per-society manual label map for grade display names.
///
/// Display-name resolution is best-effort and has no effect on pricing:
/// exact key, then lowercase key, then the raw code itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GradeLabels {
    labels: HashMap<String, BilingualLabel>,
}

impl ValueObject for GradeLabels {}

impl GradeLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, label: BilingualLabel) {
        self.labels.insert(key.into(), label);
    }

    /// Resolve the display name for a price key.
    ///
    /// Cascade: exact key → lowercase key → the raw key itself.
    pub fn display_name(&self, raw_key: &str) -> String {
        if let Some(label) = self.labels.get(raw_key) {
            return label.primary.clone();
        }

        let lower = raw_key.to_lowercase();
        if let Some(label) = self.labels.get(&lower) {
            return label.primary.clone();
        }

        raw_key.to_string()
    }

    pub fn get(&self, raw_key: &str) -> Option<&BilingualLabel> {
        self.labels.get(raw_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_exact_key() {
        let mut labels = GradeLabels::new();
        labels.insert("Non-member", BilingualLabel::new("Non-member", Some("비회원".to_string())));
        labels.insert("non-member", BilingualLabel::new("lowercase entry", None));

        assert_eq!(labels.display_name("Non-member"), "Non-member");
    }

    #[test]
    fn display_name_falls_back_to_lowercase_key() {
        let mut labels = GradeLabels::new();
        labels.insert("student", BilingualLabel::new("Student", Some("학생".to_string())));

        assert_eq!(labels.display_name("STUDENT"), "Student");
    }

    #[test]
    fn display_name_falls_back_to_raw_key() {
        let labels = GradeLabels::new();
        assert_eq!(labels.display_name("dental_hygienist"), "dental_hygienist");
    }
}
