//! # Criteria Ordering
//!
//! The single display order used by every read path (release detail,
//! sign-off matrix, CLI output).
//!
//! Canonical criteria come first, in `CANONICAL_CRITERIA` order. Custom
//! criteria follow, alphabetically and case-insensitively.

use crate::Criterion;
use crate::primitives::CANONICAL_CRITERIA;

/// Sort key for a criterion name.
///
/// The derived `Ord` places every `Canonical` before every `Custom`,
/// matching the `(0, index)` / `(1, lowercase)` tuple order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CriteriaSortKey {
    Canonical(usize),
    Custom(String),
}

impl CriteriaSortKey {
    #[must_use]
    pub fn for_name(name: &str) -> Self {
        match CANONICAL_CRITERIA.iter().position(|known| *known == name) {
            Some(index) => Self::Canonical(index),
            None => Self::Custom(name.to_lowercase()),
        }
    }

    #[must_use]
    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::Canonical(_))
    }
}

/// Sort criteria in place into display order. Stable for equal keys.
pub fn sort_criteria(criteria: &mut [Criterion]) {
    criteria.sort_by_cached_key(|c| CriteriaSortKey::for_name(&c.name));
}

/// Owned variant of [`sort_criteria`].
#[must_use]
pub fn sorted_criteria(mut criteria: Vec<Criterion>) -> Vec<Criterion> {
    sort_criteria(&mut criteria);
    criteria
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CriterionId, CriterionStatus, ReleaseId};
    use chrono::DateTime;

    fn named(id: u64, name: &str) -> Criterion {
        Criterion {
            id: CriterionId(id),
            release_id: ReleaseId(1),
            name: name.to_string(),
            description: None,
            is_mandatory: true,
            owner: None,
            status: CriterionStatus::Pending,
            order: 0,
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
        }
    }

    fn names(criteria: &[Criterion]) -> Vec<&str> {
        criteria.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn canonical_before_custom() {
        let sorted = sorted_criteria(vec![
            named(1, "Content Review"),
            named(2, "Zeta Custom"),
            named(3, "Bug Verification"),
        ]);
        assert_eq!(
            names(&sorted),
            vec!["Content Review", "Bug Verification", "Zeta Custom"]
        );
    }

    #[test]
    fn custom_sorted_case_insensitively() {
        let sorted = sorted_criteria(vec![
            named(1, "beta"),
            named(2, "Alpha"),
            named(3, "Security Audit"),
            named(4, "Gamma"),
        ]);
        assert_eq!(names(&sorted), vec!["Security Audit", "Alpha", "beta", "Gamma"]);
    }

    #[test]
    fn canonical_match_is_case_sensitive() {
        // "content review" is not the canonical name, so it is custom.
        let key = CriteriaSortKey::for_name("content review");
        assert!(!key.is_canonical());
        assert!(CriteriaSortKey::for_name("Security Audit") < key);
    }

    #[test]
    fn full_canonical_order_is_preserved() {
        let mut reversed: Vec<Criterion> = CANONICAL_CRITERIA
            .iter()
            .rev()
            .enumerate()
            .map(|(i, name)| named(i as u64, name))
            .collect();
        sort_criteria(&mut reversed);
        assert_eq!(names(&reversed), CANONICAL_CRITERIA.to_vec());
    }
}
