//! # Progress Calculator
//!
//! Folds a release's criteria into readiness metrics.
//!
//! - Mandatory and optional criteria are counted separately
//! - Percentages are integer (floor), 0..=100; basis points (floor,
//!   0..=10000) carry two more digits, so 2 of 3 is 66% and 6666 bp
//! - An empty partition is vacuously complete (100%)
//!
//! Progress is never stored; every read path recomputes it.

use crate::primitives::{BASIS_POINTS_SCALE, VACUOUS_PERCENT};
use crate::{Criterion, CriterionStatus};
use serde::{Deserialize, Serialize};

/// Readiness summary of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub mandatory_total: usize,
    pub mandatory_approved: usize,
    /// Floored: 2 of 3 approved reports 66.
    pub mandatory_percent: u8,
    /// Hundredths of a percent, floored: 2 of 3 approved reports 6666.
    pub mandatory_basis_points: u16,
    pub optional_total: usize,
    pub optional_approved: usize,
    /// Floored, as `mandatory_percent`.
    pub optional_percent: u8,
    pub optional_basis_points: u16,
    /// True when every mandatory criterion is approved, including when there
    /// are none.
    pub all_mandatory_approved: bool,
}

impl Default for ProgressSummary {
    fn default() -> Self {
        calculate_progress(&[])
    }
}

/// `part / total * scale`, floored. `scale` when `total` is zero.
fn scaled(part: usize, total: usize, scale: u64) -> u64 {
    if total == 0 {
        return scale;
    }
    ((part.min(total) as u64).saturating_mul(scale) / (total as u64)).min(scale)
}

/// Integer percentage of `part` in `total`, 100 when `total` is zero.
#[must_use]
pub fn percent(part: usize, total: usize) -> u8 {
    if total == 0 {
        return VACUOUS_PERCENT;
    }
    scaled(part, total, 100) as u8
}

/// `percent` in hundredths, 10000 when `total` is zero.
#[must_use]
pub fn basis_points(part: usize, total: usize) -> u16 {
    scaled(part, total, u64::from(BASIS_POINTS_SCALE)) as u16
}

/// Compute readiness metrics over a criteria snapshot.
#[must_use]
pub fn calculate_progress(criteria: &[Criterion]) -> ProgressSummary {
    let (mut mandatory_total, mut mandatory_approved) = (0usize, 0usize);
    let (mut optional_total, mut optional_approved) = (0usize, 0usize);

    for criterion in criteria {
        let approved = criterion.status == CriterionStatus::Approved;
        if criterion.is_mandatory {
            mandatory_total += 1;
            mandatory_approved += usize::from(approved);
        } else {
            optional_total += 1;
            optional_approved += usize::from(approved);
        }
    }

    ProgressSummary {
        mandatory_total,
        mandatory_approved,
        mandatory_percent: percent(mandatory_approved, mandatory_total),
        mandatory_basis_points: basis_points(mandatory_approved, mandatory_total),
        optional_total,
        optional_approved,
        optional_percent: percent(optional_approved, optional_total),
        optional_basis_points: basis_points(optional_approved, optional_total),
        all_mandatory_approved: mandatory_approved == mandatory_total,
    }
}
