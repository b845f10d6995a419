//! # Sign-off Matrix
//!
//! Criteria × stakeholders grid for one release.
//!
//! Each cell shows the stakeholder's latest active sign-off, reduced the
//! same way the aggregator reduces duplicates. Each row carries both the
//! stored status and a freshly computed aggregation so drift is visible.

use crate::aggregator::{self, ActiveSignOffs};
use crate::ordering::sorted_criteria;
use crate::{
    Criterion, CriterionId, CriterionStatus, ReleaseId, SignOff, SignOffStatus,
    StakeholderAssignment, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stakeholder's position on one criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub user_id: UserId,
    /// `None` when the stakeholder has no active sign-off.
    pub status: Option<SignOffStatus>,
    pub comment: Option<String>,
    pub link: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
}

impl MatrixCell {
    fn from_signoff(user_id: UserId, signoff: Option<&SignOff>) -> Self {
        match signoff {
            Some(s) => Self {
                user_id,
                status: Some(s.status),
                comment: s.comment.clone(),
                link: s.link.clone(),
                signed_at: Some(s.signed_at),
            },
            None => Self {
                user_id,
                status: None,
                comment: None,
                link: None,
                signed_at: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub criterion_id: CriterionId,
    pub criterion_name: String,
    pub is_mandatory: bool,
    /// Status as stored.
    pub status: CriterionStatus,
    /// Status the aggregator derives from the current snapshot.
    pub computed_status: CriterionStatus,
    /// One cell per stakeholder, in the matrix's stakeholder order.
    pub cells: Vec<MatrixCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOffMatrix {
    pub release_id: ReleaseId,
    pub stakeholders: Vec<UserId>,
    pub rows: Vec<MatrixRow>,
}

/// Build the matrix from a release snapshot.
///
/// `history` maps criterion ids to their sign-off histories; a missing
/// entry means no sign-offs.
#[must_use]
pub fn build_matrix(
    release_id: ReleaseId,
    criteria: Vec<Criterion>,
    assignments: &[StakeholderAssignment],
    history: &BTreeMap<CriterionId, Vec<SignOff>>,
) -> SignOffMatrix {
    let stakeholder_set = aggregator::stakeholder_set(assignments);
    let stakeholders: Vec<UserId> = assignments.iter().map(|a| a.user_id).collect();

    let rows = sorted_criteria(criteria)
        .into_iter()
        .map(|criterion| {
            let signoffs = history
                .get(&criterion.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let active = ActiveSignOffs::collect(criterion.id, signoffs);
            let cells = stakeholders
                .iter()
                .map(|user| MatrixCell::from_signoff(*user, active.get(*user)))
                .collect();
            let computed_status =
                aggregator::compute_criterion_status(&criterion, &stakeholder_set, signoffs);

            MatrixRow {
                criterion_id: criterion.id,
                criterion_name: criterion.name,
                is_mandatory: criterion.is_mandatory,
                status: criterion.status,
                computed_status,
                cells,
            }
        })
        .collect();

    SignOffMatrix {
        release_id,
        stakeholders,
        rows,
    }
}
