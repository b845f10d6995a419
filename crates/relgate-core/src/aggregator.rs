//! # Sign-off Aggregator
//!
//! Turns a criterion's sign-off history into a single derived status.
//!
//! Rules, applied to a snapshot supplied by the caller:
//! - No stakeholders: `Pending` (never vacuously approved)
//! - Revoked sign-offs and sign-offs from non-stakeholders do not count
//! - One entry per user; the latest active sign-off wins
//! - Any rejection: `Rejected`
//! - Every stakeholder approved: `Approved`
//! - Otherwise: `Pending`
//!
//! `Blocked` is never produced here. The aggregator performs no I/O and
//! never writes the result back; that is the ledger's job.

use crate::{
    Criterion, CriterionId, CriterionStatus, SignOff, SignOffStatus, StakeholderAssignment, UserId,
};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// ACTIVE SIGN-OFF REDUCTION
// =============================================================================

/// The latest active sign-off per user for one criterion.
#[derive(Debug, Clone, Default)]
pub struct ActiveSignOffs<'a> {
    /// User -> latest non-revoked sign-off.
    pub by_user: BTreeMap<UserId, &'a SignOff>,
    /// Users that had more than one non-revoked sign-off.
    ///
    /// Non-empty only when the one-active-per-user invariant was broken
    /// upstream; callers log these as data-integrity warnings.
    pub duplicates: BTreeSet<UserId>,
}

impl<'a> ActiveSignOffs<'a> {
    /// Reduce a sign-off history to one active entry per user.
    ///
    /// Sign-offs for other criteria are ignored. When a user has several
    /// active sign-offs the most recent one (by `signed_at`, then id) wins,
    /// independent of the input order.
    #[must_use]
    pub fn collect(criterion: CriterionId, signoffs: &'a [SignOff]) -> Self {
        let mut reduced = Self::default();

        for signoff in signoffs
            .iter()
            .filter(|s| s.criterion_id == criterion && s.status.is_active())
        {
            match reduced.by_user.get(&signoff.signed_by) {
                Some(existing) => {
                    reduced.duplicates.insert(signoff.signed_by);
                    if signoff.recency() > existing.recency() {
                        reduced.by_user.insert(signoff.signed_by, signoff);
                    }
                }
                None => {
                    reduced.by_user.insert(signoff.signed_by, signoff);
                }
            }
        }

        reduced
    }

    /// The active sign-off for `user`, if any.
    #[must_use]
    pub fn get(&self, user: UserId) -> Option<&'a SignOff> {
        self.by_user.get(&user).copied()
    }
}

// =============================================================================
// AGGREGATION
// =============================================================================

/// Detailed aggregation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// The derived status (never `Blocked`).
    pub status: CriterionStatus,
    /// Number of stakeholders counted.
    pub stakeholders: usize,
    /// Stakeholders whose active sign-off is `Approved`.
    pub approved: usize,
    /// Stakeholders whose active sign-off is `Rejected`.
    pub rejected: usize,
    /// Users with more than one active sign-off (see [`ActiveSignOffs`]).
    pub duplicate_users: Vec<UserId>,
}

impl Aggregation {
    /// Whether the snapshot violated the one-active-per-user invariant.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.duplicate_users.is_empty()
    }
}

/// Aggregate a criterion's sign-offs against the release's stakeholders.
#[must_use]
pub fn aggregate(
    criterion: &Criterion,
    stakeholders: &BTreeSet<UserId>,
    signoffs: &[SignOff],
) -> Aggregation {
    let active = ActiveSignOffs::collect(criterion.id, signoffs);
    let duplicate_users: Vec<UserId> = active.duplicates.iter().copied().collect();

    if stakeholders.is_empty() {
        return Aggregation {
            status: CriterionStatus::Pending,
            stakeholders: 0,
            approved: 0,
            rejected: 0,
            duplicate_users,
        };
    }

    let mut approved = 0usize;
    let mut rejected = 0usize;
    for (_, signoff) in active
        .by_user
        .iter()
        .filter(|(user, _)| stakeholders.contains(user))
    {
        match signoff.status {
            SignOffStatus::Approved => approved += 1,
            SignOffStatus::Rejected => rejected += 1,
            SignOffStatus::Revoked => {}
        }
    }

    let status = if rejected > 0 {
        CriterionStatus::Rejected
    } else if approved == stakeholders.len() {
        CriterionStatus::Approved
    } else {
        CriterionStatus::Pending
    };

    Aggregation {
        status,
        stakeholders: stakeholders.len(),
        approved,
        rejected,
        duplicate_users,
    }
}

/// Compute a criterion's derived status.
///
/// Pure function of its inputs: the release's stakeholder set and the
/// criterion's full sign-off history, in any order.
#[must_use]
pub fn compute_criterion_status(
    criterion: &Criterion,
    stakeholders: &BTreeSet<UserId>,
    signoffs: &[SignOff],
) -> CriterionStatus {
    aggregate(criterion, stakeholders, signoffs).status
}

/// Collapse stakeholder assignments into the set of counted users.
#[must_use]
pub fn stakeholder_set(assignments: &[StakeholderAssignment]) -> BTreeSet<UserId> {
    assignments.iter().map(|a| a.user_id).collect()
}

/// The status to store after aggregation.
///
/// A manually blocked criterion stays blocked; only an explicit unblock
/// hands it back to aggregation.
#[must_use]
pub fn resolve_status(stored: CriterionStatus, computed: CriterionStatus) -> CriterionStatus {
    if stored == CriterionStatus::Blocked {
        CriterionStatus::Blocked
    } else {
        computed
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReleaseId, SignOffId};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .unwrap_or_default()
    }

    fn criterion() -> Criterion {
        Criterion {
            id: CriterionId(1),
            release_id: ReleaseId(1),
            name: "Content Review".to_string(),
            description: None,
            is_mandatory: true,
            owner: None,
            status: CriterionStatus::Pending,
            order: 0,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn signoff(id: u64, user: u64, status: SignOffStatus, secs: i64) -> SignOff {
        SignOff {
            id: SignOffId(id),
            criterion_id: CriterionId(1),
            signed_by: UserId(user),
            status,
            comment: None,
            link: None,
            signed_at: at(secs),
        }
    }

    fn users(ids: &[u64]) -> BTreeSet<UserId> {
        ids.iter().map(|&id| UserId(id)).collect()
    }

    #[test]
    fn no_stakeholders_is_pending() {
        let history = vec![signoff(1, 1, SignOffStatus::Approved, 0)];
        let status = compute_criterion_status(&criterion(), &BTreeSet::new(), &history);
        assert_eq!(status, CriterionStatus::Pending);
    }

    #[test]
    fn unanimous_approval_is_approved() {
        let history = vec![
            signoff(1, 1, SignOffStatus::Approved, 0),
            signoff(2, 2, SignOffStatus::Approved, 1),
        ];
        let status = compute_criterion_status(&criterion(), &users(&[1, 2]), &history);
        assert_eq!(status, CriterionStatus::Approved);
    }

    #[test]
    fn single_rejection_overrides_approvals() {
        let history = vec![
            signoff(1, 1, SignOffStatus::Approved, 0),
            signoff(2, 2, SignOffStatus::Approved, 1),
            signoff(3, 3, SignOffStatus::Rejected, 2),
        ];
        let agg = aggregate(&criterion(), &users(&[1, 2, 3]), &history);
        assert_eq!(agg.status, CriterionStatus::Rejected);
        assert_eq!(agg.approved, 2);
        assert_eq!(agg.rejected, 1);
    }

    #[test]
    fn missing_stakeholder_keeps_pending() {
        let history = vec![signoff(1, 1, SignOffStatus::Approved, 0)];
        let status = compute_criterion_status(&criterion(), &users(&[1, 2]), &history);
        assert_eq!(status, CriterionStatus::Pending);
    }

    #[test]
    fn revoked_signoffs_do_not_count() {
        let history = vec![
            signoff(1, 1, SignOffStatus::Revoked, 0),
            signoff(2, 2, SignOffStatus::Approved, 1),
        ];
        let status = compute_criterion_status(&criterion(), &users(&[1, 2]), &history);
        assert_eq!(status, CriterionStatus::Pending);
    }

    #[test]
    fn removed_stakeholder_rejection_is_ignored() {
        let history = vec![
            signoff(1, 1, SignOffStatus::Approved, 0),
            signoff(2, 9, SignOffStatus::Rejected, 1),
        ];
        let status = compute_criterion_status(&criterion(), &users(&[1]), &history);
        assert_eq!(status, CriterionStatus::Approved);
    }

    #[test]
    fn duplicate_active_latest_wins_regardless_of_order() {
        let older_reject = signoff(1, 1, SignOffStatus::Rejected, 0);
        let newer_approve = signoff(2, 1, SignOffStatus::Approved, 5);

        let forward = vec![older_reject.clone(), newer_approve.clone()];
        let backward = vec![newer_approve, older_reject];

        for history in [forward, backward] {
            let agg = aggregate(&criterion(), &users(&[1]), &history);
            assert_eq!(agg.status, CriterionStatus::Approved);
            assert_eq!(agg.duplicate_users, vec![UserId(1)]);
        }
    }

    #[test]
    fn duplicate_with_equal_timestamps_prefers_higher_id() {
        let history = vec![
            signoff(7, 1, SignOffStatus::Rejected, 3),
            signoff(4, 1, SignOffStatus::Approved, 3),
        ];
        let active = ActiveSignOffs::collect(CriterionId(1), &history);
        assert_eq!(active.get(UserId(1)).map(|s| s.id), Some(SignOffId(7)));
    }

    #[test]
    fn foreign_criterion_signoffs_are_ignored() {
        let mut foreign = signoff(1, 1, SignOffStatus::Rejected, 0);
        foreign.criterion_id = CriterionId(99);
        let history = vec![foreign, signoff(2, 1, SignOffStatus::Approved, 1)];

        let agg = aggregate(&criterion(), &users(&[1]), &history);
        assert_eq!(agg.status, CriterionStatus::Approved);
        assert!(!agg.has_duplicates());
    }

    #[test]
    fn blocked_survives_resolution() {
        assert_eq!(
            resolve_status(CriterionStatus::Blocked, CriterionStatus::Approved),
            CriterionStatus::Blocked
        );
        assert_eq!(
            resolve_status(CriterionStatus::Approved, CriterionStatus::Pending),
            CriterionStatus::Pending
        );
    }
}
