//! # Sign-off Ledger
//!
//! The create/revoke state machine for sign-offs.
//!
//! Per (criterion, user):
//!
//! ```text
//! no-active --sign_off--> active(approved|rejected) --revoke--> revoked
//!                           |                ^
//!                           +---sign_off-----+   (old entry revoked)
//! ```
//!
//! Every transition validates first, then aggregates the projected history
//! and hands the store one `SignOffCommit`, so the sign-off change and the
//! criterion's status write-back land together or not at all. Stakeholder
//! changes are planned here with `plan_release` and committed by the tracker
//! as one `StakeholderCommit`.

use crate::aggregator::{self, ActiveSignOffs, Aggregation};
use crate::primitives::{MAX_COMMENT_LENGTH, MAX_LINK_LENGTH, requires_evidence};
use crate::store::{ReleaseStore, SignOffCommit};
use crate::validation;
use crate::{
    Criterion, CriterionId, CriterionStatus, Decision, Release, ReleaseId, ReleaseStatus,
    RelgateError, SignOff, SignOffId, SignOffStatus, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// A stakeholder's submitted decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOffRequest {
    pub decision: Decision,
    pub comment: Option<String>,
    /// Evidence link (test results, dashboards).
    pub link: Option<String>,
}

impl SignOffRequest {
    #[must_use]
    pub fn approve() -> Self {
        Self {
            decision: Decision::Approved,
            comment: None,
            link: None,
        }
    }

    #[must_use]
    pub fn reject() -> Self {
        Self {
            decision: Decision::Rejected,
            ..Self::approve()
        }
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Result of a successful sign-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOffOutcome {
    pub signoff: SignOff,
    /// Previously active sign-offs of the same user, now revoked.
    pub superseded: Vec<SignOffId>,
    /// The criterion status written back.
    pub status: CriterionStatus,
    /// Users found with duplicate active sign-offs before the change.
    pub duplicate_users: Vec<UserId>,
}

/// Result of a successful revocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeOutcome {
    pub revoked: SignOff,
    pub status: CriterionStatus,
    pub duplicate_users: Vec<UserId>,
}

/// Result of recomputing every criterion of a release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Criteria whose stored status changed.
    pub changed: Vec<(CriterionId, CriterionStatus)>,
    /// (criterion, user) pairs with duplicate active sign-offs.
    pub duplicates: Vec<(CriterionId, UserId)>,
}

/// The sign-off state machine. Stateless; all state lives in the store.
pub struct SignOffLedger;

impl SignOffLedger {
    /// Check a request against the criterion it targets and normalize it.
    ///
    /// Blank comment and link collapse to `None`. An approval on an
    /// evidence-required criterion must carry a link.
    pub fn validate(
        criterion: &Criterion,
        request: SignOffRequest,
    ) -> Result<SignOffRequest, RelgateError> {
        let comment = validation::optional("comment", request.comment, MAX_COMMENT_LENGTH)?;
        let link = validation::optional("link", request.link, MAX_LINK_LENGTH)?;

        if request.decision == Decision::Approved
            && link.is_none()
            && requires_evidence(&criterion.name)
        {
            return Err(RelgateError::EvidenceRequired(criterion.name.clone()));
        }

        Ok(SignOffRequest {
            decision: request.decision,
            comment,
            link,
        })
    }

    /// Record `user`'s decision on a criterion.
    ///
    /// Checks run in order: criterion and release exist, release is not
    /// cancelled, `user` is a stakeholder, then the request itself.
    /// Every active sign-off the user already holds on the criterion is
    /// revoked in the same commit.
    pub fn sign_off<S: ReleaseStore + ?Sized>(
        store: &mut S,
        criterion_id: CriterionId,
        user: UserId,
        request: SignOffRequest,
        now: DateTime<Utc>,
    ) -> Result<SignOffOutcome, RelgateError> {
        let (criterion, release) = load_context(store, criterion_id)?;
        ensure_open(&release)?;

        let stakeholders = aggregator::stakeholder_set(&store.list_stakeholders(release.id)?);
        if !stakeholders.contains(&user) {
            return Err(RelgateError::NotStakeholder {
                user,
                release: release.id,
            });
        }
        let request = Self::validate(&criterion, request)?;

        let mut history = store.list_signoffs(criterion.id)?;
        let duplicate_users = duplicates_of(&criterion, &history);
        let superseded: Vec<SignOffId> = history
            .iter()
            .filter(|s| s.signed_by == user && s.status.is_active())
            .map(|s| s.id)
            .collect();

        let signoff = SignOff {
            id: store.next_signoff_id()?,
            criterion_id: criterion.id,
            signed_by: user,
            status: request.decision.into(),
            comment: request.comment,
            link: request.link,
            signed_at: now,
        };

        // Aggregate over the history as it will look after the commit.
        for entry in history.iter_mut().filter(|s| superseded.contains(&s.id)) {
            entry.status = SignOffStatus::Revoked;
        }
        history.push(signoff.clone());
        let computed = aggregator::compute_criterion_status(&criterion, &stakeholders, &history);
        let status = aggregator::resolve_status(criterion.status, computed);

        store.commit_signoff(&SignOffCommit {
            criterion: criterion.id,
            revoke: superseded.clone(),
            create: Some(signoff.clone()),
            status,
            at: now,
        })?;

        Ok(SignOffOutcome {
            signoff,
            superseded,
            status,
            duplicate_users,
        })
    }

    /// Revoke `user`'s most recent active sign-off on a criterion.
    ///
    /// Allowed on cancelled releases and after the user stopped being a
    /// stakeholder, so stale decisions can always be withdrawn.
    pub fn revoke<S: ReleaseStore + ?Sized>(
        store: &mut S,
        criterion_id: CriterionId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<RevokeOutcome, RelgateError> {
        let (criterion, release) = load_context(store, criterion_id)?;

        let mut history = store.list_signoffs(criterion.id)?;
        let duplicate_users = duplicates_of(&criterion, &history);

        let target = history
            .iter()
            .filter(|s| s.signed_by == user && s.status.is_active())
            .max_by_key(|s| s.recency())
            .cloned()
            .ok_or(RelgateError::NothingToRevoke {
                criterion: criterion.id,
                user,
            })?;

        for entry in history.iter_mut().filter(|s| s.id == target.id) {
            entry.status = SignOffStatus::Revoked;
        }
        let stakeholders = aggregator::stakeholder_set(&store.list_stakeholders(release.id)?);
        let computed = aggregator::compute_criterion_status(&criterion, &stakeholders, &history);
        let status = aggregator::resolve_status(criterion.status, computed);

        store.commit_signoff(&SignOffCommit {
            criterion: criterion.id,
            revoke: vec![target.id],
            create: None,
            status,
            at: now,
        })?;

        Ok(RevokeOutcome {
            revoked: SignOff {
                status: SignOffStatus::Revoked,
                ..target
            },
            status,
            duplicate_users,
        })
    }

    /// Aggregate a criterion snapshot against its release's stakeholders
    /// without writing anything.
    pub fn aggregate_criterion<S: ReleaseStore + ?Sized>(
        store: &S,
        criterion: &Criterion,
    ) -> Result<Aggregation, RelgateError> {
        let stakeholders =
            aggregator::stakeholder_set(&store.list_stakeholders(criterion.release_id)?);
        let history = store.list_signoffs(criterion.id)?;
        Ok(aggregator::aggregate(criterion, &stakeholders, &history))
    }

    /// Statuses every criterion of a release would take under
    /// `stakeholders`. Nothing is written.
    pub fn plan_release<S: ReleaseStore + ?Sized>(
        store: &S,
        release: ReleaseId,
        stakeholders: &BTreeSet<UserId>,
    ) -> Result<RecomputeReport, RelgateError> {
        let mut report = RecomputeReport::default();

        for criterion in store.list_criteria(release)? {
            let history = store.list_signoffs(criterion.id)?;
            let aggregation = aggregator::aggregate(&criterion, stakeholders, &history);
            report.duplicates.extend(
                aggregation
                    .duplicate_users
                    .iter()
                    .map(|user| (criterion.id, *user)),
            );
            let status = aggregator::resolve_status(criterion.status, aggregation.status);
            if status != criterion.status {
                report.changed.push((criterion.id, status));
            }
        }
        Ok(report)
    }
}

/// Load a criterion and its live release.
fn load_context<S: ReleaseStore + ?Sized>(
    store: &S,
    criterion_id: CriterionId,
) -> Result<(Criterion, Release), RelgateError> {
    let criterion = store
        .criterion(criterion_id)?
        .ok_or(RelgateError::CriterionNotFound(criterion_id))?;
    let release = store
        .release(criterion.release_id)?
        .filter(|r| !r.is_deleted)
        .ok_or(RelgateError::ReleaseNotFound(criterion.release_id))?;
    Ok((criterion, release))
}

fn ensure_open(release: &Release) -> Result<(), RelgateError> {
    if release.status == ReleaseStatus::Cancelled {
        return Err(RelgateError::ReleaseCancelled(release.id));
    }
    Ok(())
}

fn duplicates_of(criterion: &Criterion, history: &[SignOff]) -> Vec<UserId> {
    ActiveSignOffs::collect(criterion.id, history)
        .duplicates
        .into_iter()
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
