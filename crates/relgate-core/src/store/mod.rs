//! # Storage Module
//!
//! The data-access seam of the engine.
//!
//! `ReleaseStore` is what the ledger and read models consume. Two backends
//! implement it:
//! - `MemoryStore`: `BTreeMap` tables, volatile
//! - `RedbStore`: redb tables with postcard-encoded rows, ACID
//!
//! Every multi-row change (release creation, sign-off commit, stakeholder
//! commit) is a single trait call so persistent backends can apply it in one transaction.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::{
    Criterion, CriterionDraft, CriterionId, CriterionStatus, Release, ReleaseDraft, ReleaseId,
    RelgateError, SignOff, SignOffId, StakeholderAssignment, UserId,
};
use chrono::{DateTime, Utc};

/// An atomic sign-off state change.
///
/// Produced by the ledger after validation: every listed sign-off moves to
/// `Revoked`, the optional new sign-off is appended, and the criterion's
/// status is written back, all or nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOffCommit {
    pub criterion: CriterionId,
    pub revoke: Vec<SignOffId>,
    pub create: Option<SignOff>,
    pub status: CriterionStatus,
    pub at: DateTime<Utc>,
}

/// An atomic stakeholder-set change.
///
/// Produced by the tracker after projecting the new stakeholder set: the
/// listed assignments are added or removed and the recomputed criterion
/// statuses are written back, all or nothing. Every added pair must be new
/// and every removed pair must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeholderCommit {
    pub release: ReleaseId,
    pub add: Vec<StakeholderAssignment>,
    pub remove: Vec<UserId>,
    pub statuses: Vec<(CriterionId, CriterionStatus)>,
    pub at: DateTime<Utc>,
}

/// The ReleaseStore trait defines the persistence operations the engine needs.
///
/// Reads return owned snapshots. List operations return rows in creation
/// order unless documented otherwise. All fallible operations return `Result<T, RelgateError>` so
/// in-memory and persistent backends behave uniformly.
pub trait ReleaseStore {
    // -------------------------------------------------------------------------
    // READS
    // -------------------------------------------------------------------------

    /// Lookup a release by id, including soft-deleted ones.
    fn release(&self, id: ReleaseId) -> Result<Option<Release>, RelgateError>;

    /// All releases, including soft-deleted ones, in id order.
    fn releases(&self) -> Result<Vec<Release>, RelgateError>;

    /// Lookup a criterion by id.
    fn criterion(&self, id: CriterionId) -> Result<Option<Criterion>, RelgateError>;

    /// Criteria of a release in creation order.
    fn list_criteria(&self, release: ReleaseId) -> Result<Vec<Criterion>, RelgateError>;

    /// Stakeholder assignments of a release, ordered by `(assigned_at, user)`.
    fn list_stakeholders(
        &self,
        release: ReleaseId,
    ) -> Result<Vec<StakeholderAssignment>, RelgateError>;

    /// Full sign-off history of a criterion in creation order.
    fn list_signoffs(&self, criterion: CriterionId) -> Result<Vec<SignOff>, RelgateError>;

    /// The id the next committed sign-off will receive.
    fn next_signoff_id(&self) -> Result<SignOffId, RelgateError>;

    // -------------------------------------------------------------------------
    // WRITES
    // -------------------------------------------------------------------------

    /// Create a release with its criteria and its creator as first
    /// stakeholder, atomically.
    fn create_release(
        &mut self,
        draft: ReleaseDraft,
        criteria: Vec<CriterionDraft>,
        creator: UserId,
        at: DateTime<Utc>,
    ) -> Result<Release, RelgateError>;

    /// Overwrite an existing release row.
    fn put_release(&mut self, release: &Release) -> Result<(), RelgateError>;

    /// Add a pending criterion to a release.
    fn insert_criterion(
        &mut self,
        release: ReleaseId,
        draft: CriterionDraft,
        at: DateTime<Utc>,
    ) -> Result<Criterion, RelgateError>;

    /// Overwrite an existing criterion row.
    fn put_criterion(&mut self, criterion: &Criterion) -> Result<(), RelgateError>;

    /// Delete a criterion and its sign-off history. Returns false if absent.
    fn delete_criterion(&mut self, id: CriterionId) -> Result<bool, RelgateError>;

    /// Apply a sign-off commit atomically.
    ///
    /// `commit.create`, when present, must carry the id returned by
    /// `next_signoff_id`.
    fn commit_signoff(&mut self, commit: &SignOffCommit) -> Result<(), RelgateError>;

    /// Apply a stakeholder commit atomically.
    fn commit_stakeholders(&mut self, commit: &StakeholderCommit) -> Result<(), RelgateError>;
}
