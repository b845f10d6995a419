//! # Tracker Module
//!
//! The release-tracking facade: one storage backend plus the read-only
//! catalog, exposing every workflow operation the app layer calls.
//!
//! ## Storage Backends
//!
//! - `InMemory`: `MemoryStore` (fast, volatile)
//! - `Persistent`: `RedbStore` (disk-backed, ACID)
//!
//! The tracker itself is synchronous. Callers serialize writers (the HTTP
//! layer holds it behind a single `RwLock`).

use crate::aggregator;
use crate::catalog::Catalog;
use crate::dashboard::{self, PendingItem, ReleaseSummary};
use crate::ledger::{
    RecomputeReport, RevokeOutcome, SignOffLedger, SignOffOutcome, SignOffRequest,
};
use crate::matrix::{self, SignOffMatrix};
use crate::ordering::sorted_criteria;
use crate::primitives::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, MAX_STAKEHOLDER_BATCH};
use crate::progress::{ProgressSummary, calculate_progress};
use crate::store::{MemoryStore, RedbStore, ReleaseStore, StakeholderCommit};
use crate::validation;
use crate::{
    Criterion, CriterionDraft, CriterionId, CriterionStatus, ProductId, Release, ReleaseDraft,
    ReleaseId, ReleaseStatus, RelgateError, SignOff, StakeholderAssignment, UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a Tracker.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    fn store(&self) -> &dyn ReleaseStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn ReleaseStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

// =============================================================================
// REQUEST / VIEW TYPES
// =============================================================================

/// Partial update of a release. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseUpdate {
    pub version: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub status: Option<ReleaseStatus>,
}

/// Release listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFilter {
    pub product_id: Option<ProductId>,
    pub status: Option<ReleaseStatus>,
    #[serde(default)]
    pub skip: usize,
    /// Defaults to `DEFAULT_LIST_LIMIT`, at most `MAX_LIST_LIMIT`.
    pub limit: Option<usize>,
}

/// Partial update of a criterion.
///
/// `status` accepts only `Blocked` (manual override) and `Pending` (clear
/// the override and recompute).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_mandatory: Option<bool>,
    pub owner: Option<UserId>,
    pub order: Option<u32>,
    pub status: Option<CriterionStatus>,
}

/// A criterion with its full sign-off history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionView {
    #[serde(flatten)]
    pub criterion: Criterion,
    pub signoffs: Vec<SignOff>,
}

/// Everything a release page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDetail {
    pub release: Release,
    /// In display order.
    pub criteria: Vec<CriterionView>,
    pub progress: ProgressSummary,
    pub stakeholders: Vec<StakeholderAssignment>,
}

/// Result of a stakeholder batch assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakeholderChange {
    pub added: Vec<UserId>,
    /// Users that were already assigned.
    pub skipped: Vec<UserId>,
    pub recompute: RecomputeReport,
}

// =============================================================================
// TRACKER
// =============================================================================

/// Release tracker over a storage backend and a catalog.
#[derive(Debug, Default)]
pub struct Tracker {
    backend: StorageBackend,
    catalog: Catalog,
}

impl Tracker {
    /// In-memory tracker over `catalog`.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            backend: StorageBackend::default(),
            catalog,
        }
    }

    /// Tracker backed by a redb database at `path`.
    pub fn with_redb(path: impl AsRef<Path>, catalog: Catalog) -> Result<Self, RelgateError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
            catalog,
        })
    }

    #[must_use]
    pub fn with_backend(backend: StorageBackend, catalog: Catalog) -> Self {
        Self { backend, catalog }
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Compact the database file. Returns false for the in-memory backend,
    /// which has nothing to compact.
    pub fn compact(&mut self) -> Result<bool, RelgateError> {
        match &mut self.backend {
            StorageBackend::InMemory(_) => Ok(false),
            StorageBackend::Persistent(store) => {
                store.compact()?;
                Ok(true)
            }
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn store(&self) -> &dyn ReleaseStore {
        self.backend.store()
    }

    fn store_mut(&mut self) -> &mut dyn ReleaseStore {
        self.backend.store_mut()
    }

    // -------------------------------------------------------------------------
    // RELEASES
    // -------------------------------------------------------------------------

    /// Create a draft release from the catalog.
    ///
    /// The explicit template, or the product's default, is copied into the
    /// release. The creator becomes its first stakeholder.
    pub fn create_release(
        &mut self,
        draft: ReleaseDraft,
        creator: UserId,
        now: DateTime<Utc>,
    ) -> Result<Release, RelgateError> {
        let name = validation::name(&draft.name)?;
        let version = validation::version(&draft.version)?;
        let description = validation::description(draft.description)?;

        let template = self
            .catalog
            .resolve_template(draft.product_id, draft.template_id)?;
        let criteria = template.map(|t| t.instantiate()).unwrap_or_default();
        let template_id = template.map(|t| t.id);

        let draft = ReleaseDraft {
            product_id: draft.product_id,
            template_id,
            version,
            name,
            description,
            target_date: draft.target_date,
        };
        self.store_mut().create_release(draft, criteria, creator, now)
    }

    /// A live (not deleted) release.
    pub fn release(&self, id: ReleaseId) -> Result<Release, RelgateError> {
        self.store()
            .release(id)?
            .filter(|r| !r.is_deleted)
            .ok_or(RelgateError::ReleaseNotFound(id))
    }

    /// Apply a partial update.
    ///
    /// Cancelling is only allowed from `in_review` or `approved`. Entering
    /// `released` stamps `released_at`.
    pub fn update_release(
        &mut self,
        id: ReleaseId,
        update: ReleaseUpdate,
        now: DateTime<Utc>,
    ) -> Result<Release, RelgateError> {
        let mut release = self.release(id)?;

        if let Some(version) = update.version {
            release.version = validation::version(&version)?;
        }
        if let Some(name) = update.name {
            release.name = validation::name(&name)?;
        }
        if update.description.is_some() {
            release.description = validation::description(update.description)?;
        }
        if let Some(target_date) = update.target_date {
            release.target_date = Some(target_date);
        }
        if let Some(status) = update.status
            && status != release.status
        {
            if status == ReleaseStatus::Cancelled && !release.status.can_cancel() {
                return Err(RelgateError::InvalidTransition {
                    from: release.status,
                    to: status,
                });
            }
            if status == ReleaseStatus::Released {
                release.released_at = Some(now);
            }
            release.status = status;
        }

        release.updated_at = now;
        self.store_mut().put_release(&release)?;
        Ok(release)
    }

    /// Soft-delete a draft release.
    pub fn delete_release(
        &mut self,
        id: ReleaseId,
        now: DateTime<Utc>,
    ) -> Result<(), RelgateError> {
        let mut release = self.release(id)?;
        if release.status != ReleaseStatus::Draft {
            return Err(RelgateError::InvalidInput(format!(
                "only draft releases can be deleted (release {} is {}); cancel it instead",
                id, release.status
            )));
        }
        release.is_deleted = true;
        release.updated_at = now;
        self.store_mut().put_release(&release)
    }

    /// Live releases matching `filter`, newest first.
    pub fn list_releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>, RelgateError> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if limit > MAX_LIST_LIMIT {
            return Err(RelgateError::InvalidInput(format!(
                "limit must be at most {}",
                MAX_LIST_LIMIT
            )));
        }

        let mut releases: Vec<Release> = self
            .store()
            .releases()?
            .into_iter()
            .filter(|r| !r.is_deleted)
            .filter(|r| filter.product_id.is_none_or(|p| r.product_id == p))
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .collect();
        releases.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(releases
            .into_iter()
            .skip(filter.skip)
            .take(limit)
            .collect())
    }

    /// Release with sorted criteria, their histories, progress and
    /// stakeholders.
    pub fn release_detail(&self, id: ReleaseId) -> Result<ReleaseDetail, RelgateError> {
        let release = self.release(id)?;
        let criteria = sorted_criteria(self.store().list_criteria(id)?);
        let progress = calculate_progress(&criteria);

        let mut views = Vec::with_capacity(criteria.len());
        for criterion in criteria {
            let signoffs = self.store().list_signoffs(criterion.id)?;
            views.push(CriterionView {
                criterion,
                signoffs,
            });
        }

        Ok(ReleaseDetail {
            release,
            criteria: views,
            progress,
            stakeholders: self.store().list_stakeholders(id)?,
        })
    }

    /// Progress summary of one release.
    pub fn progress(&self, id: ReleaseId) -> Result<ProgressSummary, RelgateError> {
        self.release(id)?;
        Ok(calculate_progress(&self.store().list_criteria(id)?))
    }

    // -------------------------------------------------------------------------
    // CRITERIA
    // -------------------------------------------------------------------------

    pub fn add_criterion(
        &mut self,
        release: ReleaseId,
        draft: CriterionDraft,
        now: DateTime<Utc>,
    ) -> Result<Criterion, RelgateError> {
        self.release(release)?;
        let draft = CriterionDraft {
            name: validation::name(&draft.name)?,
            description: validation::description(draft.description)?,
            ..draft
        };
        self.store_mut().insert_criterion(release, draft, now)
    }

    /// Update a criterion's fields and optionally its manual status.
    pub fn update_criterion(
        &mut self,
        release: ReleaseId,
        id: CriterionId,
        update: CriterionUpdate,
        now: DateTime<Utc>,
    ) -> Result<Criterion, RelgateError> {
        let mut criterion = self.criterion_in(release, id)?;

        if let Some(status @ (CriterionStatus::Approved | CriterionStatus::Rejected)) =
            update.status
        {
            return Err(RelgateError::DerivedStatus(status));
        }
        if let Some(name) = update.name {
            criterion.name = validation::name(&name)?;
        }
        if update.description.is_some() {
            criterion.description = validation::description(update.description)?;
        }
        if let Some(is_mandatory) = update.is_mandatory {
            criterion.is_mandatory = is_mandatory;
        }
        if let Some(owner) = update.owner {
            criterion.owner = Some(owner);
        }
        if let Some(order) = update.order {
            criterion.order = order;
        }
        match update.status {
            // Clearing the override lands on the aggregated status in the
            // same write.
            Some(CriterionStatus::Pending) => {
                let aggregation = SignOffLedger::aggregate_criterion(self.store(), &criterion)?;
                criterion.status = aggregation.status;
            }
            Some(status) => criterion.status = status,
            None => {}
        }
        criterion.updated_at = now;
        self.store_mut().put_criterion(&criterion)?;
        Ok(criterion)
    }

    /// Delete a criterion and its sign-off history.
    pub fn delete_criterion(
        &mut self,
        release: ReleaseId,
        id: CriterionId,
    ) -> Result<(), RelgateError> {
        self.criterion_in(release, id)?;
        self.store_mut().delete_criterion(id)?;
        Ok(())
    }

    fn criterion_in(
        &self,
        release: ReleaseId,
        id: CriterionId,
    ) -> Result<Criterion, RelgateError> {
        self.release(release)?;
        let criterion = self
            .store()
            .criterion(id)?
            .ok_or(RelgateError::CriterionNotFound(id))?;
        if criterion.release_id != release {
            return Err(RelgateError::CriterionNotInRelease {
                criterion: id,
                release,
            });
        }
        Ok(criterion)
    }

    // -------------------------------------------------------------------------
    // STAKEHOLDERS
    // -------------------------------------------------------------------------

    pub fn list_stakeholders(
        &self,
        release: ReleaseId,
    ) -> Result<Vec<StakeholderAssignment>, RelgateError> {
        self.release(release)?;
        self.store().list_stakeholders(release)
    }

    /// Assign a batch of users, skipping existing pairs. The new
    /// assignments and every recomputed criterion status are written in one
    /// store commit.
    pub fn assign_stakeholders(
        &mut self,
        release: ReleaseId,
        users: &[UserId],
        now: DateTime<Utc>,
    ) -> Result<StakeholderChange, RelgateError> {
        self.release(release)?;
        if users.is_empty() || users.len() > MAX_STAKEHOLDER_BATCH {
            return Err(RelgateError::InvalidInput(format!(
                "stakeholder batch must hold 1..={} users",
                MAX_STAKEHOLDER_BATCH
            )));
        }

        let current = aggregator::stakeholder_set(&self.store().list_stakeholders(release)?);
        let mut change = StakeholderChange::default();
        let mut seen = BTreeSet::new();
        for user in users.iter().copied().filter(|u| seen.insert(*u)) {
            if current.contains(&user) {
                change.skipped.push(user);
            } else {
                change.added.push(user);
            }
        }
        if change.added.is_empty() {
            return Ok(change);
        }

        let projected: BTreeSet<UserId> = current.iter().chain(&change.added).copied().collect();
        change.recompute = SignOffLedger::plan_release(self.store(), release, &projected)?;
        self.store_mut().commit_stakeholders(&StakeholderCommit {
            release,
            add: change
                .added
                .iter()
                .map(|user| StakeholderAssignment {
                    release_id: release,
                    user_id: *user,
                    assigned_at: now,
                })
                .collect(),
            remove: Vec::new(),
            statuses: change.recompute.changed.clone(),
            at: now,
        })?;
        Ok(change)
    }

    /// Remove one assignment together with the recomputed criterion
    /// statuses, in one store commit.
    pub fn remove_stakeholder(
        &mut self,
        release: ReleaseId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<RecomputeReport, RelgateError> {
        self.release(release)?;
        let mut remaining = aggregator::stakeholder_set(&self.store().list_stakeholders(release)?);
        if !remaining.remove(&user) {
            return Err(RelgateError::NotStakeholder { user, release });
        }

        let report = SignOffLedger::plan_release(self.store(), release, &remaining)?;
        self.store_mut().commit_stakeholders(&StakeholderCommit {
            release,
            add: Vec::new(),
            remove: vec![user],
            statuses: report.changed.clone(),
            at: now,
        })?;
        Ok(report)
    }

    // -------------------------------------------------------------------------
    // SIGN-OFFS
    // -------------------------------------------------------------------------

    pub fn sign_off(
        &mut self,
        criterion: CriterionId,
        user: UserId,
        request: SignOffRequest,
        now: DateTime<Utc>,
    ) -> Result<SignOffOutcome, RelgateError> {
        SignOffLedger::sign_off(self.store_mut(), criterion, user, request, now)
    }

    pub fn revoke(
        &mut self,
        criterion: CriterionId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<RevokeOutcome, RelgateError> {
        SignOffLedger::revoke(self.store_mut(), criterion, user, now)
    }

    /// Every sign-off of a release, newest first.
    pub fn release_signoffs(&self, release: ReleaseId) -> Result<Vec<SignOff>, RelgateError> {
        self.release(release)?;
        let mut signoffs = Vec::new();
        for criterion in self.store().list_criteria(release)? {
            signoffs.extend(self.store().list_signoffs(criterion.id)?);
        }
        signoffs.sort_by(|a, b| b.recency().cmp(&a.recency()));
        Ok(signoffs)
    }

    pub fn signoff_matrix(&self, release: ReleaseId) -> Result<SignOffMatrix, RelgateError> {
        self.release(release)?;
        let criteria = self.store().list_criteria(release)?;
        let stakeholders = self.store().list_stakeholders(release)?;

        let mut history = BTreeMap::new();
        for criterion in &criteria {
            history.insert(criterion.id, self.store().list_signoffs(criterion.id)?);
        }
        Ok(matrix::build_matrix(
            release,
            criteria,
            &stakeholders,
            &history,
        ))
    }

    /// Criteria whose stored status disagrees with a fresh aggregation,
    /// ignoring blocked ones.
    pub fn status_drift(
        &self,
        release: ReleaseId,
    ) -> Result<Vec<(CriterionId, CriterionStatus, CriterionStatus)>, RelgateError> {
        let matrix = self.signoff_matrix(release)?;
        Ok(matrix
            .rows
            .iter()
            .filter(|row| {
                aggregator::resolve_status(row.status, row.computed_status) != row.status
            })
            .map(|row| (row.criterion_id, row.status, row.computed_status))
            .collect())
    }

    // -------------------------------------------------------------------------
    // DASHBOARD
    // -------------------------------------------------------------------------

    pub fn pending_for_owner(&self, owner: UserId) -> Result<Vec<PendingItem>, RelgateError> {
        let mut entries = Vec::new();
        for release in self.store().releases()? {
            let criteria = self.store().list_criteria(release.id)?;
            entries.push((release, criteria));
        }
        Ok(dashboard::pending_for_owner(owner, entries))
    }

    pub fn summary(&self) -> Result<ReleaseSummary, RelgateError> {
        Ok(dashboard::summarize_releases(&self.store().releases()?))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Product, Template, TemplateCriterion};
    use crate::{ProductId, TemplateId};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .unwrap_or_default()
    }

    fn catalog() -> Catalog {
        let template = Template {
            id: TemplateId(1),
            name: "Standard".to_string(),
            criteria: vec![
                TemplateCriterion {
                    name: "Security Audit".to_string(),
                    description: None,
                    is_mandatory: false,
                    default_owner: None,
                    order: 1,
                },
                TemplateCriterion {
                    name: "Content Review".to_string(),
                    description: None,
                    is_mandatory: true,
                    default_owner: Some(UserId(2)),
                    order: 0,
                },
            ],
        };
        let product = Product {
            id: ProductId(1),
            name: "App".to_string(),
            default_template: Some(TemplateId(1)),
        };
        Catalog::from_parts(vec![product], vec![template]).expect("catalog")
    }

    fn draft(name: &str) -> ReleaseDraft {
        ReleaseDraft {
            product_id: ProductId(1),
            template_id: None,
            version: "1.0".to_string(),
            name: name.to_string(),
            description: None,
            target_date: None,
        }
    }

    #[test]
    fn create_copies_default_template() {
        let mut tracker = Tracker::new(catalog());
        let release = tracker
            .create_release(draft("Spring"), UserId(1), at(0))
            .expect("create");
        assert_eq!(release.template_id, Some(TemplateId(1)));

        let detail = tracker.release_detail(release.id).expect("detail");
        let names: Vec<&str> = detail
            .criteria
            .iter()
            .map(|v| v.criterion.name.as_str())
            .collect();
        assert_eq!(names, vec!["Content Review", "Security Audit"]);
        assert_eq!(detail.progress.mandatory_total, 1);
        assert_eq!(detail.stakeholders[0].user_id, UserId(1));
    }

    #[test]
    fn cancel_only_from_review_or_approved() {
        let mut tracker = Tracker::new(catalog());
        let release = tracker
            .create_release(draft("Spring"), UserId(1), at(0))
            .expect("create");

        let cancel = ReleaseUpdate {
            status: Some(ReleaseStatus::Cancelled),
            ..ReleaseUpdate::default()
        };
        assert!(matches!(
            tracker.update_release(release.id, cancel.clone(), at(1)),
            Err(RelgateError::InvalidTransition { .. })
        ));

        let review = ReleaseUpdate {
            status: Some(ReleaseStatus::InReview),
            ..ReleaseUpdate::default()
        };
        tracker.update_release(release.id, review, at(2)).expect("review");
        let cancelled = tracker
            .update_release(release.id, cancel, at(3))
            .expect("cancel");
        assert_eq!(cancelled.status, ReleaseStatus::Cancelled);
    }

    #[test]
    fn released_stamps_released_at() {
        let mut tracker = Tracker::new(catalog());
        let release = tracker
            .create_release(draft("Spring"), UserId(1), at(0))
            .expect("create");
        let released = tracker
            .update_release(
                release.id,
                ReleaseUpdate {
                    status: Some(ReleaseStatus::Released),
                    ..ReleaseUpdate::default()
                },
                at(9),
            )
            .expect("release");
        assert_eq!(released.released_at, Some(at(9)));
    }

    #[test]
    fn delete_is_soft_and_draft_only() {
        let mut tracker = Tracker::new(catalog());
        let release = tracker
            .create_release(draft("Spring"), UserId(1), at(0))
            .expect("create");
        tracker.delete_release(release.id, at(1)).expect("delete");

        assert!(matches!(
            tracker.release(release.id),
            Err(RelgateError::ReleaseNotFound(_))
        ));
        assert!(
            tracker
                .list_releases(&ReleaseFilter::default())
                .expect("list")
                .is_empty()
        );
    }

    #[test]
    fn list_filters_and_pages_newest_first() {
        let mut tracker = Tracker::new(catalog());
        for (i, name) in ["A", "B", "C"].iter().enumerate() {
            tracker
                .create_release(draft(name), UserId(1), at(i as i64))
                .expect("create");
        }

        let page = tracker
            .list_releases(&ReleaseFilter {
                skip: 1,
                limit: Some(1),
                ..ReleaseFilter::default()
            })
            .expect("list");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "B");

        assert!(
            tracker
                .list_releases(&ReleaseFilter {
                    limit: Some(MAX_LIST_LIMIT + 1),
                    ..ReleaseFilter::default()
                })
                .is_err()
        );
    }

    #[test]
    fn manual_status_rules() {
        let mut tracker = Tracker::new(catalog());
        let release = tracker
            .create_release(draft("Spring"), UserId(1), at(0))
            .expect("create");
        let criterion = tracker.release_detail(release.id).expect("detail").criteria[0]
            .criterion
            .id;

        let set = |status| CriterionUpdate {
            status: Some(status),
            ..CriterionUpdate::default()
        };
        assert!(matches!(
            tracker.update_criterion(release.id, criterion, set(CriterionStatus::Approved), at(1)),
            Err(RelgateError::DerivedStatus(CriterionStatus::Approved))
        ));

        tracker
            .sign_off(criterion, UserId(1), SignOffRequest::approve(), at(2))
            .expect("sign off");
        let blocked = tracker
            .update_criterion(release.id, criterion, set(CriterionStatus::Blocked), at(3))
            .expect("block");
        assert_eq!(blocked.status, CriterionStatus::Blocked);

        let unblocked = tracker
            .update_criterion(release.id, criterion, set(CriterionStatus::Pending), at(4))
            .expect("unblock");
        assert_eq!(unblocked.status, CriterionStatus::Approved);
    }

    #[test]
    fn stakeholder_batch_recomputes() {
        let mut tracker = Tracker::new(catalog());
        let release = tracker
            .create_release(draft("Spring"), UserId(1), at(0))
            .expect("create");
        let criterion = tracker.release_detail(release.id).expect("detail").criteria[0]
            .criterion
            .id;
        tracker
            .sign_off(criterion, UserId(1), SignOffRequest::approve(), at(1))
            .expect("sign off");

        let change = tracker
            .assign_stakeholders(release.id, &[UserId(1), UserId(2), UserId(2)], at(2))
            .expect("assign");
        assert_eq!(change.added, vec![UserId(2)]);
        assert_eq!(change.skipped, vec![UserId(1)]);
        assert!(change.recompute.changed.contains(&(criterion, CriterionStatus::Pending)));
        let stored = &tracker.release_detail(release.id).expect("detail").criteria[0].criterion;
        assert_eq!(stored.status, CriterionStatus::Pending);
        assert_eq!(stored.updated_at, at(2));

        let report = tracker
            .remove_stakeholder(release.id, UserId(2), at(3))
            .expect("remove");
        assert!(report.changed.contains(&(criterion, CriterionStatus::Approved)));
        assert!(tracker.status_drift(release.id).expect("drift").is_empty());
    }

    #[test]
    fn criterion_must_belong_to_release() {
        let mut tracker = Tracker::new(catalog());
        let a = tracker
            .create_release(draft("A"), UserId(1), at(0))
            .expect("create");
        let b = tracker
            .create_release(draft("B"), UserId(1), at(1))
            .expect("create");
        let foreign = tracker.release_detail(b.id).expect("detail").criteria[0]
            .criterion
            .id;

        assert!(matches!(
            tracker.delete_criterion(a.id, foreign),
            Err(RelgateError::CriterionNotInRelease { .. })
        ));
    }

    #[test]
    fn compact_keeps_persistent_data() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("relgate.redb");
        let id = {
            let mut tracker = Tracker::with_redb(&path, catalog()).expect("open");
            let release = tracker
                .create_release(draft("Spring"), UserId(1), at(0))
                .expect("create");
            assert!(tracker.compact().expect("compact"));
            release.id
        };

        let tracker = Tracker::with_redb(&path, catalog()).expect("reopen");
        assert_eq!(tracker.release(id).expect("release").name, "Spring");
        assert!(!Tracker::new(catalog()).compact().expect("compact"));
    }
}
