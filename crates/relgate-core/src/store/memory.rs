//! # In-Memory Store
//!
//! `BTreeMap`-backed implementation of `ReleaseStore`. Fast and volatile;
//! used by tests and the `memory` backend.

use super::{ReleaseStore, SignOffCommit, StakeholderCommit};
use crate::{
    Criterion, CriterionDraft, CriterionId, CriterionStatus, Release, ReleaseDraft, ReleaseId,
    ReleaseStatus, RelgateError, SignOff, SignOffId, SignOffStatus, StakeholderAssignment, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// The in-memory store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering. Ids are
/// allocated from monotonically increasing counters starting at 1.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    releases: BTreeMap<ReleaseId, Release>,
    criteria: BTreeMap<CriterionId, Criterion>,
    signoffs: BTreeMap<SignOffId, SignOff>,
    stakeholders: BTreeMap<ReleaseId, Vec<StakeholderAssignment>>,
    last_release_id: u64,
    last_criterion_id: u64,
    last_signoff_id: u64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_criterion(
        &mut self,
        release: ReleaseId,
        draft: CriterionDraft,
        at: DateTime<Utc>,
    ) -> Criterion {
        self.last_criterion_id = self.last_criterion_id.saturating_add(1);
        let criterion = Criterion {
            id: CriterionId(self.last_criterion_id),
            release_id: release,
            name: draft.name,
            description: draft.description,
            is_mandatory: draft.is_mandatory,
            owner: draft.owner,
            status: CriterionStatus::Pending,
            order: draft.order,
            created_at: at,
            updated_at: at,
        };
        self.criteria.insert(criterion.id, criterion.clone());
        criterion
    }

    /// Insert a raw sign-off row, bypassing the ledger.
    ///
    /// Simulates corrupted snapshots, e.g. two active sign-offs for one user.
    #[cfg(test)]
    pub(crate) fn inject_signoff(&mut self, signoff: SignOff) {
        self.last_signoff_id = self.last_signoff_id.max(signoff.id.0);
        self.signoffs.insert(signoff.id, signoff);
    }
}

impl ReleaseStore for MemoryStore {
    fn release(&self, id: ReleaseId) -> Result<Option<Release>, RelgateError> {
        Ok(self.releases.get(&id).cloned())
    }

    fn releases(&self) -> Result<Vec<Release>, RelgateError> {
        Ok(self.releases.values().cloned().collect())
    }

    fn criterion(&self, id: CriterionId) -> Result<Option<Criterion>, RelgateError> {
        Ok(self.criteria.get(&id).cloned())
    }

    fn list_criteria(&self, release: ReleaseId) -> Result<Vec<Criterion>, RelgateError> {
        Ok(self
            .criteria
            .values()
            .filter(|c| c.release_id == release)
            .cloned()
            .collect())
    }

    fn list_stakeholders(
        &self,
        release: ReleaseId,
    ) -> Result<Vec<StakeholderAssignment>, RelgateError> {
        let mut assignments = self.stakeholders.get(&release).cloned().unwrap_or_default();
        assignments.sort_by_key(|a| (a.assigned_at, a.user_id));
        Ok(assignments)
    }

    fn list_signoffs(&self, criterion: CriterionId) -> Result<Vec<SignOff>, RelgateError> {
        Ok(self
            .signoffs
            .values()
            .filter(|s| s.criterion_id == criterion)
            .cloned()
            .collect())
    }

    fn next_signoff_id(&self) -> Result<SignOffId, RelgateError> {
        Ok(SignOffId(self.last_signoff_id.saturating_add(1)))
    }

    fn create_release(
        &mut self,
        draft: ReleaseDraft,
        criteria: Vec<CriterionDraft>,
        creator: UserId,
        at: DateTime<Utc>,
    ) -> Result<Release, RelgateError> {
        self.last_release_id = self.last_release_id.saturating_add(1);
        let release = Release {
            id: ReleaseId(self.last_release_id),
            product_id: draft.product_id,
            template_id: draft.template_id,
            version: draft.version,
            name: draft.name,
            description: draft.description,
            status: ReleaseStatus::Draft,
            target_date: draft.target_date,
            released_at: None,
            created_by: Some(creator),
            is_deleted: false,
            created_at: at,
            updated_at: at,
        };
        self.releases.insert(release.id, release.clone());

        for draft in criteria {
            self.alloc_criterion(release.id, draft, at);
        }

        self.stakeholders.insert(
            release.id,
            vec![StakeholderAssignment {
                release_id: release.id,
                user_id: creator,
                assigned_at: at,
            }],
        );

        Ok(release)
    }

    fn put_release(&mut self, release: &Release) -> Result<(), RelgateError> {
        match self.releases.get_mut(&release.id) {
            Some(slot) => {
                *slot = release.clone();
                Ok(())
            }
            None => Err(RelgateError::ReleaseNotFound(release.id)),
        }
    }

    fn insert_criterion(
        &mut self,
        release: ReleaseId,
        draft: CriterionDraft,
        at: DateTime<Utc>,
    ) -> Result<Criterion, RelgateError> {
        if !self.releases.contains_key(&release) {
            return Err(RelgateError::ReleaseNotFound(release));
        }
        Ok(self.alloc_criterion(release, draft, at))
    }

    fn put_criterion(&mut self, criterion: &Criterion) -> Result<(), RelgateError> {
        match self.criteria.get_mut(&criterion.id) {
            Some(slot) => {
                *slot = criterion.clone();
                Ok(())
            }
            None => Err(RelgateError::CriterionNotFound(criterion.id)),
        }
    }

    fn delete_criterion(&mut self, id: CriterionId) -> Result<bool, RelgateError> {
        if self.criteria.remove(&id).is_none() {
            return Ok(false);
        }
        self.signoffs.retain(|_, s| s.criterion_id != id);
        Ok(true)
    }

    fn commit_signoff(&mut self, commit: &SignOffCommit) -> Result<(), RelgateError> {
        // Validate everything before mutating so a failed commit leaves no trace.
        if !self.criteria.contains_key(&commit.criterion) {
            return Err(RelgateError::CriterionNotFound(commit.criterion));
        }
        for id in &commit.revoke {
            match self.signoffs.get(id) {
                Some(s) if s.criterion_id == commit.criterion => {}
                _ => {
                    return Err(RelgateError::InvalidInput(format!(
                        "sign-off {} is not part of criterion {}",
                        id, commit.criterion
                    )));
                }
            }
        }
        if let Some(created) = &commit.create {
            let expected = self.next_signoff_id()?;
            if created.id != expected {
                return Err(RelgateError::InvalidInput(format!(
                    "stale sign-off id {} (expected {})",
                    created.id, expected
                )));
            }
        }

        for id in &commit.revoke {
            if let Some(signoff) = self.signoffs.get_mut(id) {
                signoff.status = SignOffStatus::Revoked;
            }
        }
        if let Some(created) = &commit.create {
            self.last_signoff_id = created.id.0;
            self.signoffs.insert(created.id, created.clone());
        }
        if let Some(criterion) = self.criteria.get_mut(&commit.criterion) {
            criterion.status = commit.status;
            criterion.updated_at = commit.at;
        }
        Ok(())
    }

    fn commit_stakeholders(&mut self, commit: &StakeholderCommit) -> Result<(), RelgateError> {
        if !self.releases.contains_key(&commit.release) {
            return Err(RelgateError::ReleaseNotFound(commit.release));
        }
        let current = self
            .stakeholders
            .get(&commit.release)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let assigned = |user: UserId| current.iter().any(|a| a.user_id == user);
        if let Some(stale) = commit
            .add
            .iter()
            .find(|a| a.release_id != commit.release || assigned(a.user_id))
        {
            return Err(RelgateError::InvalidInput(format!(
                "user {} cannot be added to release {}",
                stale.user_id, commit.release
            )));
        }
        if let Some(missing) = commit.remove.iter().find(|u| !assigned(**u)) {
            return Err(RelgateError::NotStakeholder {
                user: *missing,
                release: commit.release,
            });
        }
        if let Some((missing, _)) = commit
            .statuses
            .iter()
            .find(|(id, _)| !self.criteria.contains_key(id))
        {
            return Err(RelgateError::CriterionNotFound(*missing));
        }

        let assignments = self.stakeholders.entry(commit.release).or_default();
        assignments.retain(|a| !commit.remove.contains(&a.user_id));
        assignments.extend(commit.add.iter().cloned());
        for (id, status) in &commit.statuses {
            if let Some(criterion) = self.criteria.get_mut(id) {
                criterion.status = *status;
                criterion.updated_at = commit.at;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProductId;

    fn draft() -> ReleaseDraft {
        ReleaseDraft {
            product_id: ProductId(1),
            template_id: None,
            version: "1.0.0".to_string(),
            name: "Spring".to_string(),
            description: None,
            target_date: None,
        }
    }

    #[test]
    fn create_release_assigns_creator_and_criteria() {
        let mut store = MemoryStore::new();
        let release = store
            .create_release(
                draft(),
                vec![CriterionDraft::mandatory("Content Review", 0)],
                UserId(7),
                Utc::now(),
            )
            .expect("create");

        let stakeholders = store.list_stakeholders(release.id).expect("list");
        assert_eq!(stakeholders.len(), 1);
        assert_eq!(stakeholders[0].user_id, UserId(7));
        assert_eq!(store.list_criteria(release.id).expect("list").len(), 1);
        assert_eq!(release.status, ReleaseStatus::Draft);
    }

    #[test]
    fn duplicate_stakeholder_is_refused() {
        let mut store = MemoryStore::new();
        let release = store
            .create_release(draft(), Vec::new(), UserId(1), Utc::now())
            .expect("create");
        let commit = |add: Vec<StakeholderAssignment>, remove: Vec<UserId>| StakeholderCommit {
            release: release.id,
            add,
            remove,
            statuses: Vec::new(),
            at: Utc::now(),
        };
        let again = StakeholderAssignment {
            release_id: release.id,
            user_id: UserId(1),
            assigned_at: Utc::now(),
        };

        assert!(matches!(
            store.commit_stakeholders(&commit(vec![again], Vec::new())),
            Err(RelgateError::InvalidInput(_))
        ));
        store
            .commit_stakeholders(&commit(Vec::new(), vec![UserId(1)]))
            .expect("remove");
        assert!(store.list_stakeholders(release.id).expect("list").is_empty());
        assert!(matches!(
            store.commit_stakeholders(&commit(Vec::new(), vec![UserId(1)])),
            Err(RelgateError::NotStakeholder { .. })
        ));
    }

    #[test]
    fn stale_commit_id_is_rejected_without_side_effects() {
        let mut store = MemoryStore::new();
        let release = store
            .create_release(
                draft(),
                vec![CriterionDraft::mandatory("Content Review", 0)],
                UserId(1),
                Utc::now(),
            )
            .expect("create");
        let criterion = store.list_criteria(release.id).expect("list")[0].id;

        let commit = SignOffCommit {
            criterion,
            revoke: Vec::new(),
            create: Some(SignOff {
                id: SignOffId(42),
                criterion_id: criterion,
                signed_by: UserId(1),
                status: SignOffStatus::Approved,
                comment: None,
                link: None,
                signed_at: Utc::now(),
            }),
            status: CriterionStatus::Approved,
            at: Utc::now(),
        };

        assert!(store.commit_signoff(&commit).is_err());
        assert!(store.list_signoffs(criterion).expect("list").is_empty());
        let stored = store.criterion(criterion).expect("get").expect("present");
        assert_eq!(stored.status, CriterionStatus::Pending);
    }

    #[test]
    fn delete_criterion_drops_history() {
        let mut store = MemoryStore::new();
        let release = store
            .create_release(
                draft(),
                vec![CriterionDraft::mandatory("Content Review", 0)],
                UserId(1),
                Utc::now(),
            )
            .expect("create");
        let criterion = store.list_criteria(release.id).expect("list")[0].id;
        store.inject_signoff(SignOff {
            id: SignOffId(1),
            criterion_id: criterion,
            signed_by: UserId(1),
            status: SignOffStatus::Approved,
            comment: None,
            link: None,
            signed_at: Utc::now(),
        });

        assert!(store.delete_criterion(criterion).expect("delete"));
        assert!(store.list_signoffs(criterion).expect("list").is_empty());
        assert!(!store.delete_criterion(criterion).expect("delete"));
    }

    #[test]
    fn failed_stakeholder_commit_changes_nothing() {
        let mut store = MemoryStore::new();
        let release = store
            .create_release(
                draft(),
                vec![CriterionDraft::mandatory("Content Review", 0)],
                UserId(1),
                Utc::now(),
            )
            .expect("create");
        let criterion = store.list_criteria(release.id).expect("list")[0].id;
        let now = Utc::now();

        let err = store.commit_stakeholders(&StakeholderCommit {
            release: release.id,
            add: vec![StakeholderAssignment {
                release_id: release.id,
                user_id: UserId(2),
                assigned_at: now,
            }],
            remove: Vec::new(),
            statuses: vec![(CriterionId(99), CriterionStatus::Pending)],
            at: now,
        });
        assert!(matches!(err, Err(RelgateError::CriterionNotFound(_))));
        assert_eq!(store.list_stakeholders(release.id).expect("list").len(), 1);

        store
            .commit_stakeholders(&StakeholderCommit {
                release: release.id,
                add: vec![StakeholderAssignment {
                    release_id: release.id,
                    user_id: UserId(2),
                    assigned_at: now,
                }],
                remove: vec![UserId(1)],
                statuses: vec![(criterion, CriterionStatus::Rejected)],
                at: now,
            })
            .expect("commit");
        let users: Vec<UserId> = store
            .list_stakeholders(release.id)
            .expect("list")
            .iter()
            .map(|a| a.user_id)
            .collect();
        assert_eq!(users, vec![UserId(2)]);
        let stored = store.criterion(criterion).expect("get").expect("present");
        assert_eq!(stored.status, CriterionStatus::Rejected);

        let err = store.commit_stakeholders(&StakeholderCommit {
            release: release.id,
            add: Vec::new(),
            remove: vec![UserId(1)],
            statuses: Vec::new(),
            at: now,
        });
        assert!(matches!(err, Err(RelgateError::NotStakeholder { .. })));
    }
}
