//! # redb-backed Release Storage
//!
//! A disk-backed `ReleaseStore` using the redb embedded database.
//!
//! Rows are postcard-encoded. Secondary index tables keyed by
//! `(parent, child)` tuples give per-release and per-criterion range scans.
//! Every trait write runs in exactly one write transaction, so a failed
//! operation never leaves a partial change on disk.

use super::{ReleaseStore, SignOffCommit, StakeholderCommit};
use crate::{
    Criterion, CriterionDraft, CriterionId, CriterionStatus, Release, ReleaseDraft, ReleaseId,
    ReleaseStatus, RelgateError, SignOff, SignOffId, SignOffStatus, StakeholderAssignment, UserId,
};
use chrono::{DateTime, Utc};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, Table, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for releases: ReleaseId(u64) -> serialized Release
const RELEASES: TableDefinition<u64, &[u8]> = TableDefinition::new("releases");

/// Table for criteria: CriterionId(u64) -> serialized Criterion
const CRITERIA: TableDefinition<u64, &[u8]> = TableDefinition::new("criteria");

/// Index: (release_id, criterion_id) -> ()
const RELEASE_CRITERIA: TableDefinition<(u64, u64), ()> =
    TableDefinition::new("release_criteria");

/// Table for assignments: (release_id, user_id) -> serialized StakeholderAssignment
const STAKEHOLDERS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("stakeholders");

/// Table for sign-offs: SignOffId(u64) -> serialized SignOff
const SIGNOFFS: TableDefinition<u64, &[u8]> = TableDefinition::new("signoffs");

/// Index: (criterion_id, signoff_id) -> ()
const CRITERION_SIGNOFFS: TableDefinition<(u64, u64), ()> =
    TableDefinition::new("criterion_signoffs");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const LAST_RELEASE_ID: &str = "last_release_id";
const LAST_CRITERION_ID: &str = "last_criterion_id";
const LAST_SIGNOFF_ID: &str = "last_signoff_id";

fn io(e: impl std::fmt::Display) -> RelgateError {
    RelgateError::IoError(e.to_string())
}

fn encode<T: Serialize>(row: &T) -> Result<Vec<u8>, RelgateError> {
    postcard::to_allocvec(row).map_err(|e| RelgateError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RelgateError> {
    postcard::from_bytes(bytes).map_err(|e| RelgateError::DeserializationError(e.to_string()))
}

fn get_row<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    key: u64,
) -> Result<Option<T>, RelgateError> {
    match table.get(key).map_err(io)? {
        Some(data) => Ok(Some(decode(data.value())?)),
        None => Ok(None),
    }
}

fn put_row<T: Serialize>(
    table: &mut Table<'_, u64, &'static [u8]>,
    key: u64,
    row: &T,
) -> Result<(), RelgateError> {
    let bytes = encode(row)?;
    table.insert(key, bytes.as_slice()).map_err(io)?;
    Ok(())
}

/// Child ids of `parent` in an index table, ascending.
fn children(
    table: &impl ReadableTable<(u64, u64), ()>,
    parent: u64,
) -> Result<Vec<u64>, RelgateError> {
    let mut ids = Vec::new();
    for entry in table.range((parent, 0u64)..=(parent, u64::MAX)).map_err(io)? {
        let (key, _) = entry.map_err(io)?;
        ids.push(key.value().1);
    }
    Ok(ids)
}

/// A disk-backed release store using redb.
///
/// The id counters are cached in memory and written to `METADATA` in the
/// same transaction that consumes them.
pub struct RedbStore {
    db: Database,
    last_release_id: u64,
    last_criterion_id: u64,
    last_signoff_id: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("last_release_id", &self.last_release_id)
            .field("last_criterion_id", &self.last_criterion_id)
            .field("last_signoff_id", &self.last_signoff_id)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a release database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RelgateError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Create every table up front so read transactions never miss one.
        {
            let txn = db.begin_write().map_err(io)?;
            txn.open_table(RELEASES).map_err(io)?;
            txn.open_table(CRITERIA).map_err(io)?;
            txn.open_table(RELEASE_CRITERIA).map_err(io)?;
            txn.open_table(STAKEHOLDERS).map_err(io)?;
            txn.open_table(SIGNOFFS).map_err(io)?;
            txn.open_table(CRITERION_SIGNOFFS).map_err(io)?;
            txn.open_table(METADATA).map_err(io)?;
            txn.commit().map_err(io)?;
        }

        let (last_release_id, last_criterion_id, last_signoff_id) = {
            let txn = db.begin_read().map_err(io)?;
            let meta = txn.open_table(METADATA).map_err(io)?;
            let counter = |key: &str| -> Result<u64, RelgateError> {
                Ok(meta.get(key).map_err(io)?.map(|v| v.value()).unwrap_or(0))
            };
            (
                counter(LAST_RELEASE_ID)?,
                counter(LAST_CRITERION_ID)?,
                counter(LAST_SIGNOFF_ID)?,
            )
        };

        Ok(Self {
            db,
            last_release_id,
            last_criterion_id,
            last_signoff_id,
        })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), RelgateError> {
        self.db.compact().map_err(io)?;
        Ok(())
    }

    fn read<R>(
        &self,
        f: impl FnOnce(&ReadTransaction) -> Result<R, RelgateError>,
    ) -> Result<R, RelgateError> {
        let txn = self.db.begin_read().map_err(io)?;
        f(&txn)
    }

    /// Run `f` in a write transaction, committing only if it succeeds.
    /// Dropping an uncommitted transaction aborts it.
    fn write<R>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> Result<R, RelgateError>,
    ) -> Result<R, RelgateError> {
        let txn = self.db.begin_write().map_err(io)?;
        let result = f(&txn)?;
        txn.commit().map_err(io)?;
        Ok(result)
    }
}

impl ReleaseStore for RedbStore {
    fn release(&self, id: ReleaseId) -> Result<Option<Release>, RelgateError> {
        self.read(|txn| {
            let table = txn.open_table(RELEASES).map_err(io)?;
            get_row(&table, id.0)
        })
    }

    fn releases(&self) -> Result<Vec<Release>, RelgateError> {
        self.read(|txn| {
            let table = txn.open_table(RELEASES).map_err(io)?;
            let mut releases = Vec::new();
            for entry in table.iter().map_err(io)? {
                let (_, data) = entry.map_err(io)?;
                releases.push(decode(data.value())?);
            }
            Ok(releases)
        })
    }

    fn criterion(&self, id: CriterionId) -> Result<Option<Criterion>, RelgateError> {
        self.read(|txn| {
            let table = txn.open_table(CRITERIA).map_err(io)?;
            get_row(&table, id.0)
        })
    }

    fn list_criteria(&self, release: ReleaseId) -> Result<Vec<Criterion>, RelgateError> {
        self.read(|txn| {
            let index = txn.open_table(RELEASE_CRITERIA).map_err(io)?;
            let table = txn.open_table(CRITERIA).map_err(io)?;
            let mut criteria = Vec::new();
            for id in children(&index, release.0)? {
                if let Some(criterion) = get_row(&table, id)? {
                    criteria.push(criterion);
                }
            }
            Ok(criteria)
        })
    }

    fn list_stakeholders(
        &self,
        release: ReleaseId,
    ) -> Result<Vec<StakeholderAssignment>, RelgateError> {
        self.read(|txn| {
            let table = txn.open_table(STAKEHOLDERS).map_err(io)?;
            let mut assignments: Vec<StakeholderAssignment> = Vec::new();
            for entry in table
                .range((release.0, 0u64)..=(release.0, u64::MAX))
                .map_err(io)?
            {
                let (_, data) = entry.map_err(io)?;
                assignments.push(decode(data.value())?);
            }
            assignments.sort_by_key(|a| (a.assigned_at, a.user_id));
            Ok(assignments)
        })
    }

    fn list_signoffs(&self, criterion: CriterionId) -> Result<Vec<SignOff>, RelgateError> {
        self.read(|txn| {
            let index = txn.open_table(CRITERION_SIGNOFFS).map_err(io)?;
            let table = txn.open_table(SIGNOFFS).map_err(io)?;
            let mut signoffs = Vec::new();
            for id in children(&index, criterion.0)? {
                if let Some(signoff) = get_row(&table, id)? {
                    signoffs.push(signoff);
                }
            }
            Ok(signoffs)
        })
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
        let release = Release {
            id: ReleaseId(self.last_release_id.saturating_add(1)),
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
        let mut last_criterion_id = self.last_criterion_id;

        self.write(|txn| {
            let mut releases = txn.open_table(RELEASES).map_err(io)?;
            let mut table = txn.open_table(CRITERIA).map_err(io)?;
            let mut index = txn.open_table(RELEASE_CRITERIA).map_err(io)?;
            let mut stakeholders = txn.open_table(STAKEHOLDERS).map_err(io)?;
            let mut meta = txn.open_table(METADATA).map_err(io)?;

            put_row(&mut releases, release.id.0, &release)?;

            for draft in criteria {
                last_criterion_id = last_criterion_id.saturating_add(1);
                let criterion = Criterion {
                    id: CriterionId(last_criterion_id),
                    release_id: release.id,
                    name: draft.name,
                    description: draft.description,
                    is_mandatory: draft.is_mandatory,
                    owner: draft.owner,
                    status: CriterionStatus::Pending,
                    order: draft.order,
                    created_at: at,
                    updated_at: at,
                };
                put_row(&mut table, criterion.id.0, &criterion)?;
                index.insert((release.id.0, criterion.id.0), ()).map_err(io)?;
            }

            let assignment = StakeholderAssignment {
                release_id: release.id,
                user_id: creator,
                assigned_at: at,
            };
            let bytes = encode(&assignment)?;
            stakeholders
                .insert((release.id.0, creator.0), bytes.as_slice())
                .map_err(io)?;

            meta.insert(LAST_RELEASE_ID, release.id.0).map_err(io)?;
            meta.insert(LAST_CRITERION_ID, last_criterion_id).map_err(io)?;
            Ok(())
        })?;

        self.last_release_id = release.id.0;
        self.last_criterion_id = last_criterion_id;
        Ok(release)
    }

    fn put_release(&mut self, release: &Release) -> Result<(), RelgateError> {
        self.write(|txn| {
            let mut table = txn.open_table(RELEASES).map_err(io)?;
            if table.get(release.id.0).map_err(io)?.is_none() {
                return Err(RelgateError::ReleaseNotFound(release.id));
            }
            put_row(&mut table, release.id.0, release)
        })
    }

    fn insert_criterion(
        &mut self,
        release: ReleaseId,
        draft: CriterionDraft,
        at: DateTime<Utc>,
    ) -> Result<Criterion, RelgateError> {
        let criterion = Criterion {
            id: CriterionId(self.last_criterion_id.saturating_add(1)),
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

        self.write(|txn| {
            let releases = txn.open_table(RELEASES).map_err(io)?;
            if releases.get(release.0).map_err(io)?.is_none() {
                return Err(RelgateError::ReleaseNotFound(release));
            }
            let mut table = txn.open_table(CRITERIA).map_err(io)?;
            let mut index = txn.open_table(RELEASE_CRITERIA).map_err(io)?;
            let mut meta = txn.open_table(METADATA).map_err(io)?;
            put_row(&mut table, criterion.id.0, &criterion)?;
            index.insert((release.0, criterion.id.0), ()).map_err(io)?;
            meta.insert(LAST_CRITERION_ID, criterion.id.0).map_err(io)?;
            Ok(())
        })?;

        self.last_criterion_id = criterion.id.0;
        Ok(criterion)
    }

    fn put_criterion(&mut self, criterion: &Criterion) -> Result<(), RelgateError> {
        self.write(|txn| {
            let mut table = txn.open_table(CRITERIA).map_err(io)?;
            if table.get(criterion.id.0).map_err(io)?.is_none() {
                return Err(RelgateError::CriterionNotFound(criterion.id));
            }
            put_row(&mut table, criterion.id.0, criterion)
        })
    }

    fn delete_criterion(&mut self, id: CriterionId) -> Result<bool, RelgateError> {
        self.write(|txn| {
            let mut table = txn.open_table(CRITERIA).map_err(io)?;
            let Some(criterion) = get_row::<Criterion>(&table, id.0)? else {
                return Ok(false);
            };
            table.remove(id.0).map_err(io)?;

            let mut index = txn.open_table(RELEASE_CRITERIA).map_err(io)?;
            index.remove((criterion.release_id.0, id.0)).map_err(io)?;

            let mut history = txn.open_table(CRITERION_SIGNOFFS).map_err(io)?;
            let mut signoffs = txn.open_table(SIGNOFFS).map_err(io)?;
            for signoff in children(&history, id.0)? {
                history.remove((id.0, signoff)).map_err(io)?;
                signoffs.remove(signoff).map_err(io)?;
            }
            Ok(true)
        })
    }

    fn commit_signoff(&mut self, commit: &SignOffCommit) -> Result<(), RelgateError> {
        if let Some(created) = &commit.create {
            let expected = self.next_signoff_id()?;
            if created.id != expected {
                return Err(RelgateError::InvalidInput(format!(
                    "stale sign-off id {} (expected {})",
                    created.id, expected
                )));
            }
        }

        self.write(|txn| {
            let mut criteria = txn.open_table(CRITERIA).map_err(io)?;
            let mut criterion: Criterion = get_row(&criteria, commit.criterion.0)?
                .ok_or(RelgateError::CriterionNotFound(commit.criterion))?;

            let mut signoffs = txn.open_table(SIGNOFFS).map_err(io)?;
            for id in &commit.revoke {
                let mut signoff: SignOff = match get_row::<SignOff>(&signoffs, id.0)? {
                    Some(s) if s.criterion_id == commit.criterion => s,
                    _ => {
                        return Err(RelgateError::InvalidInput(format!(
                            "sign-off {} is not part of criterion {}",
                            id, commit.criterion
                        )));
                    }
                };
                signoff.status = SignOffStatus::Revoked;
                put_row(&mut signoffs, id.0, &signoff)?;
            }

            if let Some(created) = &commit.create {
                let mut history = txn.open_table(CRITERION_SIGNOFFS).map_err(io)?;
                let mut meta = txn.open_table(METADATA).map_err(io)?;
                put_row(&mut signoffs, created.id.0, created)?;
                history
                    .insert((commit.criterion.0, created.id.0), ())
                    .map_err(io)?;
                meta.insert(LAST_SIGNOFF_ID, created.id.0).map_err(io)?;
            }

            criterion.status = commit.status;
            criterion.updated_at = commit.at;
            put_row(&mut criteria, criterion.id.0, &criterion)
        })?;

        if let Some(created) = &commit.create {
            self.last_signoff_id = created.id.0;
        }
        Ok(())
    }

    fn commit_stakeholders(&mut self, commit: &StakeholderCommit) -> Result<(), RelgateError> {
        self.write(|txn| {
            let releases = txn.open_table(RELEASES).map_err(io)?;
            if releases.get(commit.release.0).map_err(io)?.is_none() {
                return Err(RelgateError::ReleaseNotFound(commit.release));
            }

            let mut stakeholders = txn.open_table(STAKEHOLDERS).map_err(io)?;
            for user in &commit.remove {
                if stakeholders
                    .remove((commit.release.0, user.0))
                    .map_err(io)?
                    .is_none()
                {
                    return Err(RelgateError::NotStakeholder {
                        user: *user,
                        release: commit.release,
                    });
                }
            }
            for assignment in &commit.add {
                let key = (assignment.release_id.0, assignment.user_id.0);
                if assignment.release_id != commit.release
                    || stakeholders.get(key).map_err(io)?.is_some()
                {
                    return Err(RelgateError::InvalidInput(format!(
                        "user {} cannot be added to release {}",
                        assignment.user_id, commit.release
                    )));
                }
                let bytes = encode(assignment)?;
                stakeholders.insert(key, bytes.as_slice()).map_err(io)?;
            }

            let mut criteria = txn.open_table(CRITERIA).map_err(io)?;
            for (id, status) in &commit.statuses {
                let mut criterion: Criterion =
                    get_row(&criteria, id.0)?.ok_or(RelgateError::CriterionNotFound(*id))?;
                criterion.status = *status;
                criterion.updated_at = commit.at;
                put_row(&mut criteria, id.0, &criterion)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProductId;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    fn draft() -> ReleaseDraft {
        ReleaseDraft {
            product_id: ProductId(1),
            template_id: None,
            version: "2.1.0".to_string(),
            name: "Autumn".to_string(),
            description: Some("quarterly".to_string()),
            target_date: None,
        }
    }

    fn signoff(id: u64, criterion: CriterionId, user: u64, secs: i64) -> SignOff {
        SignOff {
            id: SignOffId(id),
            criterion_id: criterion,
            signed_by: UserId(user),
            status: SignOffStatus::Approved,
            comment: None,
            link: None,
            signed_at: at(secs),
        }
    }

    #[test]
    fn create_and_read_back() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let release = store
            .create_release(
                draft(),
                vec![
                    CriterionDraft::mandatory("Content Review", 0),
                    CriterionDraft::optional("Security Audit", 1),
                ],
                UserId(3),
                at(10),
            )
            .expect("create");

        assert_eq!(store.release(release.id).expect("get"), Some(release.clone()));
        let criteria = store.list_criteria(release.id).expect("list");
        assert_eq!(criteria.len(), 2);
        assert_eq!(criteria[0].name, "Content Review");
        assert!(!criteria[1].is_mandatory);

        let stakeholders = store.list_stakeholders(release.id).expect("list");
        assert_eq!(stakeholders.len(), 1);
        assert_eq!(stakeholders[0].user_id, UserId(3));
    }

    #[test]
    fn commit_revokes_and_appends_atomically() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let release = store
            .create_release(
                draft(),
                vec![CriterionDraft::mandatory("Content Review", 0)],
                UserId(1),
                at(0),
            )
            .expect("create");
        let criterion = store.list_criteria(release.id).expect("list")[0].id;

        let first = signoff(1, criterion, 1, 5);
        store
            .commit_signoff(&SignOffCommit {
                criterion,
                revoke: Vec::new(),
                create: Some(first.clone()),
                status: CriterionStatus::Approved,
                at: at(5),
            })
            .expect("commit");

        let second = signoff(2, criterion, 1, 6);
        store
            .commit_signoff(&SignOffCommit {
                criterion,
                revoke: vec![first.id],
                create: Some(second),
                status: CriterionStatus::Approved,
                at: at(6),
            })
            .expect("commit");

        let history = store.list_signoffs(criterion).expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, SignOffStatus::Revoked);
        assert_eq!(history[1].status, SignOffStatus::Approved);
        assert_eq!(store.next_signoff_id().expect("next"), SignOffId(3));
    }

    #[test]
    fn failed_commit_leaves_no_trace() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let release = store
            .create_release(
                draft(),
                vec![CriterionDraft::mandatory("Content Review", 0)],
                UserId(1),
                at(0),
            )
            .expect("create");
        let criterion = store.list_criteria(release.id).expect("list")[0].id;

        // Revoking an unknown sign-off fails after the new row was staged.
        let result = store.commit_signoff(&SignOffCommit {
            criterion,
            revoke: vec![SignOffId(99)],
            create: Some(signoff(1, criterion, 1, 5)),
            status: CriterionStatus::Approved,
            at: at(5),
        });
        assert!(result.is_err());
        assert!(store.list_signoffs(criterion).expect("history").is_empty());
        assert_eq!(store.next_signoff_id().expect("next"), SignOffId(1));
    }

    #[test]
    fn recovery_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        let (release_id, criterion) = {
            let mut store = RedbStore::open(&db_path).expect("open db");
            let release = store
                .create_release(
                    draft(),
                    vec![CriterionDraft::mandatory("Content Review", 0)],
                    UserId(1),
                    at(0),
                )
                .expect("create");
            let criterion = store.list_criteria(release.id).expect("list")[0].id;
            store
                .commit_signoff(&SignOffCommit {
                    criterion,
                    revoke: Vec::new(),
                    create: Some(signoff(1, criterion, 1, 5)),
                    status: CriterionStatus::Approved,
                    at: at(5),
                })
                .expect("commit");
            (release.id, criterion)
        };

        let mut store = RedbStore::open(&db_path).expect("reopen db");
        assert!(store.release(release_id).expect("get").is_some());
        let stored = store.criterion(criterion).expect("get").expect("present");
        assert_eq!(stored.status, CriterionStatus::Approved);
        assert_eq!(store.next_signoff_id().expect("next"), SignOffId(2));

        let next = store
            .create_release(draft(), Vec::new(), UserId(1), at(9))
            .expect("create");
        assert_eq!(next.id, ReleaseId(2));
    }

    #[test]
    fn delete_criterion_removes_history_and_index() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let release = store
            .create_release(
                draft(),
                vec![
                    CriterionDraft::mandatory("Content Review", 0),
                    CriterionDraft::mandatory("Bug Verification", 1),
                ],
                UserId(1),
                at(0),
            )
            .expect("create");
        let criteria = store.list_criteria(release.id).expect("list");
        store
            .commit_signoff(&SignOffCommit {
                criterion: criteria[0].id,
                revoke: Vec::new(),
                create: Some(signoff(1, criteria[0].id, 1, 5)),
                status: CriterionStatus::Approved,
                at: at(5),
            })
            .expect("commit");

        assert!(store.delete_criterion(criteria[0].id).expect("delete"));
        assert!(!store.delete_criterion(criteria[0].id).expect("delete"));
        assert!(store.list_signoffs(criteria[0].id).expect("history").is_empty());
        let remaining = store.list_criteria(release.id).expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "Bug Verification");
    }

    #[test]
    fn stakeholder_pairs_are_unique() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let release = store
            .create_release(draft(), Vec::new(), UserId(1), at(0))
            .expect("create");

        let add = |user: u64, secs: i64| StakeholderCommit {
            release: release.id,
            add: vec![StakeholderAssignment {
                release_id: release.id,
                user_id: UserId(user),
                assigned_at: at(secs),
            }],
            remove: Vec::new(),
            statuses: Vec::new(),
            at: at(secs),
        };
        let remove = |user: u64| StakeholderCommit {
            release: release.id,
            add: Vec::new(),
            remove: vec![UserId(user)],
            statuses: Vec::new(),
            at: at(4),
        };
        store.commit_stakeholders(&add(9, 1)).expect("add");
        assert!(store.commit_stakeholders(&add(9, 2)).is_err());
        store.commit_stakeholders(&add(4, 3)).expect("add");

        let users: Vec<UserId> = store
            .list_stakeholders(release.id)
            .expect("list")
            .iter()
            .map(|a| a.user_id)
            .collect();
        assert_eq!(users, vec![UserId(1), UserId(9), UserId(4)]);

        store.commit_stakeholders(&remove(9)).expect("remove");
        assert!(matches!(
            store.commit_stakeholders(&remove(9)),
            Err(RelgateError::NotStakeholder { .. })
        ));
        assert!(matches!(
            store.commit_stakeholders(&StakeholderCommit {
                release: ReleaseId(77),
                ..remove(1)
            }),
            Err(RelgateError::ReleaseNotFound(_))
        ));
    }

    #[test]
    fn failed_stakeholder_commit_leaves_no_trace() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let release = store
            .create_release(
                draft(),
                vec![CriterionDraft::mandatory("Content Review", 0)],
                UserId(1),
                at(0),
            )
            .expect("create");
        let criterion = store.list_criteria(release.id).expect("list")[0].id;
        let assignment = StakeholderAssignment {
            release_id: release.id,
            user_id: UserId(2),
            assigned_at: at(1),
        };

        // The status write fails after the assignment was staged.
        let result = store.commit_stakeholders(&StakeholderCommit {
            release: release.id,
            add: vec![assignment.clone()],
            remove: Vec::new(),
            statuses: vec![(CriterionId(99), CriterionStatus::Pending)],
            at: at(1),
        });
        assert!(matches!(result, Err(RelgateError::CriterionNotFound(_))));
        assert_eq!(store.list_stakeholders(release.id).expect("list").len(), 1);

        store
            .commit_stakeholders(&StakeholderCommit {
                release: release.id,
                add: vec![assignment],
                remove: vec![UserId(1)],
                statuses: vec![(criterion, CriterionStatus::Rejected)],
                at: at(2),
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
        assert_eq!(stored.updated_at, at(2));
    }

    #[test]
    fn compact_and_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            for _ in 0..20 {
                store
                    .create_release(
                        draft(),
                        vec![CriterionDraft::mandatory("Content Review", 0)],
                        UserId(1),
                        at(0),
                    )
                    .expect("create");
            }
            store.compact().expect("compact");
        }

        let store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.releases().expect("releases").len(), 20);
        for id in 1..=20 {
            assert_eq!(
                store.list_criteria(ReleaseId(id)).expect("list").len(),
                1,
                "release {} should keep its criterion",
                id
            );
        }
    }
}
