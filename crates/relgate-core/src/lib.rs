//! # relgate-core
//!
//! The release sign-off engine for relgate.
//!
//! A release is ready when every mandatory criterion is approved. Each
//! criterion's status is derived from the sign-offs of the release's
//! stakeholders; this crate owns that derivation and the state machine
//! that records sign-offs.
//!
//! ## Architectural Constraints
//!
//! - Aggregation, progress and ordering are pure functions over snapshots
//! - Deterministic: `BTreeMap`/`BTreeSet` only, integer percentages
//! - Clock-free: every mutating call receives `now` from its caller
//! - No async, no network, no logging dependency; diagnostics are returned
//!   to the caller

// =============================================================================
// MODULES
// =============================================================================

pub mod aggregator;
pub mod catalog;
pub mod dashboard;
pub mod ledger;
pub mod matrix;
pub mod ordering;
pub mod primitives;
pub mod progress;
pub mod store;
pub mod tracker;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Criterion, CriterionDraft, CriterionId, CriterionStatus, Decision, ProductId, Release,
    ReleaseDraft, ReleaseId, ReleaseStatus, RelgateError, SignOff, SignOffId, SignOffStatus,
    StakeholderAssignment, TemplateId, UserId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use aggregator::{Aggregation, compute_criterion_status};
pub use catalog::{Catalog, Product, Template, TemplateCriterion};
pub use dashboard::{PendingItem, ReleaseSummary};
pub use ledger::{RecomputeReport, RevokeOutcome, SignOffLedger, SignOffOutcome, SignOffRequest};
pub use matrix::{MatrixCell, MatrixRow, SignOffMatrix};
pub use ordering::{CriteriaSortKey, sort_criteria};
pub use progress::{ProgressSummary, calculate_progress};
pub use store::{MemoryStore, RedbStore, ReleaseStore, SignOffCommit, StakeholderCommit};
pub use tracker::{
    CriterionUpdate, CriterionView, ReleaseDetail, ReleaseFilter, ReleaseUpdate,
    StakeholderChange, StorageBackend, Tracker,
};
