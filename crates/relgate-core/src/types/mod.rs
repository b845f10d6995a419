//! # Core Type Definitions
//!
//! This module contains all core types for the relgate sign-off engine:
//! - Entity identifiers (`ReleaseId`, `CriterionId`, `SignOffId`, `UserId`, ...)
//! - Status enums (`CriterionStatus`, `SignOffStatus`, `ReleaseStatus`, `Decision`)
//! - Entity records (`Release`, `Criterion`, `SignOff`, `StakeholderAssignment`)
//! - Drafts used to create entities (`ReleaseDraft`, `CriterionDraft`)
//! - Error types (`RelgateError`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers implement `Ord` so they can key `BTreeMap`/`BTreeSet`.
//! Timestamps are supplied by the caller; nothing in this crate reads a clock.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a release.
    ReleaseId
);
id_type!(
    /// Identifier of a release criterion.
    CriterionId
);
id_type!(
    /// Identifier of a sign-off event. Allocated in increasing order, so a
    /// higher id always means a later creation.
    SignOffId
);
id_type!(
    /// Identifier of a user. Users live outside relgate; only the id is known.
    UserId
);
id_type!(
    /// Identifier of a product in the catalog.
    ProductId
);
id_type!(
    /// Identifier of a criteria template in the catalog.
    TemplateId
);

// =============================================================================
// STATUS ENUMS
// =============================================================================

/// Derived status of a criterion.
///
/// `Blocked` is a manual override and is never produced by aggregation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum CriterionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Blocked,
}

impl CriterionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for CriterionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single sign-off event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOffStatus {
    Approved,
    Rejected,
    /// Terminal. A revoked sign-off no longer counts toward aggregation.
    Revoked,
}

impl SignOffStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Revoked => "revoked",
        }
    }

    /// Whether the sign-off still counts (not revoked).
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Revoked)
    }
}

impl std::fmt::Display for SignOffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision a stakeholder can submit. Revocation is a separate operation,
/// so it is not representable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for SignOffStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => SignOffStatus::Approved,
            Decision::Rejected => SignOffStatus::Rejected,
        }
    }
}

/// Lifecycle status of a release.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    #[default]
    Draft,
    InReview,
    Approved,
    Released,
    Cancelled,
}

impl ReleaseStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [ReleaseStatus; 5] = [
        ReleaseStatus::Draft,
        ReleaseStatus::InReview,
        ReleaseStatus::Approved,
        ReleaseStatus::Released,
        ReleaseStatus::Cancelled,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Released => "released",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a release in this status may be moved to `Cancelled`.
    #[must_use]
    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::InReview | Self::Approved)
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReleaseStatus {
    type Err = RelgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| RelgateError::InvalidInput(format!("unknown release status '{}'", s)))
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A release moving through the sign-off workflow.
///
/// Progress is never stored on the release; it is recomputed from criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: ReleaseId,
    pub product_id: ProductId,
    pub template_id: Option<TemplateId>,
    pub version: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ReleaseStatus,
    pub target_date: Option<NaiveDate>,
    pub released_at: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named release gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: CriterionId,
    pub release_id: ReleaseId,
    pub name: String,
    pub description: Option<String>,
    pub is_mandatory: bool,
    /// Informational only; ownership grants no sign-off weight.
    pub owner: Option<UserId>,
    pub status: CriterionStatus,
    pub order: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One user's decision on one criterion.
///
/// Immutable once created except for the transition to `Revoked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOff {
    pub id: SignOffId,
    pub criterion_id: CriterionId,
    pub signed_by: UserId,
    pub status: SignOffStatus,
    pub comment: Option<String>,
    pub link: Option<String>,
    pub signed_at: DateTime<Utc>,
}

impl SignOff {
    /// Recency key: latest `signed_at` wins, highest id breaks ties.
    #[must_use]
    pub fn recency(&self) -> (DateTime<Utc>, SignOffId) {
        (self.signed_at, self.id)
    }
}

/// A (release, user) pair establishing who counts toward aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeholderAssignment {
    pub release_id: ReleaseId,
    pub user_id: UserId,
    pub assigned_at: DateTime<Utc>,
}

// =============================================================================
// DRAFTS
// =============================================================================

/// Fields needed to create a release; ids and timestamps come from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDraft {
    pub product_id: ProductId,
    pub template_id: Option<TemplateId>,
    pub version: String,
    pub name: String,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
}

/// Fields needed to create a criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionDraft {
    pub name: String,
    pub description: Option<String>,
    pub is_mandatory: bool,
    pub owner: Option<UserId>,
    pub order: u32,
}

impl CriterionDraft {
    /// A mandatory criterion with no description or owner.
    #[must_use]
    pub fn mandatory(name: impl Into<String>, order: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_mandatory: true,
            owner: None,
            order,
        }
    }

    /// An optional criterion with no description or owner.
    #[must_use]
    pub fn optional(name: impl Into<String>, order: u32) -> Self {
        Self {
            is_mandatory: false,
            ..Self::mandatory(name, order)
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in relgate.
///
/// - No silent failures
/// - Use `Result<T, RelgateError>` for fallible operations
/// - The engine never panics; invalid snapshots surface as errors
#[derive(Debug, Error)]
pub enum RelgateError {
    /// The requested release does not exist or was deleted.
    #[error("Release not found: {0}")]
    ReleaseNotFound(ReleaseId),

    /// The requested criterion does not exist.
    #[error("Criterion not found: {0}")]
    CriterionNotFound(CriterionId),

    /// The criterion exists but belongs to a different release.
    #[error("Criterion {criterion} does not belong to release {release}")]
    CriterionNotInRelease {
        criterion: CriterionId,
        release: ReleaseId,
    },

    /// The product is not part of the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The template is not part of the catalog.
    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),

    /// The (release, user) pair has no stakeholder assignment.
    #[error("User {user} is not a stakeholder of release {release}")]
    NotStakeholder { user: UserId, release: ReleaseId },

    /// The release was cancelled and no longer accepts sign-offs.
    #[error("Release {0} is cancelled")]
    ReleaseCancelled(ReleaseId),

    /// An approval on an evidence-required criterion carried no link.
    #[error("A test results link is required for '{0}'")]
    EvidenceRequired(String),

    /// Revocation requested but the user has no active sign-off.
    #[error("No active sign-off by user {user} on criterion {criterion}")]
    NothingToRevoke {
        criterion: CriterionId,
        user: UserId,
    },

    /// A release status change that the lifecycle does not allow.
    #[error("Cannot move release from '{from}' to '{to}'")]
    InvalidTransition {
        from: ReleaseStatus,
        to: ReleaseStatus,
    },

    /// A criterion status that may only be derived, not set by hand.
    #[error("Criterion status '{0}' is derived from sign-offs and cannot be set manually")]
    DerivedStatus(CriterionStatus),

    /// Field-level validation failure.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O error occurred in the storage layer.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Encoding a record failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Decoding a record failed.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_display_as_wire_names() {
        assert_eq!(CriterionStatus::Blocked.to_string(), "blocked");
        assert_eq!(SignOffStatus::Revoked.to_string(), "revoked");
        assert_eq!(ReleaseStatus::InReview.to_string(), "in_review");
    }

    #[test]
    fn revoked_is_not_active() {
        assert!(SignOffStatus::Approved.is_active());
        assert!(SignOffStatus::Rejected.is_active());
        assert!(!SignOffStatus::Revoked.is_active());
    }

    #[test]
    fn decision_maps_to_signoff_status() {
        assert_eq!(
            SignOffStatus::from(Decision::Approved),
            SignOffStatus::Approved
        );
        assert_eq!(
            SignOffStatus::from(Decision::Rejected),
            SignOffStatus::Rejected
        );
    }

    #[test]
    fn release_status_round_trips_through_str() {
        for status in ReleaseStatus::ALL {
            let parsed: ReleaseStatus = status.as_str().parse().expect("parse");
            assert_eq!(parsed, status);
        }
        assert!("shipped".parse::<ReleaseStatus>().is_err());
    }

    #[test]
    fn only_review_and_approved_can_cancel() {
        assert!(!ReleaseStatus::Draft.can_cancel());
        assert!(ReleaseStatus::InReview.can_cancel());
        assert!(ReleaseStatus::Approved.can_cancel());
        assert!(!ReleaseStatus::Released.can_cancel());
        assert!(!ReleaseStatus::Cancelled.can_cancel());
    }

    #[test]
    fn optional_draft_is_not_mandatory() {
        let draft = CriterionDraft::optional("Security Audit", 7);
        assert!(!draft.is_mandatory);
        assert_eq!(draft.order, 7);
    }
}
