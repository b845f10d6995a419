//! # Workflow Primitives
//!
//! Hardcoded constants for the relgate engine.
//!
//! These are compiled into the binary and immutable at runtime:
//! 1. **Canonical order**: the predefined criteria and their display order.
//! 2. **Evidence rule**: criteria whose approval must carry a results link.
//! 3. **Input limits**: bounds applied before any state change.

/// Predefined criteria in canonical display order.
///
/// Criteria whose name is not in this list are "custom" and sort after all
/// of these, alphabetically.
pub const CANONICAL_CRITERIA: [&str; 8] = [
    "Content Review",
    "Bug Verification",
    "Smoke & Extended Smoke Regression",
    "Full Regression",
    "CPT Sign-off",
    "Pre-Prod Monitoring incl. Crash Analysis",
    "Production Monitoring",
    "Security Audit",
];

/// Criteria whose `approved` sign-offs require a non-empty evidence link.
pub const EVIDENCE_REQUIRED_CRITERIA: [&str; 3] = [
    "Smoke & Extended Smoke Regression",
    "Full Regression",
    "CPT Sign-off",
];

/// Percent reported for an empty partition.
///
/// An absent requirement cannot block a release.
pub const VACUOUS_PERCENT: u8 = 100;

/// Basis points in a whole (100.00%).
pub const BASIS_POINTS_SCALE: u16 = 10_000;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for release and criterion names (bytes).
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum length for release version strings (bytes).
pub const MAX_VERSION_LENGTH: usize = 50;

/// Maximum length for descriptions and sign-off comments (bytes).
pub const MAX_COMMENT_LENGTH: usize = 4096;

/// Maximum length for evidence links (bytes).
pub const MAX_LINK_LENGTH: usize = 2048;

/// Maximum number of users in a single stakeholder assignment batch.
pub const MAX_STAKEHOLDER_BATCH: usize = 100;

/// Default page size for release listings.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Maximum page size for release listings.
pub const MAX_LIST_LIMIT: usize = 500;

/// Whether an approval on `criterion_name` must carry an evidence link.
#[must_use]
pub fn requires_evidence(criterion_name: &str) -> bool {
    EVIDENCE_REQUIRED_CRITERIA.contains(&criterion_name)
}
