//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API. Entity records
//! from `relgate-core` are returned as-is; only requests and composite
//! responses live here.

use chrono::NaiveDate;
use relgate_core::{
    CriterionDraft, CriterionId, CriterionStatus, Decision, ProductId, Release, ReleaseDraft,
    ReleaseFilter, ReleaseStatus, SignOff, SignOffId, SignOffRequest, StakeholderChange,
    TemplateId, UserId,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every non-2xx response produced by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// =============================================================================
// RELEASES
// =============================================================================

/// Query string of `GET /releases`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub product_id: Option<ProductId>,
    pub status: Option<ReleaseStatus>,
    #[serde(default)]
    pub skip: usize,
    pub limit: Option<usize>,
}

impl From<ListQuery> for ReleaseFilter {
    fn from(query: ListQuery) -> Self {
        ReleaseFilter {
            product_id: query.product_id,
            status: query.status,
            skip: query.skip,
            limit: query.limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReleaseRequest {
    pub product_id: ProductId,
    /// Overrides the product's default template.
    #[serde(default)]
    pub template_id: Option<TemplateId>,
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
}

impl From<CreateReleaseRequest> for ReleaseDraft {
    fn from(request: CreateReleaseRequest) -> Self {
        ReleaseDraft {
            product_id: request.product_id,
            template_id: request.template_id,
            version: request.version,
            name: request.name,
            description: request.description,
            target_date: request.target_date,
        }
    }
}

/// Response of `GET /releases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseListResponse {
    pub releases: Vec<Release>,
    pub count: usize,
}

// =============================================================================
// CRITERIA
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCriterionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_mandatory")]
    pub is_mandatory: bool,
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub order: u32,
}

fn default_mandatory() -> bool {
    true
}

impl From<CreateCriterionRequest> for CriterionDraft {
    fn from(request: CreateCriterionRequest) -> Self {
        CriterionDraft {
            name: request.name,
            description: request.description,
            is_mandatory: request.is_mandatory,
            owner: request.owner,
            order: request.order,
        }
    }
}

// =============================================================================
// STAKEHOLDERS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignStakeholdersRequest {
    pub user_ids: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignStakeholdersResponse {
    pub added: Vec<UserId>,
    /// Users that were already assigned.
    pub skipped: Vec<UserId>,
    /// Criteria whose status changed because the stakeholder set grew.
    pub recomputed: Vec<CriterionChange>,
}

impl From<StakeholderChange> for AssignStakeholdersResponse {
    fn from(change: StakeholderChange) -> Self {
        Self {
            added: change.added,
            skipped: change.skipped,
            recomputed: CriterionChange::list(&change.recompute.changed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionChange {
    pub criterion_id: CriterionId,
    pub status: CriterionStatus,
}

impl CriterionChange {
    pub fn list(changed: &[(CriterionId, CriterionStatus)]) -> Vec<Self> {
        changed
            .iter()
            .map(|(criterion_id, status)| Self {
                criterion_id: *criterion_id,
                status: *status,
            })
            .collect()
    }
}

// =============================================================================
// SIGN-OFFS
// =============================================================================

/// Body of `POST /criteria/{cid}/sign-off`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignOffBody {
    pub status: Decision,
    #[serde(default)]
    pub comment: Option<String>,
    /// Evidence link; required when approving test criteria.
    #[serde(default)]
    pub link: Option<String>,
}

impl From<SignOffBody> for SignOffRequest {
    fn from(body: SignOffBody) -> Self {
        SignOffRequest {
            decision: body.status,
            comment: body.comment,
            link: body.link,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignOffResponse {
    pub signoff: SignOff,
    pub superseded: Vec<SignOffId>,
    pub criterion_status: CriterionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeResponse {
    pub revoked: SignOff,
    pub criterion_status: CriterionStatus,
}

// =============================================================================
// TESTS
// =============================================================================
