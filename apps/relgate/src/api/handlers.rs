//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers. Every handler
//! reads the wall clock once and hands it to the tracker.

use super::{
    AppState,
    auth::ActingUser,
    types::{
        AssignStakeholdersRequest, AssignStakeholdersResponse, CreateCriterionRequest,
        CreateReleaseRequest, CriterionChange, ErrorResponse, HealthResponse, ListQuery,
        ReleaseListResponse, RevokeResponse, SignOffBody, SignOffResponse,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use relgate_core::{
    CriterionId, CriterionUpdate, RecomputeReport, ReleaseId, ReleaseUpdate, RelgateError, UserId,
};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// A `RelgateError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub RelgateError);

impl From<RelgateError> for ApiError {
    fn from(error: RelgateError) -> Self {
        Self(error)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RelgateError::ReleaseNotFound(_)
            | RelgateError::CriterionNotFound(_)
            | RelgateError::CriterionNotInRelease { .. }
            | RelgateError::ProductNotFound(_)
            | RelgateError::TemplateNotFound(_)
            | RelgateError::NothingToRevoke { .. } => StatusCode::NOT_FOUND,
            RelgateError::NotStakeholder { .. } => StatusCode::FORBIDDEN,
            RelgateError::ReleaseCancelled(_) | RelgateError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            RelgateError::DerivedStatus(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RelgateError::EvidenceRequired(_) | RelgateError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            RelgateError::IoError(_)
            | RelgateError::SerializationError(_)
            | RelgateError::DeserializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(event = "storage_failure", error = %self.0, "Request failed");
            "internal storage error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn log_recompute(release: ReleaseId, report: &RecomputeReport) {
    for (criterion, status) in &report.changed {
        tracing::info!(
            event = "criterion_recomputed",
            release_id = release.0,
            criterion_id = criterion.0,
            status = %status,
            "Criterion status recomputed"
        );
    }
    for (criterion, user) in &report.duplicates {
        log_duplicate(*criterion, *user);
    }
}

fn log_duplicate(criterion: CriterionId, user: UserId) {
    tracing::warn!(
        event = "duplicate_active_signoffs",
        criterion_id = criterion.0,
        user_id = user.0,
        "User has more than one active sign-off; the latest was used"
    );
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// RELEASE HANDLERS
// =============================================================================

pub async fn list_releases_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ReleaseListResponse>> {
    let tracker = state.tracker.read().await;
    let releases = tracker.list_releases(&query.into())?;
    Ok(Json(ReleaseListResponse {
        count: releases.len(),
        releases,
    }))
}

pub async fn create_release_handler(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Json(request): Json<CreateReleaseRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut tracker = state.tracker.write().await;
    let release = tracker.create_release(request.into(), user, Utc::now())?;
    tracing::info!(
        event = "release_created",
        release_id = release.id.0,
        product_id = release.product_id.0,
        user_id = user.0,
        "Release created"
    );
    Ok((StatusCode::CREATED, Json(release)))
}

/// Release detail: sorted criteria with histories, progress, stakeholders.
pub async fn get_release_handler(
    State(state): State<AppState>,
    Path(id): Path<ReleaseId>,
) -> ApiResult<impl IntoResponse> {
    let tracker = state.tracker.read().await;
    Ok(Json(tracker.release_detail(id)?))
}

pub async fn update_release_handler(
    State(state): State<AppState>,
    Path(id): Path<ReleaseId>,
    Json(update): Json<ReleaseUpdate>,
) -> ApiResult<impl IntoResponse> {
    let mut tracker = state.tracker.write().await;
    let release = tracker.update_release(id, update, Utc::now())?;
    tracing::info!(
        event = "release_updated",
        release_id = id.0,
        status = %release.status,
        "Release updated"
    );
    Ok(Json(release))
}

pub async fn delete_release_handler(
    State(state): State<AppState>,
    Path(id): Path<ReleaseId>,
) -> ApiResult<StatusCode> {
    let mut tracker = state.tracker.write().await;
    tracker.delete_release(id, Utc::now())?;
    tracing::info!(event = "release_deleted", release_id = id.0, "Release deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// CRITERION HANDLERS
// =============================================================================

pub async fn add_criterion_handler(
    State(state): State<AppState>,
    Path(release): Path<ReleaseId>,
    Json(request): Json<CreateCriterionRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut tracker = state.tracker.write().await;
    let criterion = tracker.add_criterion(release, request.into(), Utc::now())?;
    Ok((StatusCode::CREATED, Json(criterion)))
}

/// Update a criterion. A manual status may only be `blocked` or `pending`.
pub async fn update_criterion_handler(
    State(state): State<AppState>,
    Path((release, id)): Path<(ReleaseId, CriterionId)>,
    Json(update): Json<CriterionUpdate>,
) -> ApiResult<impl IntoResponse> {
    let mut tracker = state.tracker.write().await;
    let manual = update.status;
    let criterion = tracker.update_criterion(release, id, update, Utc::now())?;
    if let Some(manual) = manual {
        tracing::info!(
            event = "criterion_status_set",
            criterion_id = id.0,
            requested = %manual,
            status = %criterion.status,
            "Criterion status set manually"
        );
    }
    Ok(Json(criterion))
}

pub async fn delete_criterion_handler(
    State(state): State<AppState>,
    Path((release, id)): Path<(ReleaseId, CriterionId)>,
) -> ApiResult<StatusCode> {
    let mut tracker = state.tracker.write().await;
    tracker.delete_criterion(release, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// STAKEHOLDER HANDLERS
// =============================================================================

pub async fn list_stakeholders_handler(
    State(state): State<AppState>,
    Path(release): Path<ReleaseId>,
) -> ApiResult<impl IntoResponse> {
    let tracker = state.tracker.read().await;
    Ok(Json(tracker.list_stakeholders(release)?))
}

pub async fn assign_stakeholders_handler(
    State(state): State<AppState>,
    Path(release): Path<ReleaseId>,
    Json(request): Json<AssignStakeholdersRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut tracker = state.tracker.write().await;
    let change = tracker.assign_stakeholders(release, &request.user_ids, Utc::now())?;
    tracing::info!(
        event = "stakeholders_assigned",
        release_id = release.0,
        added = change.added.len(),
        skipped = change.skipped.len(),
        "Stakeholders assigned"
    );
    log_recompute(release, &change.recompute);
    Ok((
        StatusCode::CREATED,
        Json(AssignStakeholdersResponse::from(change)),
    ))
}

/// Remove one stakeholder. Unknown assignments are a 404 here, not a 403.
pub async fn remove_stakeholder_handler(
    State(state): State<AppState>,
    Path((release, user)): Path<(ReleaseId, UserId)>,
) -> Result<Json<Vec<CriterionChange>>, Response> {
    let mut tracker = state.tracker.write().await;
    let report = match tracker.remove_stakeholder(release, user, Utc::now()) {
        Ok(report) => report,
        Err(e @ RelgateError::NotStakeholder { .. }) => {
            let body = ErrorResponse {
                error: e.to_string(),
            };
            return Err((StatusCode::NOT_FOUND, Json(body)).into_response());
        }
        Err(e) => return Err(ApiError(e).into_response()),
    };
    tracing::info!(
        event = "stakeholder_removed",
        release_id = release.0,
        user_id = user.0,
        "Stakeholder removed"
    );
    log_recompute(release, &report);
    Ok(Json(CriterionChange::list(&report.changed)))
}

// =============================================================================
// SIGN-OFF HANDLERS
// =============================================================================

/// All sign-offs of a release, newest first.
pub async fn release_signoffs_handler(
    State(state): State<AppState>,
    Path(release): Path<ReleaseId>,
) -> ApiResult<impl IntoResponse> {
    let tracker = state.tracker.read().await;
    Ok(Json(tracker.release_signoffs(release)?))
}

pub async fn signoff_matrix_handler(
    State(state): State<AppState>,
    Path(release): Path<ReleaseId>,
) -> ApiResult<impl IntoResponse> {
    let tracker = state.tracker.read().await;
    Ok(Json(tracker.signoff_matrix(release)?))
}

/// Record the acting user's decision, superseding their earlier one.
pub async fn sign_off_handler(
    State(state): State<AppState>,
    Path(criterion): Path<CriterionId>,
    ActingUser(user): ActingUser,
    Json(body): Json<SignOffBody>,
) -> ApiResult<impl IntoResponse> {
    let mut tracker = state.tracker.write().await;
    let outcome = tracker.sign_off(criterion, user, body.into(), Utc::now())?;
    tracing::info!(
        event = "signoff_created",
        criterion_id = criterion.0,
        user_id = user.0,
        signoff_id = outcome.signoff.id.0,
        decision = %outcome.signoff.status,
        superseded = outcome.superseded.len(),
        status = %outcome.status,
        "Sign-off recorded"
    );
    for duplicate in &outcome.duplicate_users {
        log_duplicate(criterion, *duplicate);
    }
    Ok((
        StatusCode::CREATED,
        Json(SignOffResponse {
            signoff: outcome.signoff,
            superseded: outcome.superseded,
            criterion_status: outcome.status,
        }),
    ))
}

/// Withdraw the acting user's most recent active sign-off.
pub async fn revoke_handler(
    State(state): State<AppState>,
    Path(criterion): Path<CriterionId>,
    ActingUser(user): ActingUser,
) -> ApiResult<impl IntoResponse> {
    let mut tracker = state.tracker.write().await;
    let outcome = tracker.revoke(criterion, user, Utc::now())?;
    tracing::info!(
        event = "signoff_revoked",
        criterion_id = criterion.0,
        user_id = user.0,
        signoff_id = outcome.revoked.id.0,
        status = %outcome.status,
        "Sign-off revoked"
    );
    for duplicate in &outcome.duplicate_users {
        log_duplicate(criterion, *duplicate);
    }
    Ok(Json(RevokeResponse {
        revoked: outcome.revoked,
        criterion_status: outcome.status,
    }))
}

// =============================================================================
// DASHBOARD HANDLERS
// =============================================================================

/// Pending criteria owned by the acting user.
pub async fn my_pending_handler(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
) -> ApiResult<impl IntoResponse> {
    let tracker = state.tracker.read().await;
    Ok(Json(tracker.pending_for_owner(user)?))
}

pub async fn releases_summary_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let tracker = state.tracker.read().await;
    Ok(Json(tracker.summary()?))
}

// =============================================================================
// TESTS
// =============================================================================
