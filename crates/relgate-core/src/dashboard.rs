//! # Dashboard
//!
//! Cross-release read models: a user's pending work and release counts.

use crate::ordering::CriteriaSortKey;
use crate::{Criterion, CriterionStatus, Release, ReleaseStatus, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A pending criterion owned by the requesting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingItem {
    pub release: Release,
    pub criterion: Criterion,
}

/// Release counts by status, excluding deleted releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub total: usize,
    /// Every status is present, zero when unused.
    pub by_status: BTreeMap<ReleaseStatus, usize>,
}

/// Criteria owned by `owner` that still await sign-off.
///
/// Only `pending` criteria of live `draft` or `in_review` releases count.
/// Ordered by target date with undated releases last, then release id,
/// then display order within a release.
#[must_use]
pub fn pending_for_owner(
    owner: UserId,
    releases: Vec<(Release, Vec<Criterion>)>,
) -> Vec<PendingItem> {
    let mut items: Vec<PendingItem> = releases
        .into_iter()
        .filter(|(release, _)| {
            !release.is_deleted
                && matches!(release.status, ReleaseStatus::Draft | ReleaseStatus::InReview)
        })
        .flat_map(|(release, criteria)| {
            criteria
                .into_iter()
                .filter(|c| c.owner == Some(owner) && c.status == CriterionStatus::Pending)
                .map(move |criterion| PendingItem {
                    release: release.clone(),
                    criterion,
                })
        })
        .collect();

    items.sort_by_cached_key(|item| {
        (
            item.release.target_date.is_none(),
            item.release.target_date,
            item.release.id,
            CriteriaSortKey::for_name(&item.criterion.name),
        )
    });
    items
}

/// Count live releases per status.
#[must_use]
pub fn summarize_releases(releases: &[Release]) -> ReleaseSummary {
    let mut by_status: BTreeMap<ReleaseStatus, usize> =
        ReleaseStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    let mut total = 0usize;

    for release in releases.iter().filter(|r| !r.is_deleted) {
        total += 1;
        *by_status.entry(release.status).or_default() += 1;
    }

    ReleaseSummary { total, by_status }
}
