//! # Aggregation Benchmarks
//!
//! Performance benchmarks for the pure relgate-core functions.
//!
//! Run with: `cargo bench -p relgate-core`

use chrono::{DateTime, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use relgate_core::{
    CriterionId, CriterionStatus, ReleaseId, SignOff, SignOffId, SignOffStatus, UserId,
    calculate_progress, compute_criterion_status, sort_criteria,
};
use std::collections::BTreeSet;
use std::hint::black_box;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0)
        .single()
        .unwrap_or_default()
}

fn criterion(id: u64, name: String, status: CriterionStatus) -> relgate_core::Criterion {
    relgate_core::Criterion {
        id: CriterionId(id),
        release_id: ReleaseId(1),
        name,
        description: None,
        is_mandatory: id % 3 != 0,
        owner: None,
        status,
        order: 0,
        created_at: at(0),
        updated_at: at(0),
    }
}

/// A history where every user signed `rounds` times, only the last active.
fn create_history(users: u64, rounds: u64) -> Vec<SignOff> {
    let mut history = Vec::new();
    let mut id = 0u64;
    for round in 0..rounds {
        for user in 0..users {
            id += 1;
            history.push(SignOff {
                id: SignOffId(id),
                criterion_id: CriterionId(1),
                signed_by: UserId(user),
                status: if round + 1 == rounds {
                    SignOffStatus::Approved
                } else {
                    SignOffStatus::Revoked
                },
                comment: None,
                link: None,
                signed_at: at(id as i64),
            });
        }
    }
    history
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");
    let target = criterion(1, "Content Review".to_string(), CriterionStatus::Pending);

    for users in [5u64, 50, 500].iter() {
        let history = create_history(*users, 4);
        let stakeholders: BTreeSet<UserId> = (0..*users).map(UserId).collect();
        group.bench_with_input(BenchmarkId::from_parameter(users), users, |b, _| {
            b.iter(|| {
                black_box(compute_criterion_status(
                    black_box(&target),
                    black_box(&stakeholders),
                    black_box(&history),
                ))
            });
        });
    }

    group.finish();
}

fn bench_progress(c: &mut Criterion) {
    let mut group = c.benchmark_group("progress");

    for size in [10u64, 100, 1000].iter() {
        let criteria: Vec<_> = (0..*size)
            .map(|i| {
                let status = if i % 2 == 0 {
                    CriterionStatus::Approved
                } else {
                    CriterionStatus::Pending
                };
                criterion(i, format!("Custom {}", i), status)
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(calculate_progress(black_box(&criteria))));
        });
    }

    group.finish();
}

fn bench_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordering");

    for size in [10u64, 100, 1000].iter() {
        let criteria: Vec<_> = (0..*size)
            .rev()
            .map(|i| criterion(i, format!("Custom {}", i), CriterionStatus::Pending))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut batch = criteria.clone();
                sort_criteria(&mut batch);
                black_box(batch)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aggregation, bench_progress, bench_ordering);
criterion_main!(benches);
