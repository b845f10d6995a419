//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands. Each
//! command opens the configured store, runs one tracker operation and prints
//! either a human-readable report or pretty JSON.

use crate::api;
use crate::config::{Backend, ServerConfig};
use chrono::{NaiveDate, Utc};
use relgate_core::{
    CriterionId, Decision, ProductId, ReleaseDraft, ReleaseFilter, ReleaseId, ReleaseStatus,
    RelgateError, SignOffRequest, SignOffStatus, TemplateId, Tracker, UserId,
};
use serde::Serialize;

/// Fields of `relgate create`.
#[derive(Debug, Clone)]
pub struct NewRelease {
    pub product: u64,
    pub template: Option<u64>,
    pub version: String,
    pub name: String,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured store with the configured catalog.
pub fn load_tracker(config: &ServerConfig) -> Result<Tracker, RelgateError> {
    let catalog = config.catalog()?;
    match config.backend {
        Backend::Redb => Tracker::with_redb(&config.database, catalog),
        Backend::Memory => {
            tracing::warn!("Using the in-memory backend; changes are lost on exit");
            Ok(Tracker::new(catalog))
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

/// 6666 -> "66.66".
fn basis_points_percent(bp: u16) -> String {
    format!("{}.{:02}", bp / 100, bp % 100)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &ServerConfig) -> Result<(), RelgateError> {
    let tracker = load_tracker(config)?;

    println!("relgate Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:  {}", config.addr());
    println!("  Backend:  {}", config.backend);
    println!("  Database: {:?}", config.database);
    println!(
        "  Catalog:  {} products, {} templates",
        config.products.len(),
        config.templates.len()
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(tracker, config).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(config: &ServerConfig, force: bool) -> Result<(), RelgateError> {
    if config.backend == Backend::Memory {
        return Err(RelgateError::InvalidInput(
            "the memory backend has no database to initialize".to_string(),
        ));
    }

    let path = &config.database;
    if path.exists() {
        if !force {
            return Err(RelgateError::InvalidInput(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path)
            .map_err(|e| RelgateError::IoError(format!("Remove db: {}", e)))?;
    }

    load_tracker(config)?;
    println!("Initialized new redb database at {:?}", path);
    Ok(())
}

/// Compact an existing database file.
pub fn cmd_compact(config: &ServerConfig) -> Result<(), RelgateError> {
    if config.backend == Backend::Memory {
        return Err(RelgateError::InvalidInput(
            "the memory backend has no database to compact".to_string(),
        ));
    }
    if !config.database.exists() {
        return Err(RelgateError::InvalidInput(format!(
            "no database at {:?}; run init first",
            config.database
        )));
    }

    let mut tracker = load_tracker(config)?;
    tracker.compact()?;
    tracing::info!(event = "database_compacted", path = ?config.database, "Database compacted");
    println!("Compacted {:?}", config.database);
    Ok(())
}

// =============================================================================
// SUMMARY COMMAND
// =============================================================================

/// Release counts by status and the configured catalog.
pub fn cmd_summary(config: &ServerConfig, json_mode: bool) -> Result<(), RelgateError> {
    let tracker = load_tracker(config)?;
    let summary = tracker.summary()?;

    if json_mode {
        let products: Vec<_> = tracker.catalog().products().collect();
        let templates: Vec<_> = tracker.catalog().templates().collect();
        print_json(&serde_json::json!({
            "database": config.database.to_string_lossy(),
            "backend": config.backend,
            "releases": summary,
            "products": products,
            "templates": templates,
        }));
        return Ok(());
    }

    println!("relgate Summary");
    println!("===============");
    println!("Database: {:?}", config.database);
    println!("Backend:  {}", config.backend);
    println!();
    println!("Releases: {}", summary.total);
    for (status, count) in &summary.by_status {
        println!("  {:<10} {}", status.as_str(), count);
    }
    println!();
    println!("Products:");
    for product in tracker.catalog().products() {
        let template = product
            .default_template
            .and_then(|id| tracker.catalog().template(id))
            .map(|t| t.name.as_str())
            .unwrap_or("-");
        println!(
            "  {:>4}  {} (template: {})",
            product.id.0, product.name, template
        );
    }
    Ok(())
}

// =============================================================================
// RELEASE COMMANDS
// =============================================================================

pub fn cmd_list(
    config: &ServerConfig,
    json_mode: bool,
    product: Option<u64>,
    status: Option<ReleaseStatus>,
    skip: usize,
    limit: Option<usize>,
) -> Result<(), RelgateError> {
    let tracker = load_tracker(config)?;
    let releases = tracker.list_releases(&ReleaseFilter {
        product_id: product.map(ProductId),
        status,
        skip,
        limit,
    })?;

    if json_mode {
        print_json(&releases);
        return Ok(());
    }

    if releases.is_empty() {
        println!("No releases.");
    }
    for release in &releases {
        let target = release
            .target_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>5}  {:<10} {} {}  (product {}, target {})",
            release.id.0,
            release.status.as_str(),
            release.name,
            release.version,
            release.product_id,
            target
        );
    }
    Ok(())
}

pub fn cmd_create(
    config: &ServerConfig,
    json_mode: bool,
    new: NewRelease,
    user: u64,
) -> Result<(), RelgateError> {
    let mut tracker = load_tracker(config)?;
    let draft = ReleaseDraft {
        product_id: ProductId(new.product),
        template_id: new.template.map(TemplateId),
        version: new.version,
        name: new.name,
        description: new.description,
        target_date: new.target_date,
    };
    let release = tracker.create_release(draft, UserId(user), Utc::now())?;
    tracing::info!(
        event = "release_created",
        release_id = release.id.0,
        user_id = user,
        "Release created"
    );

    if json_mode {
        print_json(&release);
    } else {
        println!(
            "Created release {}: {} {}",
            release.id, release.name, release.version
        );
    }
    Ok(())
}

/// Release detail with progress and any stored/computed status drift.
pub fn cmd_show(config: &ServerConfig, json_mode: bool, release: u64) -> Result<(), RelgateError> {
    let tracker = load_tracker(config)?;
    let id = ReleaseId(release);
    let detail = tracker.release_detail(id)?;
    let drift = tracker.status_drift(id)?;

    if json_mode {
        print_json(&detail);
        return Ok(());
    }

    let release = &detail.release;
    let progress = &detail.progress;
    println!(
        "Release {}: {} {} [{}]",
        release.id, release.name, release.version, release.status
    );
    if let Some(description) = &release.description {
        println!("  {}", description);
    }
    println!(
        "Mandatory: {}/{} ({}%)   Optional: {}/{} ({}%)   Ready: {}",
        progress.mandatory_approved,
        progress.mandatory_total,
        basis_points_percent(progress.mandatory_basis_points),
        progress.optional_approved,
        progress.optional_total,
        basis_points_percent(progress.optional_basis_points),
        yes_no(progress.all_mandatory_approved)
    );
    let stakeholders: Vec<String> = detail
        .stakeholders
        .iter()
        .map(|s| s.user_id.to_string())
        .collect();
    println!("Stakeholders: {}", stakeholders.join(", "));
    println!();
    println!("Criteria:");
    for view in &detail.criteria {
        let criterion = &view.criterion;
        let owner = criterion
            .owner
            .map(|o| o.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>5}  [{:<8}] {}{}  owner={}  sign-offs={}",
            criterion.id.0,
            criterion.status.as_str(),
            criterion.name,
            if criterion.is_mandatory { "" } else { " (optional)" },
            owner,
            view.signoffs.len()
        );
    }
    for (criterion, stored, computed) in drift {
        tracing::warn!(
            event = "status_drift",
            criterion_id = criterion.0,
            stored = %stored,
            computed = %computed,
            "Stored criterion status disagrees with its sign-offs"
        );
    }
    Ok(())
}

/// Criteria x stakeholders grid. `A` approved, `R` rejected, `.` none.
pub fn cmd_matrix(
    config: &ServerConfig,
    json_mode: bool,
    release: u64,
) -> Result<(), RelgateError> {
    let tracker = load_tracker(config)?;
    let matrix = tracker.signoff_matrix(ReleaseId(release))?;

    if json_mode {
        print_json(&matrix);
        return Ok(());
    }

    let width = matrix
        .rows
        .iter()
        .map(|r| r.criterion_name.len())
        .max()
        .unwrap_or(0)
        .max("criterion".len());
    let mut header = format!("{:<width$}  {:<8}", "criterion", "status", width = width);
    for user in &matrix.stakeholders {
        header.push_str(&format!(" {:>5}", user.0));
    }
    println!("{}", header);

    for row in &matrix.rows {
        let mut line = format!(
            "{:<width$}  {:<8}",
            row.criterion_name,
            row.status.as_str(),
            width = width
        );
        for cell in &row.cells {
            let mark = match cell.status {
                Some(SignOffStatus::Approved) => "A",
                Some(SignOffStatus::Rejected) => "R",
                _ => ".",
            };
            line.push_str(&format!(" {:>5}", mark));
        }
        if row.computed_status != row.status {
            line.push_str(&format!("  (computed: {})", row.computed_status));
        }
        println!("{}", line);
    }
    Ok(())
}

// =============================================================================
// SIGN-OFF COMMANDS
// =============================================================================

pub fn cmd_sign_off(
    config: &ServerConfig,
    json_mode: bool,
    criterion: u64,
    user: u64,
    decision: Decision,
    comment: Option<String>,
    link: Option<String>,
) -> Result<(), RelgateError> {
    let mut tracker = load_tracker(config)?;
    let request = SignOffRequest {
        decision,
        comment,
        link,
    };
    let outcome = tracker.sign_off(CriterionId(criterion), UserId(user), request, Utc::now())?;
    tracing::info!(
        event = "signoff_created",
        criterion_id = criterion,
        user_id = user,
        signoff_id = outcome.signoff.id.0,
        status = %outcome.status,
        "Sign-off recorded"
    );
    for duplicate in &outcome.duplicate_users {
        tracing::warn!(
            event = "duplicate_active_signoffs",
            criterion_id = criterion,
            user_id = duplicate.0,
            "User has more than one active sign-off; the latest was used"
        );
    }

    if json_mode {
        print_json(&serde_json::json!({
            "signoff": outcome.signoff,
            "superseded": outcome.superseded,
            "criterion_status": outcome.status,
        }));
    } else {
        println!(
            "Recorded {} by user {} on criterion {} (superseded {}). Criterion is now {}.",
            outcome.signoff.status,
            user,
            criterion,
            outcome.superseded.len(),
            outcome.status
        );
    }
    Ok(())
}

pub fn cmd_revoke(
    config: &ServerConfig,
    json_mode: bool,
    criterion: u64,
    user: u64,
) -> Result<(), RelgateError> {
    let mut tracker = load_tracker(config)?;
    let outcome = tracker.revoke(CriterionId(criterion), UserId(user), Utc::now())?;
    tracing::info!(
        event = "signoff_revoked",
        criterion_id = criterion,
        user_id = user,
        signoff_id = outcome.revoked.id.0,
        status = %outcome.status,
        "Sign-off revoked"
    );

    if json_mode {
        print_json(&serde_json::json!({
            "revoked": outcome.revoked,
            "criterion_status": outcome.status,
        }));
    } else {
        println!(
            "Revoked sign-off {} on criterion {}. Criterion is now {}.",
            outcome.revoked.id, criterion, outcome.status
        );
    }
    Ok(())
}

// =============================================================================
// STAKEHOLDER / DASHBOARD COMMANDS
// =============================================================================

pub fn cmd_assign(
    config: &ServerConfig,
    json_mode: bool,
    release: u64,
    users: &[u64],
) -> Result<(), RelgateError> {
    let mut tracker = load_tracker(config)?;
    let users: Vec<UserId> = users.iter().copied().map(UserId).collect();
    let change = tracker.assign_stakeholders(ReleaseId(release), &users, Utc::now())?;

    if json_mode {
        print_json(&api::AssignStakeholdersResponse::from(change));
        return Ok(());
    }

    println!(
        "Assigned {} stakeholder(s), {} already assigned.",
        change.added.len(),
        change.skipped.len()
    );
    for (criterion, status) in &change.recompute.changed {
        println!("  criterion {} is now {}", criterion, status);
    }
    Ok(())
}

pub fn cmd_pending(config: &ServerConfig, json_mode: bool, user: u64) -> Result<(), RelgateError> {
    let tracker = load_tracker(config)?;
    let items = tracker.pending_for_owner(UserId(user))?;

    if json_mode {
        print_json(&items);
        return Ok(());
    }

    if items.is_empty() {
        println!("Nothing pending for user {}.", user);
    }
    for item in &items {
        let target = item
            .release
            .target_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "no target".to_string());
        println!(
            "  {} {} ({}): {}",
            item.release.name, item.release.version, target, item.criterion.name
        );
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
