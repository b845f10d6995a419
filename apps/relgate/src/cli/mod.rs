//! # relgate CLI Module
//!
//! This module implements the CLI interface for relgate.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `compact` - Compact the database file
//! - `summary` - Release counts by status and the catalog
//! - `list` - List releases
//! - `create` - Create a release from the catalog
//! - `show` - Release detail with progress
//! - `matrix` - Sign-off matrix of a release
//! - `sign-off` - Record a decision on a criterion
//! - `revoke` - Withdraw a decision
//! - `assign` - Assign stakeholders to a release
//! - `pending` - Pending criteria owned by a user

mod commands;

use crate::config::{Backend, ServerConfig};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use relgate_core::{Decision, RelgateError, ReleaseStatus};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// relgate - release sign-off tracking
///
/// A release is ready when every mandatory criterion has been approved by
/// the release's stakeholders.
#[derive(Parser, Debug)]
#[command(name = "relgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the release database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "memory" (lost on exit)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Replace an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Compact the database file
    Compact,

    /// Show release counts by status and the configured catalog
    Summary,

    /// List releases, newest first
    List {
        #[arg(long)]
        product: Option<u64>,

        #[arg(long, value_parser = parse_release_status)]
        status: Option<ReleaseStatus>,

        #[arg(long, default_value = "0")]
        skip: usize,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Create a release from the catalog
    Create {
        #[arg(long)]
        product: u64,

        /// Template to copy (defaults to the product's template)
        #[arg(long)]
        template: Option<u64>,

        /// Version string, e.g. 2.4.0
        #[arg(long = "release-version")]
        version: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        target_date: Option<NaiveDate>,

        /// Creating user; becomes the first stakeholder
        #[arg(short, long)]
        user: u64,
    },

    /// Show a release with its criteria and progress
    Show {
        release: u64,
    },

    /// Show the criteria x stakeholders sign-off matrix
    Matrix {
        release: u64,
    },

    /// Approve or reject a criterion
    SignOff {
        #[arg(long)]
        criterion: u64,

        #[arg(short, long)]
        user: u64,

        /// approved or rejected
        #[arg(long, value_parser = parse_decision)]
        decision: Decision,

        #[arg(long)]
        comment: Option<String>,

        /// Link to test results
        #[arg(long)]
        link: Option<String>,
    },

    /// Revoke a user's latest active sign-off on a criterion
    Revoke {
        #[arg(long)]
        criterion: u64,

        #[arg(short, long)]
        user: u64,
    },

    /// Assign stakeholders to a release
    Assign {
        release: u64,

        /// User ids (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        users: Vec<u64>,
    },

    /// Pending criteria owned by a user
    Pending {
        #[arg(short, long)]
        user: u64,
    },
}

fn parse_decision(value: &str) -> Result<Decision, String> {
    match value {
        "approved" | "approve" => Ok(Decision::Approved),
        "rejected" | "reject" => Ok(Decision::Rejected),
        other => Err(format!(
            "unknown decision '{}' (expected approved or rejected)",
            other
        )),
    }
}

fn parse_release_status(value: &str) -> Result<ReleaseStatus, String> {
    value.parse().map_err(|e: RelgateError| e.to_string())
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), RelgateError> {
    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Compact) => cmd_compact(&config),
        Some(Commands::List {
            product,
            status,
            skip,
            limit,
        }) => cmd_list(&config, json_mode, product, status, skip, limit),
        Some(Commands::Create {
            product,
            template,
            version,
            name,
            description,
            target_date,
            user,
        }) => cmd_create(
            &config,
            json_mode,
            NewRelease {
                product,
                template,
                version,
                name,
                description,
                target_date,
            },
            user,
        ),
        Some(Commands::Show { release }) => cmd_show(&config, json_mode, release),
        Some(Commands::Matrix { release }) => cmd_matrix(&config, json_mode, release),
        Some(Commands::SignOff {
            criterion,
            user,
            decision,
            comment,
            link,
        }) => cmd_sign_off(
            &config, json_mode, criterion, user, decision, comment, link,
        ),
        Some(Commands::Revoke { criterion, user }) => {
            cmd_revoke(&config, json_mode, criterion, user)
        }
        Some(Commands::Assign { release, users }) => {
            cmd_assign(&config, json_mode, release, &users)
        }
        Some(Commands::Pending { user }) => cmd_pending(&config, json_mode, user),
        Some(Commands::Summary) | None => cmd_summary(&config, json_mode),
    }
}

// =============================================================================
// TESTS
// =============================================================================
