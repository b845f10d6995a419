//! # relgate - Release Sign-off Server
//!
//! The main binary for relgate.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for releases, sign-offs and dashboards
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │               apps/relgate (THE BINARY)           │
//! │                                                   │
//! │   ┌─────────────┐    ┌─────────────┐              │
//! │   │   CLI       │    │   HTTP API  │              │
//! │   │  (clap)     │    │   (axum)    │              │
//! │   └──────┬──────┘    └──────┬──────┘              │
//! │          └────────┬─────────┘                     │
//! │                   ▼                               │
//! │           ┌───────────────┐                       │
//! │           │ relgate-core  │                       │
//! │           │ (THE ENGINE)  │                       │
//! │           └───────────────┘                       │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! relgate --config relgate.toml server --port 8080
//!
//! # CLI operations
//! relgate summary
//! relgate matrix 3
//! relgate sign-off --criterion 12 --user 4 --decision approved --link https://ci/run/1
//! ```

use clap::Parser;
use relgate::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // RELGATE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("RELGATE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "relgate=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
