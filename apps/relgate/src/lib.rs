//! # relgate
//!
//! Release sign-off server and CLI over `relgate-core`.
//!
//! - [`api`]: axum HTTP API
//! - [`cli`]: clap command-line interface
//! - [`config`]: TOML server configuration and catalog

pub mod api;
pub mod cli;
pub mod config;
