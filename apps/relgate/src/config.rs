//! # Server Configuration
//!
//! `relgate.toml` holds the server settings and the read-only catalog of
//! products and criteria templates.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 8080
//! database = "relgate.db"
//! backend = "redb"
//! rate_limit = 100
//! cors_origins = ["http://localhost:3000"]
//!
//! [[templates]]
//! id = 1
//! name = "Standard"
//! criteria = [
//!     { name = "Full Regression", order = 1 },
//!     { name = "Release Notes", is_mandatory = false, order = 2 },
//! ]
//!
//! [[products]]
//! id = 1
//! name = "Storefront"
//! default_template = 1
//! ```
//!
//! ## Environment Overrides
//!
//! - `RELGATE_API_KEY`: enables bearer authentication
//! - `RELGATE_RATE_LIMIT`: requests per second, 0 disables limiting
//! - `RELGATE_CORS_ORIGINS`: comma-separated origins, or `*` for all

use relgate_core::{Catalog, Product, RelgateError, Template};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default rate limit in requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// BACKEND
// =============================================================================

/// Where releases are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ACID redb database at `database`.
    #[default]
    Redb,
    /// Process-local store; everything is lost on exit.
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = RelgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(RelgateError::InvalidInput(format!(
                "unknown backend '{}' (expected redb or memory)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redb => f.write_str("redb"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

// =============================================================================
// SERVER CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database: PathBuf,
    pub backend: Backend,
    /// Requests per second; 0 disables limiting.
    pub rate_limit: u32,
    /// Allowed CORS origins. Empty means localhost only, `["*"]` means all.
    pub cors_origins: Vec<String>,
    /// Bearer key required on every route except `/health`.
    pub api_key: Option<String>,
    pub products: Vec<Product>,
    pub templates: Vec<Template>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database: PathBuf::from("relgate.db"),
            backend: Backend::Redb,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: Vec::new(),
            api_key: None,
            products: Vec::new(),
            templates: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, RelgateError> {
        toml::from_str(text)
            .map_err(|e| RelgateError::DeserializationError(format!("Config: {}", e)))
    }

    /// Load `path`, falling back to defaults when it is absent, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, RelgateError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| RelgateError::IoError(format!("Read config: {}", e)))?;
                Self::from_toml(&text)?
            }
            Some(path) => {
                tracing::warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `RELGATE_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("RELGATE_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(rate) = lookup("RELGATE_RATE_LIMIT") {
            match rate.trim().parse() {
                Ok(rate) => self.rate_limit = rate,
                Err(_) => tracing::warn!("Ignoring invalid RELGATE_RATE_LIMIT '{}'", rate),
            }
        }
        if let Some(origins) = lookup("RELGATE_CORS_ORIGINS") {
            self.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        // An empty key means authentication is off.
        self.api_key = self.api_key.take().filter(|k| !k.is_empty());
    }

    /// `host:port` for the listener.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validated catalog built from `[[products]]` and `[[templates]]`.
    pub fn catalog(&self) -> Result<Catalog, RelgateError> {
        Catalog::from_parts(self.products.clone(), self.templates.clone())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use relgate_core::{ProductId, TemplateId};

    const SAMPLE: &str = r#"
        port = 9000
        backend = "memory"
        rate_limit = 0

        [[templates]]
        id = 7
        name = "Standard"
        criteria = [
            { name = "Full Regression", order = 1, default_owner = 4 },
            { name = "Release Notes", is_mandatory = false, order = 2 },
        ]

        [[products]]
        id = 1
        name = "Storefront"
        default_template = 7
    "#;

    #[test]
    fn parses_sample_document() {
        let config = ServerConfig::from_toml(SAMPLE).expect("parse");
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.rate_limit, 0);

        let catalog = config.catalog().expect("catalog");
        let product = catalog.product(ProductId(1)).expect("product");
        assert_eq!(product.default_template, Some(TemplateId(7)));
        let template = catalog.template(TemplateId(7)).expect("template");
        assert!(template.criteria[0].is_mandatory);
        assert!(!template.criteria[1].is_mandatory);
    }

    #[test]
    fn unknown_default_template_is_rejected() {
        let config = ServerConfig::from_toml(
            r#"
            [[products]]
            id = 1
            name = "Storefront"
            default_template = 3
            "#,
        )
        .expect("parse");
        assert!(matches!(
            config.catalog(),
            Err(RelgateError::TemplateNotFound(TemplateId(3)))
        ));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = ServerConfig::from_toml(SAMPLE).expect("parse");
        config.apply_overrides(|key| match key {
            "RELGATE_API_KEY" => Some("secret".to_string()),
            "RELGATE_RATE_LIMIT" => Some("25".to_string()),
            "RELGATE_CORS_ORIGINS" => Some("http://a.test, http://b.test".to_string()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.rate_limit, 25);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn empty_api_key_disables_auth() {
        let mut config = ServerConfig::default();
        config.apply_overrides(|key| (key == "RELGATE_API_KEY").then(String::new));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let config = ServerConfig::load(Some(&dir.path().join("absent.toml"))).expect("load");
        assert_eq!(config.port, 8080);
        assert!(config.products.is_empty());
    }

    #[test]
    fn backend_parses_from_cli_names() {
        assert_eq!("redb".parse::<Backend>().expect("redb"), Backend::Redb);
        assert_eq!("memory".parse::<Backend>().expect("memory"), Backend::Memory);
        assert!("file".parse::<Backend>().is_err());
    }
}
