//! # Catalog
//!
//! Read-only products and criteria templates.
//!
//! The catalog is supplied by configuration; relgate never edits it. A
//! template is copied into a release at creation time, so later template
//! changes never reach existing releases.

use crate::primitives::MAX_NAME_LENGTH;
use crate::validation;
use crate::{CriterionDraft, ProductId, RelgateError, TemplateId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A product releases belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Template used when a release is created without one.
    #[serde(default)]
    pub default_template: Option<TemplateId>,
}

/// One criterion inside a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCriterion {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_mandatory")]
    pub is_mandatory: bool,
    #[serde(default)]
    pub default_owner: Option<UserId>,
    #[serde(default)]
    pub order: u32,
}

fn default_mandatory() -> bool {
    true
}

/// A reusable named set of criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub criteria: Vec<TemplateCriterion>,
}

impl Template {
    /// Snapshot the template as criterion drafts for a new release.
    #[must_use]
    pub fn instantiate(&self) -> Vec<CriterionDraft> {
        self.criteria
            .iter()
            .map(|tc| CriterionDraft {
                name: tc.name.clone(),
                description: tc.description.clone(),
                is_mandatory: tc.is_mandatory,
                owner: tc.default_owner,
                order: tc.order,
            })
            .collect()
    }
}

/// Products and templates keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: BTreeMap<ProductId, Product>,
    templates: BTreeMap<TemplateId, Template>,
}

impl Catalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, validating names and template references.
    pub fn from_parts(
        products: Vec<Product>,
        templates: Vec<Template>,
    ) -> Result<Self, RelgateError> {
        let mut catalog = Self::new();
        for template in templates {
            validate_label("template name", &template.name)?;
            for tc in &template.criteria {
                validate_label("template criterion name", &tc.name)?;
            }
            if catalog.templates.insert(template.id, template).is_some() {
                return Err(RelgateError::InvalidInput(
                    "duplicate template id in catalog".to_string(),
                ));
            }
        }
        for product in products {
            validate_label("product name", &product.name)?;
            if let Some(template) = product.default_template
                && !catalog.templates.contains_key(&template)
            {
                return Err(RelgateError::TemplateNotFound(template));
            }
            if catalog.products.insert(product.id, product).is_some() {
                return Err(RelgateError::InvalidInput(
                    "duplicate product id in catalog".to_string(),
                ));
            }
        }
        Ok(catalog)
    }

    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id)
    }

    #[must_use]
    pub fn template(&self, id: TemplateId) -> Option<&Template> {
        self.templates.get(&id)
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// Pick the template for a new release.
    ///
    /// An explicit template wins; otherwise the product default applies.
    /// Returns `None` when neither exists (the release starts empty).
    pub fn resolve_template(
        &self,
        product: ProductId,
        requested: Option<TemplateId>,
    ) -> Result<Option<&Template>, RelgateError> {
        let product = self
            .product(product)
            .ok_or(RelgateError::ProductNotFound(product))?;

        match requested.or(product.default_template) {
            Some(id) => self
                .template(id)
                .map(Some)
                .ok_or(RelgateError::TemplateNotFound(id)),
            None => Ok(None),
        }
    }
}

fn validate_label(field: &str, value: &str) -> Result<(), RelgateError> {
    validation::required(field, value, MAX_NAME_LENGTH).map(|_| ())
}
