//! Industry template library
//!
//! Built-in templates are embedded at compile time. A workspace can replace
//! the whole library with `.riskwise/templates.toml` in the same format.
//! Industries missing from the library fall back to `general`.

use anyhow::Context;
use riskwise_core::templates::{CategoryTemplate, ControlTemplate, RiskTemplate};
use riskwise_core::TemplateLookup;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::store::WORKSPACE_DIR;

const BUILTIN_TEMPLATES: &str = include_str!("../templates/industries.toml");
const OVERRIDE_FILE: &str = "templates.toml";
const GENERAL: &str = "general";

#[derive(Debug, Clone, Default, Deserialize)]
struct IndustryTemplates {
    #[serde(default)]
    owner_roles: Vec<String>,
    #[serde(default)]
    categories: Vec<CategoryTemplate>,
    #[serde(default)]
    risks: Vec<RiskTemplate>,
    #[serde(default)]
    controls: Vec<ControlTemplate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TemplateDocument {
    #[serde(default)]
    industries: BTreeMap<String, IndustryTemplates>,
}

#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    industries: BTreeMap<String, IndustryTemplates>,
}

impl TemplateLibrary {
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_toml(BUILTIN_TEMPLATES).context("Built-in templates are invalid")
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let doc: TemplateDocument = toml::from_str(content)?;
        Ok(Self {
            industries: doc
                .industries
                .into_iter()
                .map(|(name, templates)| (normalize_industry(&name), templates))
                .collect(),
        })
    }

    /// Workspace override when present and valid, built-in otherwise
    pub fn for_workspace(workspace_root: &Path) -> anyhow::Result<Self> {
        let path = workspace_root.join(WORKSPACE_DIR).join(OVERRIDE_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(library) => {
                    debug!(path = %path.display(), "using workspace templates");
                    Ok(library)
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "ignoring invalid workspace templates");
                    Self::builtin()
                }
            },
            Err(_) => Self::builtin(),
        }
    }

    pub fn industries(&self) -> impl Iterator<Item = &str> {
        self.industries.keys().map(String::as_str)
    }

    fn industry(&self, industry: &str) -> Option<&IndustryTemplates> {
        self.industries
            .get(&normalize_industry(industry))
            .or_else(|| self.industries.get(GENERAL))
    }
}

/// "Financial Services" and "financial_services" both become "financial-services"
fn normalize_industry(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

impl TemplateLookup for TemplateLibrary {
    fn categories(&self, industry: &str) -> Vec<CategoryTemplate> {
        self.industry(industry)
            .map(|t| t.categories.clone())
            .unwrap_or_default()
    }

    fn risks(&self, industry: &str, category: Option<&str>) -> Vec<RiskTemplate> {
        self.industry(industry)
            .map(|t| {
                t.risks
                    .iter()
                    .filter(|r| category.map_or(true, |cat| r.category == cat))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn controls(&self, industry: &str, category: Option<&str>) -> Vec<ControlTemplate> {
        self.industry(industry)
            .map(|t| {
                t.controls
                    .iter()
                    .filter(|c| category.map_or(true, |cat| c.category.as_deref() == Some(cat)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn owner_roles(&self, industry: &str) -> Vec<String> {
        self.industry(industry)
            .map(|t| t.owner_roles.clone())
            .unwrap_or_default()
    }
}
