//! Static industry template records used by the fallback chain.

use serde::{Deserialize, Serialize};

/// A risk category offered for an industry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTemplate {
    /// Identifier stored in the hidden category field
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Typical inherent likelihood for risks in this category (1-5)
    #[serde(default)]
    pub typical_likelihood: Option<u8>,
    /// Typical inherent impact for risks in this category (1-5)
    #[serde(default)]
    pub typical_impact: Option<u8>,
}

/// A template risk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskTemplate {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub root_causes: Vec<String>,
    #[serde(default)]
    pub consequences: Vec<String>,
}

/// A template control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlTemplate {
    pub title: String,
    pub control_type: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
}
