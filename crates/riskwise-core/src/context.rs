//! Form context assembled for a single suggestion request.
//!
//! A `FormContext` is an ordered list of known facts about the entity being
//! edited. It is built once per request and never mutated afterwards, so
//! prompt text only mentions what the form actually contains.

use crate::field::{EntityType, FieldType};
use serde::{Deserialize, Serialize};

/// Logical field names used as context keys
pub mod keys {
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const CATEGORY: &str = "category";
    pub const ROOT_CAUSES: &str = "rootCauses";
    pub const CONSEQUENCES: &str = "consequences";
    pub const OWNER: &str = "owner";
    pub const STATUS: &str = "status";
    pub const TREATMENT: &str = "treatment";
    pub const INHERENT_LIKELIHOOD: &str = "inherentLikelihood";
    pub const INHERENT_IMPACT: &str = "inherentImpact";
    pub const RESIDUAL_LIKELIHOOD: &str = "residualLikelihood";
    pub const RESIDUAL_IMPACT: &str = "residualImpact";
    pub const REVIEW_DATE: &str = "reviewDate";
    pub const TARGET_DATE: &str = "targetDate";
    pub const CONTROL_TYPE: &str = "controlType";
    pub const EFFECTIVENESS: &str = "effectiveness";
    pub const FREQUENCY: &str = "frequency";
    pub const EVIDENCE: &str = "evidence";
    pub const LINKED_CONTROLS: &str = "linkedControls";
    pub const LINKED_RISKS: &str = "linkedRisks";
    pub const INDUSTRY: &str = "industry";
    pub const REGISTER_TYPE: &str = "registerType";
    /// Number of counterpart ids selected or persisted, resolved or not
    pub const LINK_COUNT: &str = "linkCount";
}

/// Context key a field's current value is stored under
pub fn context_key(field: FieldType) -> &'static str {
    match field {
        FieldType::Title | FieldType::ControlTitle => keys::TITLE,
        FieldType::Description | FieldType::ControlDescription => keys::DESCRIPTION,
        FieldType::RootCauses => keys::ROOT_CAUSES,
        FieldType::Consequences => keys::CONSEQUENCES,
        FieldType::Category => keys::CATEGORY,
        FieldType::Owner | FieldType::ControlOwner => keys::OWNER,
        FieldType::Treatment => keys::TREATMENT,
        FieldType::Status => keys::STATUS,
        FieldType::InherentLikelihood => keys::INHERENT_LIKELIHOOD,
        FieldType::InherentImpact => keys::INHERENT_IMPACT,
        FieldType::ResidualLikelihood => keys::RESIDUAL_LIKELIHOOD,
        FieldType::ResidualImpact => keys::RESIDUAL_IMPACT,
        FieldType::ReviewDate => keys::REVIEW_DATE,
        FieldType::TargetDate => keys::TARGET_DATE,
        FieldType::LinkedControls => keys::LINKED_CONTROLS,
        FieldType::ControlType => keys::CONTROL_TYPE,
        FieldType::Frequency => keys::FREQUENCY,
        FieldType::Effectiveness => keys::EFFECTIVENESS,
        FieldType::Evidence => keys::EVIDENCE,
    }
}

/// Summary of a linked risk or control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedSummary {
    pub id: String,
    pub name: String,
    /// Control type or risk category
    #[serde(default)]
    pub kind: Option<String>,
    /// Control effectiveness or risk status
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub likelihood: Option<u8>,
    #[serde(default)]
    pub impact: Option<u8>,
}

impl RelatedSummary {
    /// Likelihood x impact, when both are known
    pub fn risk_score(&self) -> Option<u32> {
        match (self.likelihood, self.impact) {
            (Some(l), Some(i)) => Some(u32::from(l) * u32::from(i)),
            _ => None,
        }
    }
}

/// A single context value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Number(i64),
    Text(String),
    List(Vec<String>),
    Related(Vec<RelatedSummary>),
}

impl ContextValue {
    fn is_blank(&self) -> bool {
        match self {
            ContextValue::Number(_) => false,
            ContextValue::Text(s) => s.trim().is_empty(),
            ContextValue::List(items) => items.iter().all(|s| s.trim().is_empty()),
            // An empty relation is still a fact: "no controls linked"
            ContextValue::Related(_) => false,
        }
    }
}

/// Ordered, immutable set of facts about the entity being edited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormContext {
    entity: EntityType,
    entries: Vec<(String, ContextValue)>,
}

impl FormContext {
    pub fn builder(entity: EntityType) -> FormContextBuilder {
        FormContextBuilder {
            entity,
            entries: Vec::new(),
        }
    }

    pub fn entity(&self) -> EntityType {
        self.entity
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            ContextValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            ContextValue::Number(n) => Some(*n),
            ContextValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> &[String] {
        match self.get(key) {
            Some(ContextValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn related(&self, key: &str) -> &[RelatedSummary] {
        match self.get(key) {
            Some(ContextValue::Related(items)) => items,
            _ => &[],
        }
    }

    /// Entities linked to this one (controls for a risk, risks for a control)
    pub fn linked(&self) -> &[RelatedSummary] {
        match self.entity {
            EntityType::Risk => self.related(keys::LINKED_CONTROLS),
            EntityType::Control => self.related(keys::LINKED_RISKS),
        }
    }

    /// Whether any counterpart is linked. Counts ids that failed to
    /// resolve as well; contexts built without a count use the summaries.
    pub fn has_links(&self) -> bool {
        match self.number(keys::LINK_COUNT) {
            Some(count) => count > 0,
            None => !self.linked().is_empty(),
        }
    }

    /// Entity name, used to ground prompts
    pub fn subject(&self) -> Option<&str> {
        self.text(keys::TITLE)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects context entries, dropping blank values
#[derive(Debug)]
pub struct FormContextBuilder {
    entity: EntityType,
    entries: Vec<(String, ContextValue)>,
}

impl FormContextBuilder {
    /// Add a value; blank values and repeated keys are ignored
    pub fn push(&mut self, key: &str, value: ContextValue) -> &mut Self {
        if value.is_blank() || self.entries.iter().any(|(k, _)| k == key) {
            return self;
        }
        let value = match value {
            ContextValue::Text(s) => ContextValue::Text(s.trim().to_string()),
            ContextValue::List(items) => ContextValue::List(
                items
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            other => other,
        };
        self.entries.push((key.to_string(), value));
        self
    }

    pub fn text(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.push(key, ContextValue::Text(value.into()))
    }

    pub fn number(&mut self, key: &str, value: i64) -> &mut Self {
        self.push(key, ContextValue::Number(value))
    }

    pub fn list(&mut self, key: &str, items: Vec<String>) -> &mut Self {
        self.push(key, ContextValue::List(items))
    }

    pub fn related(&mut self, key: &str, items: Vec<RelatedSummary>) -> &mut Self {
        self.push(key, ContextValue::Related(items))
    }

    pub fn build(&mut self) -> FormContext {
        FormContext {
            entity: self.entity,
            entries: std::mem::take(&mut self.entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_skips_blank_and_duplicate_values() {
        let ctx = FormContext::builder(EntityType::Risk)
            .text(keys::TITLE, "  Data Breach ")
            .text(keys::DESCRIPTION, "   ")
            .text(keys::TITLE, "Other")
            .list(keys::ROOT_CAUSES, vec!["".into(), " Phishing".into()])
            .build();

        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.subject(), Some("Data Breach"));
        assert!(!ctx.contains(keys::DESCRIPTION));
        assert_eq!(ctx.list(keys::ROOT_CAUSES), ["Phishing".to_string()]);
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let ctx = FormContext::builder(EntityType::Control)
            .text(keys::TITLE, "MFA")
            .number(keys::INHERENT_LIKELIHOOD, 3)
            .text(keys::OWNER, "CISO")
            .build();
        let order: Vec<&str> = ctx.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["title", "inherentLikelihood", "owner"]);
    }

    #[test]
    fn test_number_reads_numeric_text() {
        let ctx = FormContext::builder(EntityType::Risk)
            .text(keys::INHERENT_IMPACT, "4")
            .build();
        assert_eq!(ctx.number(keys::INHERENT_IMPACT), Some(4));
    }

    #[test]
    fn test_empty_relation_is_recorded() {
        let ctx = FormContext::builder(EntityType::Risk)
            .related(keys::LINKED_CONTROLS, Vec::new())
            .build();
        assert!(ctx.contains(keys::LINKED_CONTROLS));
        assert!(ctx.linked().is_empty());
    }

    #[test]
    fn test_risk_score_requires_both_factors() {
        let mut summary = RelatedSummary {
            id: "r1".into(),
            name: "Outage".into(),
            kind: None,
            status: None,
            likelihood: Some(3),
            impact: Some(4),
        };
        assert_eq!(summary.risk_score(), Some(12));
        summary.impact = None;
        assert_eq!(summary.risk_score(), None);
    }
}
