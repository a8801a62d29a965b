//! Contracts between the pipeline and its collaborators.
//!
//! The engine depends only on these traits; concrete gateways, quota guards,
//! storage and views live in adapters or the host application.

use crate::context::RelatedSummary;
use crate::error::GatewayError;
use crate::field::{EntityType, FieldType};
use crate::suggest::{PresentedOption, Selection, SelectionMode};
use crate::templates::{CategoryTemplate, ControlTemplate, RiskTemplate};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A generation request for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub system_prompt: String,
    pub user_prompt: String,
    pub field_type: FieldType,
}

/// Options passed alongside the user prompt
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Remote model invocation. The returned future resolves exactly once.
pub trait AiGateway: Send + Sync {
    fn invoke<'a>(
        &'a self,
        user_prompt: &'a str,
        options: &'a GenerationOptions,
    ) -> BoxFuture<'a, Result<String, GatewayError>>;
}

/// Result of a quota check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl QuotaDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Remote-call usage for the current workspace period
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotaState {
    pub used: u32,
    pub limit: u32,
    /// Accounting period, `YYYY-MM`
    pub period: String,
}

impl QuotaState {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }
}

/// Ceiling on remote calls
pub trait QuotaGuard: Send + Sync {
    fn can_make_call(&self) -> QuotaDecision;
    /// Count one dispatched call. An error means the call went uncounted
    /// and must not be dispatched.
    fn record_call(&self) -> Result<(), String>;
    /// Show the guard's own "limit reached" notification
    fn show_limit_notice(&self, decision: &QuotaDecision);
    fn state(&self) -> QuotaState;
}

/// Opaque key-value store
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
}

/// Resolves linked entities to summaries
pub trait EntityLookup: Send + Sync {
    fn get_by_id(&self, entity: EntityType, id: &str) -> Option<RelatedSummary>;
}

/// Read-only industry template data
pub trait TemplateLookup: Send + Sync {
    fn categories(&self, industry: &str) -> Vec<CategoryTemplate>;
    fn risks(&self, industry: &str, category: Option<&str>) -> Vec<RiskTemplate>;
    fn controls(&self, industry: &str, category: Option<&str>) -> Vec<ControlTemplate>;
    fn owner_roles(&self, industry: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing feedback
pub trait Notifier: Send + Sync {
    /// Visual acknowledgment on a field that just changed
    fn acknowledge(&self, field_id: &str);
    fn toast(&self, message: &str, level: ToastLevel);
}

/// Identity of a form at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormSnapshot {
    pub form_id: String,
    pub revision: u64,
}

/// Live form state the pipeline reads from and writes to
pub trait FormAccessor {
    /// Current value of a scalar field; `None` when missing
    fn value(&self, field_id: &str) -> Option<String>;
    /// Current items of a list field; `None` when missing
    fn list(&self, field_id: &str) -> Option<Vec<String>>;
    fn has_field(&self, field_id: &str) -> bool;
    /// Write a scalar field; `false` when the field does not exist
    fn set_value(&mut self, field_id: &str, value: &str) -> bool;
    /// Ids selected in the form for a relation; `None` when the form has no
    /// selection widget state for it
    fn selected_links(&self, relation: &str) -> Option<Vec<String>>;
    fn emit_change(&mut self, field_id: &str);
    fn snapshot(&self) -> FormSnapshot;
}

/// UI that shows options and reports the user's pick
pub trait SuggestionView {
    fn choose(
        &mut self,
        field: FieldType,
        options: &[PresentedOption],
        mode: SelectionMode,
    ) -> Selection;
    fn show_empty(&mut self, field: FieldType, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_remaining_saturates() {
        let state = QuotaState {
            used: 12,
            limit: 10,
            period: "2026-10".into(),
        };
        assert_eq!(state.remaining(), 0);
        let state = QuotaState {
            used: 3,
            ..state
        };
        assert_eq!(state.remaining(), 7);
    }

    #[test]
    fn test_quota_decision_constructors() {
        assert!(QuotaDecision::allow().allowed);
        let denied = QuotaDecision::deny("Monthly limit reached");
        assert!(!denied.allowed);
        assert_eq!(denied.reason.as_deref(), Some("Monthly limit reached"));
    }
}
