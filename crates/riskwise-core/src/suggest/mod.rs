//! Suggestion batches for a single field request
//!
//! A batch holds at most `MAX_SUGGESTIONS` ranked candidates with exactly one
//! recommended entry. Fields are private so the invariants can't be broken
//! after construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum suggestions offered for one field
pub const MAX_SUGGESTIONS: usize = 3;

/// Where a batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    /// Parsed from the AI gateway response
    Remote,
    /// Static templates or heuristics, no AI cost
    Fallback,
}

impl SuggestionSource {
    pub fn label(&self) -> &'static str {
        match self {
            SuggestionSource::Remote => "AI",
            SuggestionSource::Fallback => "Suggested",
        }
    }
}

/// One candidate value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionItem {
    pub display_text: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Value written to the form when chosen
    pub raw_value: Value,
    #[serde(default)]
    pub recommended: bool,
}

impl SuggestionItem {
    pub fn new(display_text: impl Into<String>, raw_value: Value) -> Self {
        Self {
            display_text: display_text.into(),
            description: None,
            raw_value,
            recommended: false,
        }
    }

    /// Plain text suggestion where display and raw value are the same
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(value.clone(), Value::String(value))
    }

    /// Numeric score suggestion
    pub fn score(score: u8, display_text: impl Into<String>) -> Self {
        Self::new(display_text, Value::from(score))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.trim().is_empty() {
            self.description = Some(description);
        }
        self
    }

    /// Raw value rendered as form text
    pub fn raw_text(&self) -> String {
        value_as_text(&self.raw_value).unwrap_or_else(|| self.display_text.clone())
    }

    /// Raw value as a 1-5 style score, if it is one
    pub fn score_value(&self) -> Option<i64> {
        match &self.raw_value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Render a JSON scalar as form text (strings unquoted)
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Bounded, ranked set of candidates for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionBatch {
    items: Vec<SuggestionItem>,
    recommended_index: usize,
    source: SuggestionSource,
}

impl SuggestionBatch {
    /// Build a batch, truncating to `MAX_SUGGESTIONS` and clamping the
    /// recommended index (anything missing or out of range becomes 0).
    pub fn new(
        mut items: Vec<SuggestionItem>,
        recommended: Option<i64>,
        source: SuggestionSource,
    ) -> Self {
        items.truncate(MAX_SUGGESTIONS);
        let recommended_index = match recommended {
            Some(i) if i >= 0 && (i as usize) < items.len() => i as usize,
            _ => 0,
        };
        for (i, item) in items.iter_mut().enumerate() {
            item.recommended = i == recommended_index;
        }
        Self {
            items,
            recommended_index,
            source,
        }
    }

    pub fn empty(source: SuggestionSource) -> Self {
        Self {
            items: Vec::new(),
            recommended_index: 0,
            source,
        }
    }

    pub fn items(&self) -> &[SuggestionItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<SuggestionItem> {
        self.items
    }

    pub fn get(&self, index: usize) -> Option<&SuggestionItem> {
        self.items.get(index)
    }

    pub fn recommended_index(&self) -> usize {
        self.recommended_index
    }

    pub fn recommended(&self) -> Option<&SuggestionItem> {
        self.items.get(self.recommended_index)
    }

    pub fn source(&self) -> SuggestionSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Whether the user may pick one or several options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    Single,
    Multi,
}

/// An option as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedOption {
    pub index: usize,
    pub label: String,
    pub detail: Option<String>,
    pub recommended: bool,
}

/// What the user picked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// View closed without choosing
    Dismissed,
    Single(usize),
    Multi(Vec<usize>),
}
