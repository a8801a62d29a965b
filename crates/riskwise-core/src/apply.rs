//! Apply requests: how a chosen suggestion is written back into the form.
//!
//! `ApplyTarget` carries only the options each field shape needs, so the
//! applicator can match exhaustively instead of probing an options bag.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Formats a categorical raw value into its display label
pub type ValueFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Appends one item to a caller-managed list; returns whether it was added
pub type ListAppender = Arc<dyn Fn(&str, &Value) -> bool + Send + Sync>;

/// Schedules persistence of the form; receives the field id or list type
pub type PersistenceHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Called after a successful apply
pub type AppliedCallback = Arc<dyn Fn(&ApplyReceipt) + Send + Sync>;

/// Where and how a value is written
#[derive(Clone)]
pub enum ApplyTarget {
    Text {
        field_id: String,
        emit_change: bool,
    },
    /// Scores always notify so dependent ratings recompute
    Numeric {
        field_id: String,
    },
    /// Dates always notify so dependent schedules recompute
    Date {
        field_id: String,
    },
    Category {
        field_id: String,
        hidden_field_id: Option<String>,
        formatter: Option<ValueFormatter>,
    },
    List {
        list_type: String,
        appender: Option<ListAppender>,
    },
}

impl ApplyTarget {
    pub fn text(field_id: impl Into<String>) -> Self {
        ApplyTarget::Text {
            field_id: field_id.into(),
            emit_change: false,
        }
    }

    pub fn numeric(field_id: impl Into<String>) -> Self {
        ApplyTarget::Numeric {
            field_id: field_id.into(),
        }
    }

    pub fn date(field_id: impl Into<String>) -> Self {
        ApplyTarget::Date {
            field_id: field_id.into(),
        }
    }

    pub fn category(field_id: impl Into<String>, hidden_field_id: impl Into<String>) -> Self {
        ApplyTarget::Category {
            field_id: field_id.into(),
            hidden_field_id: Some(hidden_field_id.into()),
            formatter: None,
        }
    }

    pub fn list(list_type: impl Into<String>, appender: ListAppender) -> Self {
        ApplyTarget::List {
            list_type: list_type.into(),
            appender: Some(appender),
        }
    }

    /// Field id (or list type) the target writes to
    pub fn key(&self) -> &str {
        match self {
            ApplyTarget::Text { field_id, .. }
            | ApplyTarget::Numeric { field_id }
            | ApplyTarget::Date { field_id }
            | ApplyTarget::Category { field_id, .. } => field_id,
            ApplyTarget::List { list_type, .. } => list_type,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ApplyTarget::List { .. })
    }

    fn kind(&self) -> &'static str {
        match self {
            ApplyTarget::Text { .. } => "text",
            ApplyTarget::Numeric { .. } => "numeric",
            ApplyTarget::Date { .. } => "date",
            ApplyTarget::Category { .. } => "category",
            ApplyTarget::List { .. } => "list",
        }
    }
}

impl fmt::Debug for ApplyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyTarget")
            .field("kind", &self.kind())
            .field("key", &self.key())
            .finish()
    }
}

/// Optional side effects shared by every target kind
#[derive(Clone, Default)]
pub struct ApplyHooks {
    pub persistence: Option<PersistenceHook>,
    pub on_applied: Option<AppliedCallback>,
}

impl fmt::Debug for ApplyHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyHooks")
            .field("persistence", &self.persistence.is_some())
            .field("on_applied", &self.on_applied.is_some())
            .finish()
    }
}

/// The chosen value: one item, or several for list fields
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedValue {
    Single(Value),
    Many(Vec<Value>),
}

impl AppliedValue {
    pub fn items(&self) -> Vec<&Value> {
        match self {
            AppliedValue::Single(v) => vec![v],
            AppliedValue::Many(values) => values.iter().collect(),
        }
    }

    /// First value, for scalar targets
    pub fn first(&self) -> Option<&Value> {
        match self {
            AppliedValue::Single(v) => Some(v),
            AppliedValue::Many(values) => values.first(),
        }
    }
}

impl From<Value> for AppliedValue {
    fn from(value: Value) -> Self {
        AppliedValue::Single(value)
    }
}

impl From<&str> for AppliedValue {
    fn from(value: &str) -> Self {
        AppliedValue::Single(Value::String(value.to_string()))
    }
}

/// A request to write a value into the form
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub target: ApplyTarget,
    pub value: AppliedValue,
    pub hooks: ApplyHooks,
}

impl ApplyRequest {
    pub fn new(target: ApplyTarget, value: impl Into<AppliedValue>) -> Self {
        Self {
            target,
            value: value.into(),
            hooks: ApplyHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: ApplyHooks) -> Self {
        self.hooks = hooks;
        self
    }
}

/// What was written, passed to `on_applied`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReceipt {
    /// Field id, or list type for list targets
    pub key: String,
    pub values: Vec<String>,
}
