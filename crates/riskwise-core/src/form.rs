//! In-memory form document
//!
//! Serializable stand-in for a live form: scalar fields, list fields and
//! in-form relationship selections keyed by field id. The CLI loads one from
//! JSON, and tests use it as the pipeline's `FormAccessor`.

use crate::protocol::{FormAccessor, FormSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryForm {
    pub form_id: String,
    #[serde(default)]
    pub revision: u64,
    /// Scalar fields; a field exists when its id is present, even if empty
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub lists: BTreeMap<String, Vec<String>>,
    /// In-form relationship selections (unsaved), keyed by relation name
    #[serde(default)]
    pub links: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    changes: Vec<String>,
}

impl MemoryForm {
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, field_id: &str, value: &str) -> Self {
        self.fields.insert(field_id.to_string(), value.to_string());
        self
    }

    pub fn with_list(mut self, field_id: &str, items: &[&str]) -> Self {
        self.lists.insert(
            field_id.to_string(),
            items.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_links(mut self, relation: &str, ids: &[&str]) -> Self {
        self.links.insert(
            relation.to_string(),
            ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Record a user edit made outside the pipeline
    pub fn edit(&mut self, field_id: &str, value: &str) {
        self.fields.insert(field_id.to_string(), value.to_string());
        self.revision += 1;
    }

    /// Append to a list field, creating it when needed
    pub fn push_list_item(&mut self, field_id: &str, item: &str) -> bool {
        let list = self.lists.entry(field_id.to_string()).or_default();
        if list.iter().any(|existing| existing == item) {
            return false;
        }
        list.push(item.to_string());
        self.revision += 1;
        true
    }

    /// Change notifications emitted so far, oldest first
    pub fn changes(&self) -> &[String] {
        &self.changes
    }
}

impl FormAccessor for MemoryForm {
    fn value(&self, field_id: &str) -> Option<String> {
        self.fields.get(field_id).cloned()
    }

    fn list(&self, field_id: &str) -> Option<Vec<String>> {
        self.lists.get(field_id).cloned()
    }

    fn has_field(&self, field_id: &str) -> bool {
        self.fields.contains_key(field_id)
    }

    fn set_value(&mut self, field_id: &str, value: &str) -> bool {
        match self.fields.get_mut(field_id) {
            Some(slot) => {
                if slot != value {
                    *slot = value.to_string();
                    self.revision += 1;
                }
                true
            }
            None => false,
        }
    }

    fn selected_links(&self, relation: &str) -> Option<Vec<String>> {
        self.links.get(relation).cloned()
    }

    fn emit_change(&mut self, field_id: &str) {
        self.changes.push(field_id.to_string());
    }

    fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            form_id: self.form_id.clone(),
            revision: self.revision,
        }
    }
}
