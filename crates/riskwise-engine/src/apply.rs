//! Writes a chosen suggestion into the form.
//!
//! Configuration mistakes (missing target field, missing option) are logged
//! and reported as `false`; nothing is partially written in that case.

use chrono::{DateTime, NaiveDate};
use riskwise_core::apply::{ApplyReceipt, ApplyRequest, ApplyTarget};
use riskwise_core::suggest::value_as_text;
use riskwise_core::{FormAccessor, Notifier, SuggestError, ToastLevel};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::scale;

pub struct FieldApplicator {
    notifier: Arc<dyn Notifier>,
}

impl FieldApplicator {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Apply the request; `true` when at least one value landed in the form
    pub fn apply(&self, form: &mut dyn FormAccessor, request: &ApplyRequest) -> bool {
        self.apply_with_receipt(form, request).is_some()
    }

    /// Like `apply`, returning what was written
    pub fn apply_with_receipt(
        &self,
        form: &mut dyn FormAccessor,
        request: &ApplyRequest,
    ) -> Option<ApplyReceipt> {
        match self.write(form, request) {
            Ok(values) => {
                let key = request.target.key().to_string();
                self.notifier.acknowledge(&key);
                if let Some(persist) = &request.hooks.persistence {
                    persist(&key);
                }
                let receipt = ApplyReceipt { key, values };
                if let Some(on_applied) = &request.hooks.on_applied {
                    on_applied(&receipt);
                }
                self.notifier
                    .toast(&success_message(&receipt), ToastLevel::Success);
                debug!(key = %receipt.key, count = receipt.values.len(), "applied suggestion");
                Some(receipt)
            }
            Err(err) => {
                warn!(target_key = %request.target.key(), error = %err, "suggestion not applied");
                None
            }
        }
    }

    fn write(
        &self,
        form: &mut dyn FormAccessor,
        request: &ApplyRequest,
    ) -> Result<Vec<String>, SuggestError> {
        match &request.target {
            ApplyTarget::Text {
                field_id,
                emit_change,
            } => {
                let text = first_text(request)?;
                set_field(form, field_id, &text)?;
                if *emit_change {
                    form.emit_change(field_id);
                }
                Ok(vec![text])
            }
            ApplyTarget::Numeric { field_id } => {
                let text = first_text(request)?;
                let text = scale::parse_score(&text)
                    .map(|n| n.to_string())
                    .unwrap_or(text);
                set_field(form, field_id, &text)?;
                form.emit_change(field_id);
                Ok(vec![text])
            }
            ApplyTarget::Date { field_id } => {
                let text = normalize_date(&first_text(request)?);
                set_field(form, field_id, &text)?;
                form.emit_change(field_id);
                Ok(vec![text])
            }
            ApplyTarget::Category {
                field_id,
                hidden_field_id,
                formatter,
            } => {
                let hidden = hidden_field_id.as_deref().ok_or_else(|| {
                    SuggestError::ApplyConfiguration(format!(
                        "category target '{}' has no hidden id field",
                        field_id
                    ))
                })?;
                let raw = first_text(request)?;
                let display = match formatter {
                    Some(render) => render(&raw),
                    None => format_category(&raw),
                };
                if !form.has_field(field_id) {
                    return Err(missing_field(field_id));
                }
                if !form.has_field(hidden) {
                    return Err(missing_field(hidden));
                }
                set_field(form, field_id, &display)?;
                set_field(form, hidden, &raw)?;
                Ok(vec![display])
            }
            ApplyTarget::List {
                list_type,
                appender,
            } => {
                let append = appender.as_ref().ok_or_else(|| {
                    SuggestError::ApplyConfiguration(format!(
                        "list target '{}' has no appender",
                        list_type
                    ))
                })?;
                let added: Vec<String> = request
                    .value
                    .items()
                    .into_iter()
                    .filter(|value| append(list_type, *value))
                    .filter_map(value_as_text)
                    .collect();
                if added.is_empty() {
                    return Err(SuggestError::ApplyConfiguration(format!(
                        "nothing was appended to '{}'",
                        list_type
                    )));
                }
                Ok(added)
            }
        }
    }
}

fn first_text(request: &ApplyRequest) -> Result<String, SuggestError> {
    request
        .value
        .first()
        .and_then(value_as_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SuggestError::ApplyConfiguration("no value to apply".to_string()))
}

fn missing_field(field_id: &str) -> SuggestError {
    SuggestError::ApplyConfiguration(format!("form has no field '{}'", field_id))
}

fn set_field(form: &mut dyn FormAccessor, field_id: &str, value: &str) -> Result<(), SuggestError> {
    if form.set_value(field_id, value) {
        Ok(())
    } else {
        Err(missing_field(field_id))
    }
}

fn success_message(receipt: &ApplyReceipt) -> String {
    match receipt.values.len() {
        1 => "Suggestion applied".to_string(),
        n => format!("{} suggestions applied", n),
    }
}

/// ISO dates pass through; timestamps are cut to their date
fn normalize_date(text: &str) -> String {
    if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok() {
        return text.to_string();
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return ts.date_naive().format("%Y-%m-%d").to_string();
    }
    for format in ["%d/%m/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    text.to_string()
}

/// "third-party" -> "Third-Party", "data_privacy" -> "Data Privacy"
pub fn format_category(raw: &str) -> String {
    raw.replace('_', " ")
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(|word| {
            word.split('-')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
