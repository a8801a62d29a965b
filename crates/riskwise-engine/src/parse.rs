//! Tolerant parsing of model responses into suggestion batches.
//!
//! Models wrap JSON in markdown fences, add prose before and after it, leave
//! trailing commas and use smart quotes. Parsing strips all of that before
//! handing the first top-level object to serde_json.

use riskwise_core::suggest::{SuggestionBatch, SuggestionItem, SuggestionSource};
use riskwise_core::ParseError;
use serde_json::{Map, Value};

/// Keys that may carry the value written to the form, in priority order
const VALUE_KEYS: &[&str] = &[
    "value",
    "text",
    "score",
    "date",
    "category",
    "type",
    "frequency",
    "role",
    "name",
    "title",
];

/// Keys that may carry the explanation shown next to a suggestion
const DESCRIPTION_KEYS: &[&str] = &[
    "reason",
    "description",
    "rationale",
    "justification",
    "explanation",
];

/// Strip markdown code fences from a response
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if trimmed.starts_with("```json") {
        trimmed.strip_prefix("```json").unwrap_or(trimmed)
    } else if trimmed.starts_with("```") {
        trimmed.strip_prefix("```").unwrap_or(trimmed)
    } else {
        trimmed
    };
    let clean = if clean.ends_with("```") {
        clean.strip_suffix("```").unwrap_or(clean)
    } else {
        clean
    };
    clean.trim()
}

/// Extract the first balanced `{...}` fragment, ignoring braces inside strings
fn extract_json_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    let mut start_idx = None;

    for (i, c) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            escape_next = true;
            continue;
        }

        if c == '"' && start_idx.is_some() {
            in_string = !in_string;
            continue;
        }

        if in_string {
            continue;
        }

        if c == '{' {
            if depth == 0 {
                start_idx = Some(i);
            }
            depth += 1;
        } else if c == '}' && depth > 0 {
            depth -= 1;
            if depth == 0 {
                if let Some(start) = start_idx {
                    return Some(&text[start..=i]);
                }
            }
        }
    }

    None
}

/// Drop commas directly before `]` or `}`, leaving string contents alone
fn strip_trailing_commas(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in json.char_indices() {
        if escape_next {
            escape_next = false;
        } else if c == '\\' && in_string {
            escape_next = true;
        } else if c == '"' {
            in_string = !in_string;
        } else if c == ',' && !in_string {
            let rest = json[i + 1..].trim_start();
            if rest.starts_with(']') || rest.starts_with('}') {
                continue;
            }
        }
        out.push(c);
    }

    out
}

/// Fix common JSON issues in model output
fn fix_json_issues(json: &str) -> String {
    // Smart quotes
    let fixed = json
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    strip_trailing_commas(&fixed)
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Parse a model response into a remote suggestion batch.
///
/// Items that carry no usable value are skipped; a response whose
/// suggestions all get skipped is `ParseError::Empty`.
pub fn parse_suggestions(response: &str) -> Result<SuggestionBatch, ParseError> {
    let clean = strip_markdown_fences(response);
    let json_str = extract_json_object(clean).ok_or(ParseError::NoJson)?;

    let parsed: Value = match serde_json::from_str(json_str) {
        Ok(value) => value,
        Err(_) => serde_json::from_str(&fix_json_issues(json_str))
            .map_err(|e| ParseError::Malformed(e.to_string()))?,
    };

    let raw_items = parsed
        .get("suggestions")
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingSuggestions)?;

    let mut items = Vec::new();
    let mut flagged = None;
    for raw in raw_items {
        let Some(item) = normalize_item(raw) else {
            continue;
        };
        if items.iter().any(|existing: &SuggestionItem| existing.raw_value == item.raw_value) {
            continue;
        }
        if flagged.is_none() && raw.get("recommended").and_then(Value::as_bool) == Some(true) {
            flagged = Some(items.len() as i64);
        }
        items.push(item);
    }

    if items.is_empty() {
        return Err(ParseError::Empty);
    }

    let recommended = parsed
        .get("recommended")
        .and_then(recommended_index)
        .or(flagged);

    Ok(SuggestionBatch::new(items, recommended, SuggestionSource::Remote))
}

/// Accepts 1, 1.0 and "1"; anything else is ignored
fn recommended_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Turn one raw suggestion (string, number or object) into an item
fn normalize_item(raw: &Value) -> Option<SuggestionItem> {
    match raw {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| SuggestionItem::text(s))
        }
        Value::Number(_) => {
            let text = raw.to_string();
            Some(SuggestionItem::new(text, raw.clone()))
        }
        Value::Object(obj) => normalize_object(obj),
        _ => None,
    }
}

fn normalize_object(obj: &Map<String, Value>) -> Option<SuggestionItem> {
    let raw_value = VALUE_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| is_usable_scalar(v))?
        .clone();
    let raw_value = match raw_value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other,
    };

    let display_text = obj
        .get("label")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| match &raw_value {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })?;

    let description = DESCRIPTION_KEYS
        .iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default();

    Some(SuggestionItem::new(display_text, raw_value).with_description(description))
}

fn is_usable_scalar(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(_) => true,
        _ => false,
    }
}
