//! Template and heuristic suggestions used when the AI path yields nothing.
//!
//! Fallback never fails: it returns an empty batch when it has nothing to
//! offer for a field.

use chrono::{Duration, Local, NaiveDate};
use riskwise_core::context::{context_key, keys, FormContext};
use riskwise_core::suggest::{SuggestionBatch, SuggestionItem, SuggestionSource};
use riskwise_core::templates::{CategoryTemplate, ControlTemplate, RiskTemplate};
use riskwise_core::{EntityType, FieldType, TemplateLookup};
use serde_json::Value;
use std::sync::Arc;

use crate::scale;

pub const DEFAULT_INDUSTRY: &str = "general";

const REVIEW_INTERVALS: [(i64, &str); 3] = [
    (90, "Quarterly review"),
    (180, "Semi-annual review"),
    (365, "Annual review"),
];

const TARGET_INTERVALS: [(i64, &str); 3] = [
    (30, "Within 30 days"),
    (60, "Within 60 days"),
    (90, "Within 90 days"),
];

const STATUSES: [&str; 3] = ["Open", "In Treatment", "Monitoring"];
const CONTROL_TYPES: [(&str, &str, &str); 3] = [
    ("preventive", "Preventive", "Stops the risk event from happening"),
    ("detective", "Detective", "Identifies the event when it happens"),
    ("corrective", "Corrective", "Limits damage and restores normal operation"),
];
const FREQUENCIES: [&str; 3] = ["Monthly", "Quarterly", "Annually"];
const EFFECTIVENESS: [&str; 3] = ["Effective", "Partially Effective", "Not Tested"];

/// Caller-supplied suggestions tried before templates
pub type FallbackProvider =
    Arc<dyn Fn(FieldType, &FormContext) -> Vec<SuggestionItem> + Send + Sync>;

pub struct FallbackResolver {
    templates: Arc<dyn TemplateLookup>,
    today: Option<NaiveDate>,
}

impl FallbackResolver {
    pub fn new(templates: Arc<dyn TemplateLookup>) -> Self {
        Self {
            templates,
            today: None,
        }
    }

    /// Pin "today" for date suggestions
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Provider first, then templates and heuristics
    pub fn resolve_with(
        &self,
        provider: Option<&FallbackProvider>,
        field: FieldType,
        ctx: &FormContext,
    ) -> SuggestionBatch {
        if let Some(provider) = provider {
            let items = provider(field, ctx);
            if !items.is_empty() {
                return SuggestionBatch::new(items, None, SuggestionSource::Fallback);
            }
        }
        self.resolve(field, ctx)
    }

    pub fn resolve(&self, field: FieldType, ctx: &FormContext) -> SuggestionBatch {
        let industry = ctx.text(keys::INDUSTRY).unwrap_or(DEFAULT_INDUSTRY);
        let (items, recommended) = match field {
            FieldType::Title => (self.risk_titles(industry, ctx), None),
            FieldType::Description => (self.risk_descriptions(industry, ctx), None),
            FieldType::RootCauses => (
                self.risk_lists(industry, ctx, root_causes, keys::ROOT_CAUSES),
                None,
            ),
            FieldType::Consequences => (
                self.risk_lists(industry, ctx, consequences, keys::CONSEQUENCES),
                None,
            ),
            FieldType::Category => self.categories(industry, ctx),
            FieldType::Owner | FieldType::ControlOwner => (self.owners(industry, ctx), None),
            FieldType::Treatment => (treatments(ctx), None),
            FieldType::Status => (STATUSES.iter().map(|s| SuggestionItem::text(*s)).collect(), None),
            FieldType::InherentLikelihood | FieldType::InherentImpact => {
                (self.inherent_scores(industry, field, ctx), None)
            }
            FieldType::ResidualLikelihood | FieldType::ResidualImpact => residual_scores(field, ctx),
            FieldType::ReviewDate => (dates(self.today(), &REVIEW_INTERVALS), None),
            FieldType::TargetDate => (dates(self.today(), &TARGET_INTERVALS), None),
            FieldType::LinkedControls => (self.linked_controls(industry, ctx), None),
            FieldType::ControlTitle => (self.control_titles(industry, ctx), None),
            FieldType::ControlDescription => (self.control_descriptions(industry, ctx), None),
            FieldType::ControlType => (
                CONTROL_TYPES
                    .iter()
                    .map(|(id, label, desc)| {
                        SuggestionItem::new(*label, Value::from(*id)).with_description(*desc)
                    })
                    .collect(),
                None,
            ),
            FieldType::Frequency => (
                FREQUENCIES.iter().map(|s| SuggestionItem::text(*s)).collect(),
                Some(1),
            ),
            FieldType::Effectiveness => (
                EFFECTIVENESS.iter().map(|s| SuggestionItem::text(*s)).collect(),
                None,
            ),
            FieldType::Evidence => (self.evidence(industry, ctx), None),
        };
        SuggestionBatch::new(items, recommended, SuggestionSource::Fallback)
    }

    /// Category id for the record, matched on template id or label
    fn category_id(&self, industry: &str, ctx: &FormContext) -> Option<String> {
        let wanted = ctx
            .text(keys::CATEGORY)
            .map(str::to_string)
            .or_else(|| {
                ctx.linked()
                    .iter()
                    .find_map(|s| s.kind.clone())
                    .filter(|_| ctx.entity() == EntityType::Control)
            })?;
        let categories = self.templates.categories(industry);
        categories
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(&wanted) || c.label.eq_ignore_ascii_case(&wanted))
            .map(|c| c.id.clone())
            .or(Some(wanted))
    }

    fn matching_risks(&self, industry: &str, ctx: &FormContext) -> Vec<RiskTemplate> {
        let category = self.category_id(industry, ctx);
        let mut risks = self.templates.risks(industry, category.as_deref());
        if risks.is_empty() && category.is_some() {
            risks = self.templates.risks(industry, None);
        }
        if let Some(title) = ctx.subject() {
            let title = title.to_lowercase();
            risks.sort_by_key(|r| !similar(&r.title.to_lowercase(), &title));
        }
        risks
    }

    fn matching_controls(&self, industry: &str, ctx: &FormContext) -> Vec<ControlTemplate> {
        let category = self.category_id(industry, ctx);
        let mut controls = self.templates.controls(industry, category.as_deref());
        if controls.is_empty() && category.is_some() {
            controls = self.templates.controls(industry, None);
        }
        if ctx.entity() == EntityType::Control {
            if let Some(title) = ctx.subject() {
                let title = title.to_lowercase();
                controls.sort_by_key(|c| !similar(&c.title.to_lowercase(), &title));
            }
        }
        controls
    }

    fn risk_titles(&self, industry: &str, ctx: &FormContext) -> Vec<SuggestionItem> {
        let current = ctx.subject().map(str::to_lowercase);
        self.matching_risks(industry, ctx)
            .into_iter()
            .filter(|r| current.as_deref() != Some(r.title.to_lowercase().as_str()))
            .map(|r| {
                SuggestionItem::text(r.title).with_description(r.description.unwrap_or_default())
            })
            .collect()
    }

    fn risk_descriptions(&self, industry: &str, ctx: &FormContext) -> Vec<SuggestionItem> {
        let mut items: Vec<SuggestionItem> = self
            .matching_risks(industry, ctx)
            .into_iter()
            .filter_map(|r| r.description)
            .map(SuggestionItem::text)
            .collect();
        if items.is_empty() {
            if let Some(title) = ctx.subject() {
                items.push(SuggestionItem::text(format!(
                    "Risk that {} occurs, disrupting operations and leading to financial loss or reputational damage.",
                    title.to_lowercase()
                )));
            }
        }
        items
    }

    fn risk_lists(
        &self,
        industry: &str,
        ctx: &FormContext,
        pick: fn(&RiskTemplate) -> &[String],
        existing_key: &str,
    ) -> Vec<SuggestionItem> {
        let existing: Vec<String> = ctx.list(existing_key).iter().map(|s| s.to_lowercase()).collect();
        let mut seen: Vec<String> = Vec::new();
        for risk in self.matching_risks(industry, ctx) {
            for value in pick(&risk) {
                let lower = value.to_lowercase();
                if existing.contains(&lower) || seen.iter().any(|s| s.to_lowercase() == lower) {
                    continue;
                }
                seen.push(value.clone());
            }
        }
        seen.into_iter().map(SuggestionItem::text).collect()
    }

    fn categories(&self, industry: &str, ctx: &FormContext) -> (Vec<SuggestionItem>, Option<i64>) {
        let categories = self.templates.categories(industry);
        let preferred = ctx.subject().and_then(|title| {
            let title = title.to_lowercase();
            self.templates
                .risks(industry, None)
                .into_iter()
                .find(|r| similar(&r.title.to_lowercase(), &title))
                .map(|r| r.category)
        });
        let recommended = preferred
            .and_then(|id| categories.iter().position(|c| c.id == id))
            .map(|i| i as i64);
        // Keep the recommended category inside the capped batch
        let mut ordered: Vec<&CategoryTemplate> = categories.iter().collect();
        let recommended = match recommended {
            Some(i) if i as usize >= riskwise_core::suggest::MAX_SUGGESTIONS => {
                let chosen = ordered.remove(i as usize);
                ordered.insert(0, chosen);
                Some(0)
            }
            other => other,
        };
        let items = ordered
            .into_iter()
            .map(|c| {
                SuggestionItem::new(c.label.clone(), Value::from(c.id.clone()))
                    .with_description(c.description.clone().unwrap_or_default())
            })
            .collect();
        (items, recommended)
    }

    fn owners(&self, industry: &str, ctx: &FormContext) -> Vec<SuggestionItem> {
        let current = ctx.text(keys::OWNER).map(str::to_lowercase);
        self.templates
            .owner_roles(industry)
            .into_iter()
            .filter(|role| current.as_deref() != Some(role.to_lowercase().as_str()))
            .map(SuggestionItem::text)
            .collect()
    }

    fn inherent_scores(
        &self,
        industry: &str,
        field: FieldType,
        ctx: &FormContext,
    ) -> Vec<SuggestionItem> {
        let category = self.category_id(industry, ctx);
        let typical = category.and_then(|id| {
            self.templates
                .categories(industry)
                .into_iter()
                .find(|c| c.id == id)
                .and_then(|c| match field {
                    FieldType::InherentLikelihood => c.typical_likelihood,
                    _ => c.typical_impact,
                })
        });
        match typical {
            Some(typical) => {
                let typical = scale::clamp_score(i64::from(typical));
                let mut values = vec![typical];
                for v in [typical + 1, typical - 1] {
                    let v = scale::clamp_score(v);
                    if !values.contains(&v) {
                        values.push(v);
                    }
                }
                values
                    .into_iter()
                    .map(|v| score_item(field, v, if v == typical { Some("Typical for this category") } else { None }))
                    .collect()
            }
            None => vec![score_item(field, 3, Some("Midpoint of the scale"))],
        }
    }

    fn linked_controls(&self, industry: &str, ctx: &FormContext) -> Vec<SuggestionItem> {
        let linked: Vec<String> = ctx.linked().iter().map(|s| s.name.to_lowercase()).collect();
        self.matching_controls(industry, ctx)
            .into_iter()
            .filter(|c| !linked.contains(&c.title.to_lowercase()))
            .map(|c| {
                let kind = capitalize(&c.control_type);
                SuggestionItem::text(c.title).with_description(format!("{} control", kind))
            })
            .collect()
    }

    fn control_titles(&self, industry: &str, ctx: &FormContext) -> Vec<SuggestionItem> {
        let current = ctx.subject().map(str::to_lowercase);
        self.matching_controls(industry, ctx)
            .into_iter()
            .filter(|c| current.as_deref() != Some(c.title.to_lowercase().as_str()))
            .map(|c| {
                SuggestionItem::text(c.title).with_description(c.description.unwrap_or_default())
            })
            .collect()
    }

    fn control_descriptions(&self, industry: &str, ctx: &FormContext) -> Vec<SuggestionItem> {
        self.matching_controls(industry, ctx)
            .into_iter()
            .filter_map(|c| c.description)
            .map(SuggestionItem::text)
            .collect()
    }

    fn evidence(&self, industry: &str, ctx: &FormContext) -> Vec<SuggestionItem> {
        let existing: Vec<String> = ctx.list(keys::EVIDENCE).iter().map(|s| s.to_lowercase()).collect();
        let mut seen: Vec<String> = Vec::new();
        for control in self.matching_controls(industry, ctx) {
            for item in control.evidence {
                let lower = item.to_lowercase();
                if existing.contains(&lower) || seen.iter().any(|s| s.to_lowercase() == lower) {
                    continue;
                }
                seen.push(item);
            }
        }
        seen.into_iter().map(SuggestionItem::text).collect()
    }
}

fn root_causes(risk: &RiskTemplate) -> &[String] {
    &risk.root_causes
}

fn consequences(risk: &RiskTemplate) -> &[String] {
    &risk.consequences
}

fn score_item(field: FieldType, score: i64, reason: Option<&str>) -> SuggestionItem {
    SuggestionItem::new(scale::score_display(field, score), Value::from(score))
        .with_description(reason.unwrap_or_default())
}

/// Residual: inherent when no controls are linked, otherwise step down from it
fn residual_scores(field: FieldType, ctx: &FormContext) -> (Vec<SuggestionItem>, Option<i64>) {
    let Some(inherent) = field
        .inherent_counterpart()
        .and_then(|f| ctx.number(context_key(f)))
        .map(scale::clamp_score)
    else {
        return (Vec::new(), None);
    };

    if !ctx.has_links() {
        return (
            vec![score_item(field, inherent, Some("No controls linked yet"))],
            None,
        );
    }

    let mut values = vec![inherent];
    for v in [inherent - 1, inherent - 2] {
        let v = scale::clamp_score(v);
        if !values.contains(&v) {
            values.push(v);
        }
    }
    let recommended = if values.len() > 1 { Some(1) } else { None };
    let items = values
        .into_iter()
        .map(|v| {
            let reason = match inherent - v {
                0 => "Controls not yet proven effective",
                1 => "Controls reduce the rating by one step",
                _ => "Controls are strong and well tested",
            };
            score_item(field, v, Some(reason))
        })
        .collect();
    (items, recommended)
}

fn treatments(ctx: &FormContext) -> Vec<SuggestionItem> {
    let rating = match (
        ctx.number(keys::INHERENT_LIKELIHOOD),
        ctx.number(keys::INHERENT_IMPACT),
    ) {
        (Some(l), Some(i)) => Some(l * i),
        _ => None,
    };
    let order: [(&str, &str); 3] = match rating {
        Some(r) if r >= 15 => [
            ("Mitigate", "Reduce likelihood or impact with additional controls"),
            ("Transfer", "Shift the financial impact through insurance or contracts"),
            ("Avoid", "Stop the activity that gives rise to the risk"),
        ],
        Some(r) if r <= 6 => [
            ("Accept", "Rating is within appetite; monitor"),
            ("Mitigate", "Reduce likelihood or impact with additional controls"),
            ("Transfer", "Shift the financial impact through insurance or contracts"),
        ],
        _ => [
            ("Mitigate", "Reduce likelihood or impact with additional controls"),
            ("Transfer", "Shift the financial impact through insurance or contracts"),
            ("Accept", "Rating is within appetite; monitor"),
        ],
    };
    order
        .iter()
        .map(|(name, desc)| SuggestionItem::text(*name).with_description(*desc))
        .collect()
}

fn dates(today: NaiveDate, intervals: &[(i64, &str)]) -> Vec<SuggestionItem> {
    intervals
        .iter()
        .map(|(days, label)| {
            let date = (today + Duration::days(*days)).format("%Y-%m-%d").to_string();
            SuggestionItem::new(format!("{} ({})", date, label), Value::from(date))
        })
        .collect()
}

/// Loose title match: one contains the other
fn similar(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
