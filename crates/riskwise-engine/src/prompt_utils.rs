use riskwise_core::context::{keys, ContextValue, FormContext, RelatedSummary};
use riskwise_core::suggest::MAX_SUGGESTIONS;
use riskwise_core::EntityType;

const MAX_FACT_CHARS: usize = 600;

/// Facts rendered outside the context block
const HIDDEN_KEYS: &[&str] = &[keys::INDUSTRY, keys::REGISTER_TYPE, keys::LINK_COUNT];

fn fact_label(key: &str) -> &str {
    match key {
        keys::TITLE => "Title",
        keys::DESCRIPTION => "Description",
        keys::CATEGORY => "Category",
        keys::ROOT_CAUSES => "Root causes",
        keys::CONSEQUENCES => "Consequences",
        keys::OWNER => "Owner",
        keys::STATUS => "Status",
        keys::TREATMENT => "Treatment",
        keys::INHERENT_LIKELIHOOD => "Inherent likelihood (1-5)",
        keys::INHERENT_IMPACT => "Inherent impact (1-5)",
        keys::RESIDUAL_LIKELIHOOD => "Residual likelihood (1-5)",
        keys::RESIDUAL_IMPACT => "Residual impact (1-5)",
        keys::REVIEW_DATE => "Next review date",
        keys::TARGET_DATE => "Target date",
        keys::CONTROL_TYPE => "Control type",
        keys::EFFECTIVENESS => "Effectiveness",
        keys::FREQUENCY => "Testing frequency",
        keys::EVIDENCE => "Evidence",
        other => other,
    }
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_FACT_CHARS {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(MAX_FACT_CHARS).collect();
        format!("{}...", prefix)
    }
}

/// Known facts about the record, one per line
pub(crate) fn format_context(ctx: &FormContext) -> String {
    let mut lines = Vec::new();
    for (key, value) in ctx.iter() {
        if HIDDEN_KEYS.contains(&key) {
            continue;
        }
        match value {
            ContextValue::Text(s) => lines.push(format!("- {}: {}", fact_label(key), clip(s))),
            ContextValue::Number(n) => lines.push(format!("- {}: {}", fact_label(key), n)),
            ContextValue::List(items) => {
                lines.push(format!("- {}: {}", fact_label(key), clip(&items.join("; "))))
            }
            ContextValue::Related(_) => {}
        }
    }
    let mut out = String::from("CURRENT RECORD:\n");
    if lines.is_empty() {
        out.push_str("- (nothing filled in yet)");
    } else {
        out.push_str(&lines.join("\n"));
    }
    out.push_str(&format_linked(ctx));
    out
}

fn describe_related(summary: &RelatedSummary, entity: EntityType) -> String {
    let mut tags = Vec::new();
    if let Some(kind) = &summary.kind {
        tags.push(kind.clone());
    }
    if let Some(status) = &summary.status {
        tags.push(status.clone());
    }
    if entity == EntityType::Control {
        if let (Some(l), Some(i), Some(score)) =
            (summary.likelihood, summary.impact, summary.risk_score())
        {
            tags.push(format!("likelihood {} x impact {} = {}", l, i, score));
        }
    }
    if tags.is_empty() {
        format!("- {}", summary.name)
    } else {
        format!("- {} [{}]", summary.name, tags.join(", "))
    }
}

/// Linked controls (for a risk) or linked risks (for a control)
pub(crate) fn format_linked(ctx: &FormContext) -> String {
    let (heading, counterpart) = match ctx.entity() {
        EntityType::Risk => ("LINKED CONTROLS", EntityType::Control),
        EntityType::Control => ("LINKED RISKS", EntityType::Risk),
    };
    let linked = ctx.linked();
    if linked.is_empty() {
        return match ctx.number(keys::LINK_COUNT).filter(|n| *n > 0) {
            Some(n) => format!("\n\n{} ({}): details unavailable", heading, n),
            None => format!("\n\n{}: none", heading),
        };
    }
    let lines: Vec<String> = linked
        .iter()
        .map(|s| describe_related(s, counterpart))
        .collect();
    format!("\n\n{} ({}):\n{}", heading, linked.len(), lines.join("\n"))
}

/// Items already on the record that suggestions must not repeat
pub(crate) fn format_existing(items: &[String], heading: &str) -> String {
    if items.is_empty() {
        return String::new();
    }
    format!(
        "\n\nALREADY LISTED {} (do not repeat these):\n{}",
        heading,
        items
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// Grounding instruction naming the record
pub(crate) fn grounding(ctx: &FormContext, noun: &str) -> String {
    match ctx.subject() {
        Some(title) => format!(
            "Every suggestion must be specific to the {} \"{}\". Avoid generic answers that would fit any record.",
            noun, title
        ),
        None => format!(
            "The {} has no title yet; base suggestions on the other facts above.",
            noun
        ),
    }
}

/// Required output format with a field-specific item example
pub(crate) fn output_format(item_example: &str) -> String {
    format!(
        r#"OUTPUT (JSON object only, no markdown fences, no commentary):
{{"suggestions": [{}], "recommended": 0}}

RULES:
- At most {} suggestions, best first.
- "recommended" is the 0-based index of the suggestion you would pick.
- Keep each "reason" to one short sentence."#,
        item_example, MAX_SUGGESTIONS
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskwise_core::context::FormContext;

    #[test]
    fn test_context_skips_profile_facts() {
        let ctx = FormContext::builder(EntityType::Risk)
            .text(keys::TITLE, "Data Breach")
            .number(keys::INHERENT_IMPACT, 5)
            .text(keys::INDUSTRY, "technology")
            .build();
        let text = format_context(&ctx);
        assert!(text.contains("- Title: Data Breach"));
        assert!(text.contains("- Inherent impact (1-5): 5"));
        assert!(!text.contains("technology"));
        assert!(text.contains("LINKED CONTROLS: none"));
    }

    #[test]
    fn test_unresolved_links_are_counted_not_listed() {
        let ctx = FormContext::builder(EntityType::Risk)
            .related(keys::LINKED_CONTROLS, Vec::new())
            .number(keys::LINK_COUNT, 2)
            .build();
        let text = format_context(&ctx);
        assert!(text.contains("LINKED CONTROLS (2): details unavailable"));
        assert!(!text.contains("linkCount"));
    }

    #[test]
    fn test_linked_risks_show_scores() {
        let ctx = FormContext::builder(EntityType::Control)
            .related(
                keys::LINKED_RISKS,
                vec![RelatedSummary {
                    id: "r1".into(),
                    name: "Outage".into(),
                    kind: Some("Operational".into()),
                    status: None,
                    likelihood: Some(3),
                    impact: Some(4),
                }],
            )
            .build();
        let text = format_linked(&ctx);
        assert!(text.contains("LINKED RISKS (1)"));
        assert!(text.contains("- Outage [Operational, likelihood 3 x impact 4 = 12]"));
    }

    #[test]
    fn test_existing_items_empty_renders_nothing() {
        assert_eq!(format_existing(&[], "ROOT CAUSES"), "");
        assert!(format_existing(&["Phishing".into()], "ROOT CAUSES").contains("- Phishing"));
    }

    #[test]
    fn test_long_facts_are_clipped() {
        let long = "x".repeat(MAX_FACT_CHARS + 50);
        let ctx = FormContext::builder(EntityType::Risk)
            .text(keys::DESCRIPTION, long)
            .build();
        assert!(format_context(&ctx).contains("..."));
    }
}
