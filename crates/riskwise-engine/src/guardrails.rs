//! Post-processing that keeps score suggestions consistent with the record.
//!
//! Residual ratings can never exceed the inherent rating, and equal it when
//! no controls are linked. Every score is held to the 1-5 scale.

use riskwise_core::context::{context_key, FormContext};
use riskwise_core::suggest::{SuggestionBatch, SuggestionItem};
use riskwise_core::FieldType;
use serde_json::Value;
use tracing::debug;

use crate::scale;

/// Clamp score suggestions for `field`; other fields pass through untouched
pub fn enforce_score_bounds(
    field: FieldType,
    ctx: &FormContext,
    batch: SuggestionBatch,
) -> SuggestionBatch {
    if !field.is_score() {
        return batch;
    }

    let ceiling = if field.is_residual() {
        field
            .inherent_counterpart()
            .and_then(|f| ctx.number(context_key(f)))
            .map(scale::clamp_score)
    } else {
        None
    };
    let pinned = ceiling.filter(|_| !ctx.has_links());

    let source = batch.source();
    let recommended_index = batch.recommended_index();
    let mut recommended_value = None;
    let mut items: Vec<SuggestionItem> = Vec::new();

    for (i, item) in batch.into_items().into_iter().enumerate() {
        let Some(original) = item.score_value().or_else(|| {
            item.raw_value
                .as_str()
                .and_then(scale::parse_score)
        }) else {
            debug!(field = %field, value = %item.raw_value, "dropping non-numeric score");
            continue;
        };

        let mut score = scale::clamp_score(original);
        if let Some(max) = ceiling {
            score = score.min(max);
        }
        if let Some(fixed) = pinned {
            score = fixed;
        }

        if i == recommended_index {
            recommended_value = Some(score);
        }
        if items.iter().any(|existing| existing.score_value() == Some(score)) {
            continue;
        }
        items.push(rescore(item, field, original, score));
    }

    let recommended = recommended_value
        .and_then(|value| items.iter().position(|item| item.score_value() == Some(value)))
        .map(|i| i as i64);
    SuggestionBatch::new(items, recommended, source)
}

fn rescore(mut item: SuggestionItem, field: FieldType, original: i64, score: i64) -> SuggestionItem {
    let was_numeric = matches!(item.raw_value, Value::Number(_));
    if original != score || !was_numeric {
        item.raw_value = Value::from(score);
    }
    if original != score || item.display_text.trim().parse::<i64>().is_ok() {
        item.display_text = scale::score_display(field, score);
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskwise_core::context::{keys, RelatedSummary};
    use riskwise_core::suggest::SuggestionSource;
    use riskwise_core::EntityType;

    fn scores(values: &[u8], recommended: i64) -> SuggestionBatch {
        SuggestionBatch::new(
            values
                .iter()
                .map(|v| SuggestionItem::score(*v, v.to_string()))
                .collect(),
            Some(recommended),
            SuggestionSource::Remote,
        )
    }

    fn control() -> RelatedSummary {
        RelatedSummary {
            id: "c1".into(),
            name: "Firewall".into(),
            kind: None,
            status: None,
            likelihood: None,
            impact: None,
        }
    }

    fn values(batch: &SuggestionBatch) -> Vec<i64> {
        batch.items().iter().filter_map(|i| i.score_value()).collect()
    }

    #[test]
    fn test_residual_clamped_to_inherent() {
        let ctx = FormContext::builder(EntityType::Risk)
            .number(keys::INHERENT_LIKELIHOOD, 3)
            .related(keys::LINKED_CONTROLS, vec![control()])
            .build();
        let batch = enforce_score_bounds(FieldType::ResidualLikelihood, &ctx, scores(&[5, 2, 1], 0));
        assert_eq!(values(&batch), vec![3, 2, 1]);
        assert_eq!(batch.recommended_index(), 0);
        assert_eq!(batch.items()[0].display_text, "3 - Possible");
    }

    #[test]
    fn test_residual_equals_inherent_without_controls() {
        let ctx = FormContext::builder(EntityType::Risk)
            .number(keys::INHERENT_IMPACT, 4)
            .related(keys::LINKED_CONTROLS, Vec::new())
            .build();
        let batch = enforce_score_bounds(FieldType::ResidualImpact, &ctx, scores(&[2, 3, 4], 1));
        assert_eq!(values(&batch), vec![4]);
        assert_eq!(batch.recommended_index(), 0);
    }

    #[test]
    fn test_unresolved_links_still_count_as_controls() {
        let ctx = FormContext::builder(EntityType::Risk)
            .number(keys::INHERENT_IMPACT, 4)
            .related(keys::LINKED_CONTROLS, Vec::new())
            .number(keys::LINK_COUNT, 1)
            .build();
        let batch = enforce_score_bounds(FieldType::ResidualImpact, &ctx, scores(&[2, 3, 4], 1));
        assert_eq!(values(&batch), vec![2, 3, 4]);
        assert_eq!(batch.recommended_index(), 1);
    }

    #[test]
    fn test_recommendation_follows_its_value_after_dedupe() {
        let ctx = FormContext::builder(EntityType::Risk)
            .number(keys::INHERENT_LIKELIHOOD, 2)
            .related(keys::LINKED_CONTROLS, vec![control()])
            .build();
        let batch = enforce_score_bounds(FieldType::ResidualLikelihood, &ctx, scores(&[4, 3, 1], 2));
        assert_eq!(values(&batch), vec![2, 1]);
        assert_eq!(batch.recommended_index(), 1);
    }

    #[test]
    fn test_out_of_range_scores_clamped_to_scale() {
        let ctx = FormContext::builder(EntityType::Risk).build();
        let batch = enforce_score_bounds(FieldType::InherentImpact, &ctx, scores(&[9, 0], 0));
        assert_eq!(values(&batch), vec![5, 1]);
    }

    #[test]
    fn test_unknown_inherent_only_clamps_scale() {
        let ctx = FormContext::builder(EntityType::Risk)
            .related(keys::LINKED_CONTROLS, Vec::new())
            .build();
        let batch = enforce_score_bounds(FieldType::ResidualLikelihood, &ctx, scores(&[5, 2], 0));
        assert_eq!(values(&batch), vec![5, 2]);
    }

    #[test]
    fn test_text_scores_are_normalized_and_junk_dropped() {
        let ctx = FormContext::builder(EntityType::Risk).build();
        let batch = SuggestionBatch::new(
            vec![
                SuggestionItem::text("4 - Likely"),
                SuggestionItem::text("very likely"),
            ],
            None,
            SuggestionSource::Remote,
        );
        let batch = enforce_score_bounds(FieldType::InherentLikelihood, &ctx, batch);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.items()[0].raw_value, Value::from(4));
        assert_eq!(batch.items()[0].display_text, "4 - Likely");
    }

    #[test]
    fn test_non_score_fields_untouched() {
        let ctx = FormContext::builder(EntityType::Risk).build();
        let batch = SuggestionBatch::new(
            vec![SuggestionItem::text("CISO")],
            None,
            SuggestionSource::Remote,
        );
        let out = enforce_score_bounds(FieldType::Owner, &ctx, batch.clone());
        assert_eq!(out, batch);
    }
}
