//! Shows a batch through a `SuggestionView` and validates the user's pick.

use riskwise_core::suggest::{PresentedOption, Selection, SelectionMode, SuggestionBatch};
use riskwise_core::{FieldType, SuggestionView};
use tracing::debug;

use crate::scale;

/// Message shown when a field has nothing to offer
pub fn no_suggestions_message(field: FieldType) -> String {
    format!("No suggestions available for {}", field.label())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SuggestionPresenter;

impl SuggestionPresenter {
    pub fn options(&self, field: FieldType, batch: &SuggestionBatch) -> Vec<PresentedOption> {
        batch
            .items()
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let label = match (field.is_score(), item.score_value()) {
                    (true, Some(score)) if item.display_text.trim().parse::<i64>().is_ok() => {
                        scale::score_display(field, score)
                    }
                    _ => item.display_text.clone(),
                };
                PresentedOption {
                    index,
                    label,
                    detail: item.description.clone(),
                    recommended: item.recommended,
                }
            })
            .collect()
    }

    /// Present the batch and return a selection guaranteed to index into it.
    /// An empty batch shows the "no suggestions" state and is `Dismissed`.
    pub fn present(
        &self,
        field: FieldType,
        batch: &SuggestionBatch,
        mode: SelectionMode,
        view: &mut dyn SuggestionView,
    ) -> Selection {
        if batch.is_empty() {
            view.show_empty(field, &no_suggestions_message(field));
            return Selection::Dismissed;
        }

        let options = self.options(field, batch);
        let raw = view.choose(field, &options, mode);
        let selection = normalize(raw, batch.len(), mode);
        debug!(field = %field, ?selection, "suggestion selection");
        selection
    }
}

/// Drop out-of-range and repeated indices; coerce to the requested mode
fn normalize(selection: Selection, len: usize, mode: SelectionMode) -> Selection {
    let picked: Vec<usize> = match selection {
        Selection::Dismissed => return Selection::Dismissed,
        Selection::Single(i) => vec![i],
        Selection::Multi(indices) => indices,
    };
    let mut valid: Vec<usize> = Vec::new();
    for i in picked {
        if i < len && !valid.contains(&i) {
            valid.push(i);
        }
    }
    match (mode, valid.as_slice()) {
        (_, []) => Selection::Dismissed,
        (SelectionMode::Single, [first, ..]) => Selection::Single(*first),
        (SelectionMode::Multi, _) => Selection::Multi(valid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedView;
    use riskwise_core::suggest::{SuggestionItem, SuggestionSource};

    fn batch() -> SuggestionBatch {
        SuggestionBatch::new(
            vec![
                SuggestionItem::text("Phishing").with_description("Most common vector"),
                SuggestionItem::text("Weak passwords"),
            ],
            Some(1),
            SuggestionSource::Remote,
        )
    }

    #[test]
    fn test_options_carry_recommendation_and_detail() {
        let mut view = ScriptedView::answering(Selection::Single(0));
        let selection =
            SuggestionPresenter.present(FieldType::RootCauses, &batch(), SelectionMode::Multi, &mut view);
        assert_eq!(selection, Selection::Multi(vec![0]));
        assert_eq!(view.shown.len(), 2);
        assert!(view.shown[1].recommended);
        assert_eq!(view.shown[0].detail.as_deref(), Some("Most common vector"));
        assert_eq!(view.mode, Some(SelectionMode::Multi));
    }

    #[test]
    fn test_empty_batch_shows_message() {
        let mut view = ScriptedView::answering(Selection::Single(0));
        let selection = SuggestionPresenter.present(
            FieldType::Owner,
            &SuggestionBatch::empty(SuggestionSource::Fallback),
            SelectionMode::Single,
            &mut view,
        );
        assert_eq!(selection, Selection::Dismissed);
        assert_eq!(
            view.empty_message.as_deref(),
            Some("No suggestions available for risk owner")
        );
        assert!(view.shown.is_empty());
    }

    #[test]
    fn test_out_of_range_picks_are_dropped() {
        assert_eq!(normalize(Selection::Single(5), 2, SelectionMode::Single), Selection::Dismissed);
        assert_eq!(
            normalize(Selection::Multi(vec![1, 9, 1, 0]), 2, SelectionMode::Multi),
            Selection::Multi(vec![1, 0])
        );
        assert_eq!(
            normalize(Selection::Multi(vec![1, 0]), 2, SelectionMode::Single),
            Selection::Single(1)
        );
    }

    #[test]
    fn test_score_labels_get_band_names() {
        let batch = SuggestionBatch::new(
            vec![SuggestionItem::score(4, "4")],
            None,
            SuggestionSource::Remote,
        );
        let options = SuggestionPresenter.options(FieldType::InherentLikelihood, &batch);
        assert_eq!(options[0].label, "4 - Likely");
    }
}
