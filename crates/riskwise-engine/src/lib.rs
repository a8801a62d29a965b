//! Suggestion engine for riskwise: context, prompts, parsing, fallback and
//! the pipeline that ties them to a form.

pub mod apply;
pub mod context;
pub mod fallback;
pub mod guardrails;
pub mod parse;
pub mod pipeline;
pub mod present;
pub mod prompts;
pub mod scale;

mod prompt_utils;

#[cfg(test)]
mod testing;

pub use apply::FieldApplicator;
pub use context::{ContextExtractor, WorkspaceProfile};
pub use fallback::{FallbackProvider, FallbackResolver};
pub use pipeline::{
    FetchedSuggestions, GenerationSettings, RequestOutcome, SuggestionPipeline, SuggestionRequest,
};
pub use present::SuggestionPresenter;
pub use prompts::PromptBuilder;
