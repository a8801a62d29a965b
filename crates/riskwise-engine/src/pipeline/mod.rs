//! End-to-end suggestion flow for one field request.
//!
//! `fetch` gathers context and resolves a batch (remote first, fallback on
//! any recoverable failure). `present_and_apply` shows it and writes the
//! user's choice, refusing if the form moved on since `fetch` started.

use riskwise_core::apply::{AppliedValue, ApplyHooks, ApplyRequest, ApplyTarget};
use riskwise_core::context::FormContext;
use riskwise_core::suggest::{Selection, SelectionMode, SuggestionBatch, SuggestionSource};
use riskwise_core::{
    AiGateway, EntityType, FieldType, FormAccessor, FormSnapshot, GatewayError,
    GenerationOptions, Notifier, QuotaGuard, SuggestError, SuggestionView, ToastLevel,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::apply::FieldApplicator;
use crate::context::ContextExtractor;
use crate::fallback::{FallbackProvider, FallbackResolver};
use crate::guardrails::enforce_score_bounds;
use crate::parse::parse_suggestions;
use crate::present::SuggestionPresenter;
use crate::prompts::PromptBuilder;


pub const DEFAULT_MAX_TOKENS: u32 = 600;
pub const DEFAULT_TEMPERATURE: f32 = 0.4;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Model parameters for every remote call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// One "suggest" click on a form field
#[derive(Clone)]
pub struct SuggestionRequest {
    pub field: FieldType,
    pub entity: EntityType,
    pub target: ApplyTarget,
    pub hooks: ApplyHooks,
    pub fallback: Option<FallbackProvider>,
    pub mode: SelectionMode,
}

impl SuggestionRequest {
    /// Entity comes from the field; list targets allow picking several
    pub fn new(field: FieldType, target: ApplyTarget) -> Self {
        let mode = if target.is_list() {
            SelectionMode::Multi
        } else {
            SelectionMode::Single
        };
        Self {
            field,
            entity: field.entity(),
            target,
            hooks: ApplyHooks::default(),
            fallback: None,
            mode,
        }
    }

    pub fn with_hooks(mut self, hooks: ApplyHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_fallback(mut self, provider: FallbackProvider) -> Self {
        self.fallback = Some(provider);
        self
    }

    /// Multi is only honoured for list targets
    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = if self.target.is_list() {
            mode
        } else {
            SelectionMode::Single
        };
        self
    }
}

impl fmt::Debug for SuggestionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuggestionRequest")
            .field("field", &self.field)
            .field("entity", &self.entity)
            .field("target", &self.target)
            .field("mode", &self.mode)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// A resolved batch waiting to be shown
#[derive(Debug, Clone)]
pub struct FetchedSuggestions {
    pub request_id: Uuid,
    pub batch: SuggestionBatch,
    /// Form identity when the request started
    pub snapshot: FormSnapshot,
    /// Why the remote path was skipped, when fallback supplied the batch
    pub remote_error: Option<SuggestError>,
}

/// How a request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Applied {
        count: usize,
        source: SuggestionSource,
    },
    Dismissed,
    NoSuggestions,
    QuotaBlocked,
    StaleContext,
    ApplyFailed,
}

pub struct SuggestionPipeline {
    extractor: ContextExtractor,
    prompts: PromptBuilder,
    gateway: Option<Arc<dyn AiGateway>>,
    quota: Arc<dyn QuotaGuard>,
    fallback: FallbackResolver,
    presenter: SuggestionPresenter,
    applicator: FieldApplicator,
    notifier: Arc<dyn Notifier>,
    settings: GenerationSettings,
}

impl SuggestionPipeline {
    pub fn new(
        extractor: ContextExtractor,
        quota: Arc<dyn QuotaGuard>,
        fallback: FallbackResolver,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let prompts = PromptBuilder::new(extractor.profile().clone());
        Self {
            extractor,
            prompts,
            gateway: None,
            quota,
            fallback,
            presenter: SuggestionPresenter,
            applicator: FieldApplicator::new(notifier.clone()),
            notifier,
            settings: GenerationSettings::default(),
        }
    }

    /// Without a gateway every request goes straight to fallback
    pub fn with_gateway(mut self, gateway: Arc<dyn AiGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Pin "today" for both date prompts and date fallbacks
    pub fn with_today(mut self, today: chrono::NaiveDate) -> Self {
        self.prompts = self.prompts.with_today(today);
        self.fallback = self.fallback.with_today(today);
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }

    /// Full flow: fetch, present, apply
    pub async fn request_suggestions(
        &self,
        request: &SuggestionRequest,
        form: &mut dyn FormAccessor,
        view: &mut dyn SuggestionView,
    ) -> RequestOutcome {
        match self.fetch(request, &*form).await {
            Ok(fetched) => self.present_and_apply(fetched, request, form, view),
            Err(SuggestError::QuotaExceeded { reason }) => {
                info!(field = %request.field, reason = %reason, "suggestion blocked by quota");
                RequestOutcome::QuotaBlocked
            }
            Err(err) => {
                warn!(field = %request.field, error = %err, "suggestion request failed");
                self.notifier
                    .toast("Suggestions are unavailable right now", ToastLevel::Error);
                RequestOutcome::NoSuggestions
            }
        }
    }

    /// Resolve a batch for the request. Only quota exhaustion is returned
    /// as an error; every other remote failure falls back.
    pub async fn fetch(
        &self,
        request: &SuggestionRequest,
        form: &dyn FormAccessor,
    ) -> Result<FetchedSuggestions, SuggestError> {
        let request_id = Uuid::new_v4();
        let snapshot = form.snapshot();
        let context = self.extractor.extract(request.entity, form);

        let (batch, remote_error) = match self.fetch_remote(request.field, &context).await {
            Ok(batch) => (batch, None),
            Err(err) if err.is_recoverable() => {
                debug!(
                    %request_id,
                    field = %request.field,
                    reason = err.kind(),
                    "using fallback suggestions"
                );
                let batch = self
                    .fallback
                    .resolve_with(request.fallback.as_ref(), request.field, &context);
                (enforce_score_bounds(request.field, &context, batch), Some(err))
            }
            Err(err) => return Err(err),
        };

        info!(
            %request_id,
            field = %request.field,
            source = ?batch.source(),
            count = batch.len(),
            "suggestions ready"
        );
        Ok(FetchedSuggestions {
            request_id,
            batch,
            snapshot,
            remote_error,
        })
    }

    async fn fetch_remote(
        &self,
        field: FieldType,
        context: &FormContext,
    ) -> Result<SuggestionBatch, SuggestError> {
        let gateway = self
            .gateway
            .as_ref()
            .ok_or(SuggestError::ServiceUnavailable)?;

        let prompt = self.prompts.build(field, context);

        let decision = self.quota.can_make_call();
        if !decision.allowed {
            self.quota.show_limit_notice(&decision);
            return Err(SuggestError::QuotaExceeded {
                reason: decision
                    .reason
                    .unwrap_or_else(|| "AI usage limit reached".to_string()),
            });
        }

        let options = GenerationOptions {
            system_prompt: prompt.system_prompt,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            timeout: self.settings.timeout,
        };

        // Counted at dispatch, whatever the outcome. An uncounted call is
        // never sent.
        if let Err(err) = self.quota.record_call() {
            warn!(field = %field, error = %err, "could not record AI usage");
            return Err(SuggestError::ServiceUnavailable);
        }
        let response = gateway.invoke(&prompt.user_prompt, &options).await?;
        if response.trim().is_empty() {
            return Err(GatewayError::EmptyResponse.into());
        }

        let batch = enforce_score_bounds(field, context, parse_suggestions(&response)?);
        if batch.is_empty() {
            return Err(SuggestError::EmptySuggestions);
        }
        Ok(batch)
    }

    /// Show the fetched batch and write the user's choice
    pub fn present_and_apply(
        &self,
        fetched: FetchedSuggestions,
        request: &SuggestionRequest,
        form: &mut dyn FormAccessor,
        view: &mut dyn SuggestionView,
    ) -> RequestOutcome {
        if form.snapshot() != fetched.snapshot {
            warn!(
                request_id = %fetched.request_id,
                field = %request.field,
                "form changed while suggestions were loading"
            );
            self.notifier.toast(
                "The form changed while suggestions were loading. Ask again for fresh suggestions.",
                ToastLevel::Warning,
            );
            return RequestOutcome::StaleContext;
        }

        let batch = fetched.batch;
        let selection = self
            .presenter
            .present(request.field, &batch, request.mode, view);
        let indices = match selection {
            Selection::Dismissed if batch.is_empty() => return RequestOutcome::NoSuggestions,
            Selection::Dismissed => return RequestOutcome::Dismissed,
            Selection::Single(i) => vec![i],
            Selection::Multi(indices) => indices,
        };

        let mut values: Vec<_> = indices
            .iter()
            .filter_map(|i| batch.get(*i))
            .map(|item| item.raw_value.clone())
            .collect();
        let value = if request.target.is_list() {
            AppliedValue::Many(values)
        } else if values.is_empty() {
            return RequestOutcome::Dismissed;
        } else {
            AppliedValue::Single(values.swap_remove(0))
        };

        let apply = ApplyRequest {
            target: request.target.clone(),
            value,
            hooks: request.hooks.clone(),
        };
        match self.applicator.apply_with_receipt(form, &apply) {
            Some(receipt) => RequestOutcome::Applied {
                count: receipt.values.len(),
                source: batch.source(),
            },
            None => RequestOutcome::ApplyFailed,
        }
    }
}
