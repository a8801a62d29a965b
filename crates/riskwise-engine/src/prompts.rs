// ═══════════════════════════════════════════════════════════════════════════════
// SHARED BUILDING BLOCKS
// ═══════════════════════════════════════════════════════════════════════════════

use chrono::{Local, NaiveDate};
use riskwise_core::context::{keys, FormContext};
use riskwise_core::{EntityType, FieldType, PromptSpec};

use crate::context::WorkspaceProfile;
use crate::prompt_utils::{format_context, format_existing, grounding, output_format};
use crate::scale;

const RESPONSE_DISCIPLINE: &str = r#"Always answer with valid JSON in exactly the format requested.
Never add explanations outside the JSON."#;

const TEXT_ITEM: &str = r#"{"text": "...", "reason": "..."}"#;
const SCORE_ITEM: &str = r#"{"score": 3, "reason": "..."}"#;
const DATE_ITEM: &str = r#"{"date": "YYYY-MM-DD", "reason": "..."}"#;
const CATEGORY_ITEM: &str = r#"{"category": "category-id", "label": "Category Name", "reason": "..."}"#;

// ═══════════════════════════════════════════════════════════════════════════════
// PERSONA
// ═══════════════════════════════════════════════════════════════════════════════

fn role(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Risk => "a senior enterprise risk management consultant",
        EntityType::Control => "an internal control and assurance specialist",
    }
}

/// System prompt tailored to the workspace industry and register type
pub fn system_prompt(profile: &WorkspaceProfile, entity: EntityType) -> String {
    let mut prompt = format!("You are {}", role(entity));
    if let Some(industry) = profile.industry.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!(" working in the {} industry", industry.trim()));
    }
    prompt.push('.');
    match profile
        .register_type
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        Some(register) => prompt.push_str(&format!(
            " You help teams maintain their {} risk register.",
            register.trim()
        )),
        None => prompt.push_str(" You help teams maintain their risk register."),
    }
    if profile.industry.is_some() {
        prompt.push_str(" Use the terminology, regulations and threats practitioners in that industry would recognise.");
    }
    prompt.push_str("\n\n");
    prompt.push_str(RESPONSE_DISCIPLINE);
    prompt
}

// ═══════════════════════════════════════════════════════════════════════════════
// FIELD PROMPTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds system and user prompts for a field
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    profile: WorkspaceProfile,
    today: Option<NaiveDate>,
}

impl PromptBuilder {
    pub fn new(profile: WorkspaceProfile) -> Self {
        Self {
            profile,
            today: None,
        }
    }

    /// Pin "today" for date prompts
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn build(&self, field: FieldType, ctx: &FormContext) -> PromptSpec {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        PromptSpec {
            system_prompt: system_prompt(&self.profile, field.entity()),
            user_prompt: user_prompt_on(field, ctx, today),
            field_type: field,
        }
    }
}

/// User prompt for a field, dated with the local calendar day
pub fn user_prompt(field: FieldType, ctx: &FormContext) -> String {
    user_prompt_on(field, ctx, Local::now().date_naive())
}

/// User prompt for a field; every field type has a template
pub fn user_prompt_on(field: FieldType, ctx: &FormContext, today: NaiveDate) -> String {
    let (task, example) = match field {
        FieldType::Title => (
            format!(
                "Suggest a concise risk title (under 10 words) that names the event, not its cause or effect.\n{}",
                grounding(ctx, "risk")
            ),
            TEXT_ITEM,
        ),
        FieldType::Description => (
            format!(
                "Write a risk description of one to three sentences in the form \"Risk that <event> caused by <cause>, resulting in <consequence>\".\n{}",
                grounding(ctx, "risk")
            ),
            TEXT_ITEM,
        ),
        FieldType::RootCauses => (
            format!(
                "Suggest root causes: underlying conditions that could make this risk happen. Each should be a short phrase.\n{}{}",
                grounding(ctx, "risk"),
                format_existing(ctx.list(keys::ROOT_CAUSES), "ROOT CAUSES")
            ),
            TEXT_ITEM,
        ),
        FieldType::Consequences => (
            format!(
                "Suggest consequences: concrete effects on the organisation if this risk occurs. Each should be a short phrase.\n{}{}",
                grounding(ctx, "risk"),
                format_existing(ctx.list(keys::CONSEQUENCES), "CONSEQUENCES")
            ),
            TEXT_ITEM,
        ),
        FieldType::Category => (
            format!(
                "Suggest the risk category this risk belongs to. Use a lowercase hyphenated id (for example \"third-party\") and a human-readable label.\n{}",
                grounding(ctx, "risk")
            ),
            CATEGORY_ITEM,
        ),
        FieldType::Owner => (
            format!(
                "Suggest the role (not a person's name) best placed to own this risk and be accountable for its treatment.\n{}",
                grounding(ctx, "risk")
            ),
            r#"{"role": "...", "reason": "..."}"#,
        ),
        FieldType::Treatment => (
            format!(
                "Suggest a treatment strategy. Each suggestion starts with one of Mitigate, Accept, Transfer or Avoid, followed by a short action plan.\n{}",
                grounding(ctx, "risk")
            ),
            TEXT_ITEM,
        ),
        FieldType::Status => (
            format!(
                "Suggest the current status of this risk, choosing from: Open, In Treatment, Monitoring, Closed.\n{}",
                grounding(ctx, "risk")
            ),
            r#"{"value": "Open", "reason": "..."}"#,
        ),
        FieldType::InherentLikelihood | FieldType::InherentImpact => (
            inherent_score_task(field, ctx),
            SCORE_ITEM,
        ),
        FieldType::ResidualLikelihood | FieldType::ResidualImpact => (
            residual_score_task(field, ctx),
            SCORE_ITEM,
        ),
        FieldType::ReviewDate => (
            format!(
                "Today is {}. Suggest the next review date for this risk. Higher-rated risks are reviewed sooner; typical intervals are 3, 6 or 12 months from today. Every date must be after today. Use ISO format YYYY-MM-DD.\n{}",
                today.format("%Y-%m-%d"),
                grounding(ctx, "risk")
            ),
            DATE_ITEM,
        ),
        FieldType::TargetDate => (
            format!(
                "Today is {}. Suggest a realistic target date for completing the treatment actions, usually 1 to 6 months from today. Every date must be after today. Use ISO format YYYY-MM-DD.\n{}",
                today.format("%Y-%m-%d"),
                grounding(ctx, "risk")
            ),
            DATE_ITEM,
        ),
        FieldType::LinkedControls => (
            format!(
                "Suggest controls that would reduce the likelihood or impact of this risk. Give each as a short control name.\n{}",
                grounding(ctx, "risk")
            ),
            r#"{"name": "...", "reason": "..."}"#,
        ),
        FieldType::ControlTitle => (
            format!(
                "Suggest a concise control title (under 8 words) describing what the control does.\n{}",
                grounding(ctx, "control")
            ),
            TEXT_ITEM,
        ),
        FieldType::ControlDescription => (
            format!(
                "Write a control description of one to three sentences covering what is done, by whom and how often.\n{}",
                grounding(ctx, "control")
            ),
            TEXT_ITEM,
        ),
        FieldType::ControlType => (
            format!(
                "Suggest the control type. Use one of the ids preventive, detective, corrective or directive with a matching label.\n{}",
                grounding(ctx, "control")
            ),
            r#"{"type": "preventive", "label": "Preventive", "reason": "..."}"#,
        ),
        FieldType::ControlOwner => (
            format!(
                "Suggest the role (not a person's name) that should operate this control.\n{}",
                grounding(ctx, "control")
            ),
            r#"{"role": "...", "reason": "..."}"#,
        ),
        FieldType::Frequency => (
            format!(
                "Suggest how often this control should be performed or tested, choosing from: Continuous, Daily, Weekly, Monthly, Quarterly, Annually.\n{}",
                grounding(ctx, "control")
            ),
            r#"{"frequency": "Monthly", "reason": "..."}"#,
        ),
        FieldType::Effectiveness => (
            format!(
                "Assess how effective this control is likely to be, choosing from: Effective, Partially Effective, Ineffective, Not Tested.\n{}",
                grounding(ctx, "control")
            ),
            r#"{"value": "Effective", "reason": "..."}"#,
        ),
        FieldType::Evidence => (
            format!(
                "Suggest evidence an auditor could inspect to confirm the control operates, such as reports, logs or sign-offs.\n{}{}",
                grounding(ctx, "control"),
                format_existing(ctx.list(keys::EVIDENCE), "EVIDENCE")
            ),
            TEXT_ITEM,
        ),
    };

    format!(
        "{}\n\nTASK ({}):\n{}\n\n{}",
        format_context(ctx),
        field.label(),
        task,
        output_format(example)
    )
}

fn inherent_score_task(field: FieldType, ctx: &FormContext) -> String {
    let what = if field == FieldType::InherentLikelihood {
        "likelihood"
    } else {
        "impact"
    };
    format!(
        "Rate the inherent {} of this risk before any controls are applied, on this scale:\n{}\n{}",
        what,
        scale::rubric(field),
        grounding(ctx, "risk")
    )
}

fn residual_score_task(field: FieldType, ctx: &FormContext) -> String {
    let what = if field == FieldType::ResidualLikelihood {
        "likelihood"
    } else {
        "impact"
    };
    let mut task = format!(
        "Rate the residual {} of this risk after the linked controls are applied, on this scale:\n{}",
        what,
        scale::rubric(field)
    );

    let inherent = field
        .inherent_counterpart()
        .and_then(|f| ctx.number(riskwise_core::context::context_key(f)));
    match inherent {
        Some(inherent) if !ctx.has_links() => task.push_str(&format!(
            "\n\nCONSTRAINT: No controls are linked, so the residual {what} MUST equal the inherent {what} of {inherent}. Every score must be {inherent}."
        )),
        Some(inherent) => task.push_str(&format!(
            "\n\nCONSTRAINT: The residual {what} MUST be less than or equal to the inherent {what} of {inherent}. Reduce it only as far as the linked controls justify."
        )),
        None => task.push_str(&format!(
            "\n\nCONSTRAINT: The residual {what} can never exceed the inherent {what}. Without linked controls it equals the inherent rating."
        )),
    }
    task
}
