//! 1-5 scoring scale shared by prompts, fallback and guardrails.

use regex::Regex;
use riskwise_core::FieldType;
use std::sync::OnceLock;

pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 5;

const LIKELIHOOD_BANDS: [&str; 5] = ["Rare", "Unlikely", "Possible", "Likely", "Almost Certain"];
const IMPACT_BANDS: [&str; 5] = ["Negligible", "Minor", "Moderate", "Major", "Severe"];

const LIKELIHOOD_GUIDE: [&str; 5] = [
    "may occur only in exceptional circumstances (less than once in 10 years)",
    "could occur at some time (once in 5-10 years)",
    "might occur at some time (once in 1-5 years)",
    "will probably occur in most circumstances (about once a year)",
    "is expected to occur in most circumstances (several times a year)",
];

const IMPACT_GUIDE: [&str; 5] = [
    "insignificant disruption, absorbed by normal operations",
    "minor disruption or loss, handled within the team",
    "noticeable disruption, financial loss or regulatory attention",
    "serious disruption, significant loss, regulatory breach or media coverage",
    "critical failure threatening objectives, licences or viability",
];

fn bands(field: FieldType) -> Option<&'static [&'static str; 5]> {
    match field {
        FieldType::InherentLikelihood | FieldType::ResidualLikelihood => Some(&LIKELIHOOD_BANDS),
        FieldType::InherentImpact | FieldType::ResidualImpact => Some(&IMPACT_BANDS),
        _ => None,
    }
}

/// Band name for a score, e.g. 4 -> "Likely"
pub fn band_label(field: FieldType, score: i64) -> Option<&'static str> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return None;
    }
    bands(field).map(|b| b[(score - 1) as usize])
}

/// "4 - Likely" style display text
pub fn score_display(field: FieldType, score: i64) -> String {
    match band_label(field, score) {
        Some(label) => format!("{} - {}", score, label),
        None => score.to_string(),
    }
}

/// The full rubric as prompt text
pub fn rubric(field: FieldType) -> String {
    let (names, guide) = match field {
        FieldType::InherentLikelihood | FieldType::ResidualLikelihood => {
            (&LIKELIHOOD_BANDS, &LIKELIHOOD_GUIDE)
        }
        _ => (&IMPACT_BANDS, &IMPACT_GUIDE),
    };
    names
        .iter()
        .zip(guide.iter())
        .enumerate()
        .map(|(i, (name, desc))| format!("{} = {}: {}", i + 1, name, desc))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn clamp_score(score: i64) -> i64 {
    score.clamp(MIN_SCORE, MAX_SCORE)
}

fn leading_score() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)(?:\.0+)?(?:\s|$|[-:/(])").expect("valid score regex"))
}

/// Parse a score out of form or model text ("4", "4 - Likely", "4/5")
pub fn parse_score(text: &str) -> Option<i64> {
    let caps = leading_score().captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}
