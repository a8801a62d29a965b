//! Field types the suggestion pipeline knows how to fill.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of record being authored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Risk,
    Control,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Risk => "risk",
            EntityType::Control => "control",
        }
    }

    /// Entity type on the other side of a risk/control link
    pub fn counterpart(&self) -> EntityType {
        match self {
            EntityType::Risk => EntityType::Control,
            EntityType::Control => EntityType::Risk,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "risk" => Ok(EntityType::Risk),
            "control" => Ok(EntityType::Control),
            other => Err(format!("Unknown entity type '{}'", other)),
        }
    }
}

/// How a chosen value lands in the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldShape {
    Text,
    Category,
    List,
    Date,
    Numeric,
}

/// A form field that can request AI suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Title,
    Description,
    RootCauses,
    Consequences,
    Category,
    Owner,
    Treatment,
    Status,
    InherentLikelihood,
    InherentImpact,
    ResidualLikelihood,
    ResidualImpact,
    ReviewDate,
    TargetDate,
    LinkedControls,
    ControlTitle,
    ControlDescription,
    ControlType,
    ControlOwner,
    Frequency,
    Effectiveness,
    Evidence,
}

impl FieldType {
    pub const ALL: [FieldType; 22] = [
        FieldType::Title,
        FieldType::Description,
        FieldType::RootCauses,
        FieldType::Consequences,
        FieldType::Category,
        FieldType::Owner,
        FieldType::Treatment,
        FieldType::Status,
        FieldType::InherentLikelihood,
        FieldType::InherentImpact,
        FieldType::ResidualLikelihood,
        FieldType::ResidualImpact,
        FieldType::ReviewDate,
        FieldType::TargetDate,
        FieldType::LinkedControls,
        FieldType::ControlTitle,
        FieldType::ControlDescription,
        FieldType::ControlType,
        FieldType::ControlOwner,
        FieldType::Frequency,
        FieldType::Effectiveness,
        FieldType::Evidence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Title => "title",
            FieldType::Description => "description",
            FieldType::RootCauses => "root-causes",
            FieldType::Consequences => "consequences",
            FieldType::Category => "category",
            FieldType::Owner => "owner",
            FieldType::Treatment => "treatment",
            FieldType::Status => "status",
            FieldType::InherentLikelihood => "inherent-likelihood",
            FieldType::InherentImpact => "inherent-impact",
            FieldType::ResidualLikelihood => "residual-likelihood",
            FieldType::ResidualImpact => "residual-impact",
            FieldType::ReviewDate => "review-date",
            FieldType::TargetDate => "target-date",
            FieldType::LinkedControls => "linked-controls",
            FieldType::ControlTitle => "control-title",
            FieldType::ControlDescription => "control-description",
            FieldType::ControlType => "control-type",
            FieldType::ControlOwner => "control-owner",
            FieldType::Frequency => "frequency",
            FieldType::Effectiveness => "effectiveness",
            FieldType::Evidence => "evidence",
        }
    }

    /// Human-readable name used in prompts and messages
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::Title => "risk title",
            FieldType::Description => "risk description",
            FieldType::RootCauses => "root causes",
            FieldType::Consequences => "consequences",
            FieldType::Category => "risk category",
            FieldType::Owner => "risk owner",
            FieldType::Treatment => "treatment strategy",
            FieldType::Status => "risk status",
            FieldType::InherentLikelihood => "inherent likelihood",
            FieldType::InherentImpact => "inherent impact",
            FieldType::ResidualLikelihood => "residual likelihood",
            FieldType::ResidualImpact => "residual impact",
            FieldType::ReviewDate => "review date",
            FieldType::TargetDate => "target date",
            FieldType::LinkedControls => "linked controls",
            FieldType::ControlTitle => "control title",
            FieldType::ControlDescription => "control description",
            FieldType::ControlType => "control type",
            FieldType::ControlOwner => "control owner",
            FieldType::Frequency => "testing frequency",
            FieldType::Effectiveness => "control effectiveness",
            FieldType::Evidence => "control evidence",
        }
    }

    /// Record type whose form hosts this field
    pub fn entity(&self) -> EntityType {
        match self {
            FieldType::ControlTitle
            | FieldType::ControlDescription
            | FieldType::ControlType
            | FieldType::ControlOwner
            | FieldType::Frequency
            | FieldType::Effectiveness
            | FieldType::Evidence => EntityType::Control,
            _ => EntityType::Risk,
        }
    }

    /// Default way a value for this field is written back
    pub fn shape(&self) -> FieldShape {
        match self {
            FieldType::Category | FieldType::ControlType => FieldShape::Category,
            FieldType::RootCauses
            | FieldType::Consequences
            | FieldType::LinkedControls
            | FieldType::Evidence => FieldShape::List,
            FieldType::ReviewDate | FieldType::TargetDate => FieldShape::Date,
            FieldType::InherentLikelihood
            | FieldType::InherentImpact
            | FieldType::ResidualLikelihood
            | FieldType::ResidualImpact => FieldShape::Numeric,
            _ => FieldShape::Text,
        }
    }

    pub fn is_score(&self) -> bool {
        self.shape() == FieldShape::Numeric
    }

    pub fn is_residual(&self) -> bool {
        matches!(
            self,
            FieldType::ResidualLikelihood | FieldType::ResidualImpact
        )
    }

    /// Inherent score field a residual score is bounded by
    pub fn inherent_counterpart(&self) -> Option<FieldType> {
        match self {
            FieldType::ResidualLikelihood => Some(FieldType::InherentLikelihood),
            FieldType::ResidualImpact => Some(FieldType::InherentImpact),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        FieldType::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| format!("Unknown field type '{}'", s.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_round_trips_through_str() {
        for field in FieldType::ALL {
            assert_eq!(field.as_str().parse::<FieldType>(), Ok(field));
        }
    }

    #[test]
    fn test_field_type_accepts_snake_case() {
        assert_eq!(
            "residual_likelihood".parse::<FieldType>(),
            Ok(FieldType::ResidualLikelihood)
        );
        assert!("severity".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_residual_fields_point_at_inherent() {
        assert_eq!(
            FieldType::ResidualImpact.inherent_counterpart(),
            Some(FieldType::InherentImpact)
        );
        assert!(FieldType::InherentImpact.inherent_counterpart().is_none());
        assert!(FieldType::ResidualLikelihood.is_residual());
    }

    #[test]
    fn test_control_fields_belong_to_control_forms() {
        assert_eq!(FieldType::Evidence.entity(), EntityType::Control);
        assert_eq!(FieldType::Title.entity(), EntityType::Risk);
        assert_eq!(EntityType::Risk.counterpart(), EntityType::Control);
    }
}
