//! Builds a `FormContext` from live form state.
//!
//! Every field the extractor reads is listed in a per-entity registry, so the
//! logical key, the form field id and the value kind stay in one place.

use riskwise_core::context::{keys, FormContext, FormContextBuilder, RelatedSummary};
use riskwise_core::{EntityLookup, EntityType, FieldType, FormAccessor, Storage};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::scale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Score,
    List,
}

/// Logical key, form field id, value kind
type Binding = (&'static str, &'static str, ValueKind);

const RISK_FIELDS: &[Binding] = &[
    (keys::TITLE, "risk-title", ValueKind::Text),
    (keys::DESCRIPTION, "risk-description", ValueKind::Text),
    (keys::CATEGORY, "risk-category", ValueKind::Text),
    (keys::ROOT_CAUSES, "rootCauses", ValueKind::List),
    (keys::CONSEQUENCES, "consequences", ValueKind::List),
    (keys::OWNER, "risk-owner", ValueKind::Text),
    (keys::STATUS, "risk-status", ValueKind::Text),
    (keys::TREATMENT, "risk-treatment", ValueKind::Text),
    (keys::INHERENT_LIKELIHOOD, "risk-inherent-likelihood", ValueKind::Score),
    (keys::INHERENT_IMPACT, "risk-inherent-impact", ValueKind::Score),
    (keys::RESIDUAL_LIKELIHOOD, "risk-residual-likelihood", ValueKind::Score),
    (keys::RESIDUAL_IMPACT, "risk-residual-impact", ValueKind::Score),
    (keys::REVIEW_DATE, "risk-review-date", ValueKind::Text),
    (keys::TARGET_DATE, "risk-target-date", ValueKind::Text),
];

const CONTROL_FIELDS: &[Binding] = &[
    (keys::TITLE, "control-title", ValueKind::Text),
    (keys::DESCRIPTION, "control-description", ValueKind::Text),
    (keys::CONTROL_TYPE, "control-type", ValueKind::Text),
    (keys::OWNER, "control-owner", ValueKind::Text),
    (keys::FREQUENCY, "control-frequency", ValueKind::Text),
    (keys::EFFECTIVENESS, "control-effectiveness", ValueKind::Text),
    (keys::STATUS, "control-status", ValueKind::Text),
    (keys::EVIDENCE, "evidence", ValueKind::List),
];

/// Form field holding the persisted id of the entity being edited
pub fn entity_id_field(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Risk => "risk-id",
        EntityType::Control => "control-id",
    }
}

/// Relation listing the counterpart entities
pub fn relation_key(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Risk => keys::LINKED_CONTROLS,
        EntityType::Control => keys::LINKED_RISKS,
    }
}

/// Storage key for persisted relationship ids
pub fn links_storage_key(entity: EntityType, id: &str, relation: &str) -> String {
    format!("links/{}/{}/{}", entity.as_str(), id, relation)
}

/// Default form field id a suggestion for `field` is written to.
/// For list fields this is the list type.
pub fn default_field_id(field: FieldType) -> &'static str {
    match field {
        FieldType::LinkedControls => keys::LINKED_CONTROLS,
        _ => {
            let key = riskwise_core::context::context_key(field);
            let registry = match field.entity() {
                EntityType::Risk => RISK_FIELDS,
                EntityType::Control => CONTROL_FIELDS,
            };
            registry
                .iter()
                .find(|(k, _, _)| *k == key)
                .map(|(_, id, _)| *id)
                .unwrap_or(key)
        }
    }
}

/// Hidden companion field storing a category's raw id
pub fn hidden_field_id(field: FieldType) -> Option<&'static str> {
    match field {
        FieldType::Category => Some("risk-category-id"),
        FieldType::ControlType => Some("control-type-id"),
        _ => None,
    }
}

/// Workspace facts appended to every context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceProfile {
    pub industry: Option<String>,
    pub register_type: Option<String>,
}

pub struct ContextExtractor {
    entities: Arc<dyn EntityLookup>,
    storage: Arc<dyn Storage>,
    profile: WorkspaceProfile,
}

impl ContextExtractor {
    pub fn new(
        entities: Arc<dyn EntityLookup>,
        storage: Arc<dyn Storage>,
        profile: WorkspaceProfile,
    ) -> Self {
        Self {
            entities,
            storage,
            profile,
        }
    }

    pub fn profile(&self) -> &WorkspaceProfile {
        &self.profile
    }

    /// Snapshot the form into an immutable context. Missing and blank
    /// fields are left out.
    pub fn extract(&self, entity: EntityType, form: &dyn FormAccessor) -> FormContext {
        let mut builder = FormContext::builder(entity);
        let registry = match entity {
            EntityType::Risk => RISK_FIELDS,
            EntityType::Control => CONTROL_FIELDS,
        };

        for (key, field_id, kind) in registry {
            match kind {
                ValueKind::Text => {
                    if let Some(value) = form.value(field_id) {
                        builder.text(key, value);
                    }
                }
                ValueKind::Score => {
                    if let Some(value) = form.value(field_id) {
                        push_score(&mut builder, key, &value);
                    }
                }
                ValueKind::List => {
                    if let Some(items) = form.list(field_id) {
                        builder.list(key, items);
                    }
                }
            }
        }

        let relation = relation_key(entity);
        let ids: Vec<String> = self
            .linked_ids(entity, relation, form)
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        let related = ids
            .iter()
            .filter_map(|id| self.resolve(entity.counterpart(), id))
            .collect();
        builder.related(relation, related);
        builder.number(keys::LINK_COUNT, ids.len() as i64);

        if let Some(industry) = &self.profile.industry {
            builder.text(keys::INDUSTRY, industry.as_str());
        }
        if let Some(register_type) = &self.profile.register_type {
            builder.text(keys::REGISTER_TYPE, register_type.as_str());
        }

        let context = builder.build();
        debug!(entity = %entity, facts = context.len(), "extracted form context");
        context
    }

    /// In-form selection wins over persisted links, so unsaved edits are seen
    fn linked_ids(&self, entity: EntityType, relation: &str, form: &dyn FormAccessor) -> Vec<String> {
        if let Some(selected) = form.selected_links(relation) {
            return selected;
        }
        let Some(id) = form
            .value(entity_id_field(entity))
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
        else {
            return Vec::new();
        };

        let key = links_storage_key(entity, &id, relation);
        match self.storage.get(&key) {
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "ignoring unreadable relationship record");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    fn resolve(&self, entity: EntityType, id: &str) -> Option<RelatedSummary> {
        let summary = self.entities.get_by_id(entity, id);
        if summary.is_none() {
            debug!(entity = %entity, id, "linked entity not found");
        }
        summary
    }
}

fn push_score(builder: &mut FormContextBuilder, key: &str, value: &str) {
    match scale::parse_score(value) {
        Some(score) => {
            builder.number(key, score);
        }
        None => {
            builder.text(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MapEntities, MapStorage};
    use riskwise_core::context::ContextValue;
    use riskwise_core::form::MemoryForm;

    fn extractor(storage: MapStorage) -> ContextExtractor {
        let entities = MapEntities::default()
            .with(EntityType::Control, "c1", "Firewall", Some("preventive"))
            .with(EntityType::Control, "c2", "Log monitoring", Some("detective"))
            .with(EntityType::Risk, "r1", "Data Breach", Some("Technology"));
        ContextExtractor::new(
            Arc::new(entities),
            Arc::new(storage),
            WorkspaceProfile {
                industry: Some("technology".into()),
                register_type: None,
            },
        )
    }

    #[test]
    fn test_extracts_only_present_fields() {
        let form = MemoryForm::new("f1")
            .with_field("risk-title", "Data Breach")
            .with_field("risk-description", "   ")
            .with_field("risk-inherent-likelihood", "4 - Likely")
            .with_list("rootCauses", &["Phishing"]);
        let ctx = extractor(MapStorage::default()).extract(EntityType::Risk, &form);

        assert_eq!(ctx.subject(), Some("Data Breach"));
        assert!(!ctx.contains(keys::DESCRIPTION));
        assert!(!ctx.contains(keys::OWNER));
        assert_eq!(ctx.number(keys::INHERENT_LIKELIHOOD), Some(4));
        assert_eq!(ctx.list(keys::ROOT_CAUSES), ["Phishing".to_string()]);
        assert_eq!(ctx.text(keys::INDUSTRY), Some("technology"));
        assert!(!ctx.contains(keys::REGISTER_TYPE));
    }

    #[test]
    fn test_in_form_selection_wins_over_persisted_links() {
        let storage = MapStorage::default().with(
            &links_storage_key(EntityType::Risk, "r9", keys::LINKED_CONTROLS),
            r#"["c1", "c2"]"#,
        );
        let form = MemoryForm::new("f1")
            .with_field("risk-id", "r9")
            .with_links(keys::LINKED_CONTROLS, &["c2"]);
        let ctx = extractor(storage).extract(EntityType::Risk, &form);

        let names: Vec<&str> = ctx.linked().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Log monitoring"]);
    }

    #[test]
    fn test_persisted_links_used_without_selection() {
        let storage = MapStorage::default().with(
            &links_storage_key(EntityType::Risk, "r9", keys::LINKED_CONTROLS),
            r#"["c1", "missing", "c2"]"#,
        );
        let form = MemoryForm::new("f1").with_field("risk-id", "r9");
        let ctx = extractor(storage).extract(EntityType::Risk, &form);
        assert_eq!(ctx.linked().len(), 2);
        assert_eq!(ctx.number(keys::LINK_COUNT), Some(3));
    }

    #[test]
    fn test_unknown_selected_id_still_counts_as_linked() {
        let form = MemoryForm::new("f1").with_links(keys::LINKED_CONTROLS, &["deleted-control"]);
        let ctx = extractor(MapStorage::default()).extract(EntityType::Risk, &form);
        assert!(ctx.linked().is_empty());
        assert!(ctx.has_links());

        let empty = MemoryForm::new("f1").with_links(keys::LINKED_CONTROLS, &[]);
        let ctx = extractor(MapStorage::default()).extract(EntityType::Risk, &empty);
        assert_eq!(ctx.number(keys::LINK_COUNT), Some(0));
        assert!(!ctx.has_links());
    }

    #[test]
    fn test_no_links_recorded_as_empty_relation() {
        let form = MemoryForm::new("f1").with_field("risk-title", "Outage");
        let ctx = extractor(MapStorage::default()).extract(EntityType::Risk, &form);
        assert_eq!(
            ctx.get(keys::LINKED_CONTROLS),
            Some(&ContextValue::Related(Vec::new()))
        );
    }

    #[test]
    fn test_control_context_reads_linked_risks() {
        let form = MemoryForm::new("f2")
            .with_field("control-title", "MFA")
            .with_links(keys::LINKED_RISKS, &["r1"]);
        let ctx = extractor(MapStorage::default()).extract(EntityType::Control, &form);
        assert_eq!(ctx.linked()[0].name, "Data Breach");
        assert_eq!(ctx.subject(), Some("MFA"));
    }

    #[test]
    fn test_unreadable_persisted_links_are_ignored() {
        let storage = MapStorage::default().with(
            &links_storage_key(EntityType::Risk, "r9", keys::LINKED_CONTROLS),
            "not json",
        );
        let form = MemoryForm::new("f1").with_field("risk-id", "r9");
        let ctx = extractor(storage).extract(EntityType::Risk, &form);
        assert!(ctx.linked().is_empty());
    }

    #[test]
    fn test_default_field_ids() {
        assert_eq!(default_field_id(FieldType::Title), "risk-title");
        assert_eq!(default_field_id(FieldType::ControlTitle), "control-title");
        assert_eq!(default_field_id(FieldType::RootCauses), "rootCauses");
        assert_eq!(default_field_id(FieldType::LinkedControls), "linkedControls");
        assert_eq!(
            default_field_id(FieldType::ResidualImpact),
            "risk-residual-impact"
        );
        assert_eq!(hidden_field_id(FieldType::Category), Some("risk-category-id"));
        assert_eq!(hidden_field_id(FieldType::Owner), None);
    }
}
