//! Linked-entity summaries kept in workspace storage under
//! `entities/<risk|control>/<id>`.

use riskwise_core::context::RelatedSummary;
use riskwise_core::{EntityLookup, EntityType, Storage};
use std::sync::Arc;
use tracing::warn;

pub fn entity_storage_key(entity: EntityType, id: &str) -> String {
    format!("entities/{}/{}", entity.as_str(), id)
}

pub struct StoredEntities {
    storage: Arc<dyn Storage>,
}

impl StoredEntities {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Register or replace a summary
    pub fn put(&self, entity: EntityType, summary: &RelatedSummary) -> anyhow::Result<()> {
        let encoded = serde_json::to_string(summary)?;
        self.storage
            .set(&entity_storage_key(entity, &summary.id), &encoded)
            .map_err(|e| anyhow::anyhow!("Failed to store {} {}: {}", entity, summary.id, e))
    }
}

impl EntityLookup for StoredEntities {
    fn get_by_id(&self, entity: EntityType, id: &str) -> Option<RelatedSummary> {
        let key = entity_storage_key(entity, id);
        let raw = self.storage.get(&key)?;
        match serde_json::from_str::<RelatedSummary>(&raw) {
            Ok(summary) => Some(summary),
            Err(err) => {
                warn!(key = %key, error = %err, "ignoring unreadable entity record");
                None
            }
        }
    }
}
