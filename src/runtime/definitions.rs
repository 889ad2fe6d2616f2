use std::sync::Arc;

use serde_json::json;

use crate::{
    ProcflowError, Result,
    common::MemCache,
    model::{ProcessDefinition, ProcessModel},
    store::{Store, query::{Cond, Query}},
};

const DEFINITION_CACHE_SIZE: usize = 2048;

/// Process-definition cache over the store.
///
/// Entries are immutable once cached and shared without locking; a
/// redeploy replaces the whole entry for the key's new id.
pub struct Definitions {
    store: Arc<Store>,
    cache: MemCache<String, Arc<ProcessDefinition>>,
}

impl Definitions {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            cache: MemCache::new(DEFINITION_CACHE_SIZE),
        }
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Result<Arc<ProcessDefinition>> {
        if let Some(definition) = self.cache.get(&id.to_string()) {
            return Ok(definition);
        }

        let data = self.store.process_definitions().find(id)?;
        let model = ProcessModel::from_json(&data.data)?;
        let definition = Arc::new(ProcessDefinition::build(&model, data.version)?);
        self.cache.set(id.to_string(), definition.clone());
        Ok(definition)
    }

    /// The highest deployed version of a key.
    pub fn latest_by_key(
        &self,
        key: &str,
    ) -> Result<Arc<ProcessDefinition>> {
        let page = self
            .store
            .process_definitions()
            .query(&Query::new().push(Cond::Eq("key".into(), json!(key))).order_by("version", true).limit(1))?;
        let data = page.rows.first().ok_or(ProcflowError::not_found("process_definition", key))?;
        self.get(&data.id)
    }

    pub fn set(
        &self,
        definition: Arc<ProcessDefinition>,
    ) {
        self.cache.set(definition.id.clone(), definition);
    }
}
