//! Per-entity store registry.
//!
//! A [`VersionChainStore`] has a single logical owner. Hosts that reach the
//! same entity from several threads go through the registry, which hands out
//! one mutex-guarded store per entity so calls are serialized at the
//! boundary.

use crate::error::Result;
use crate::store::{StoreConfig, VersionChainStore};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// A store shared behind explicit synchronization.
pub type SharedStore = Arc<Mutex<VersionChainStore>>;

/// Stores keyed by entity ID, all built from the same configuration.
pub struct StoreRegistry {
    config: StoreConfig,
    stores: RwLock<HashMap<String, SharedStore>>,
}

impl StoreRegistry {
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stores: RwLock::new(HashMap::new()),
        })
    }

    /// Get the entity's store, creating it on first use.
    pub fn get_or_create(&self, entity_id: &str) -> Result<SharedStore> {
        if let Some(store) = self.stores.read().get(entity_id) {
            return Ok(Arc::clone(store));
        }

        let mut stores = self.stores.write();
        // Another caller may have raced us between the two locks.
        if let Some(store) = stores.get(entity_id) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(Mutex::new(VersionChainStore::new(
            entity_id,
            self.config.clone(),
        )?));
        stores.insert(entity_id.to_string(), Arc::clone(&store));
        Ok(store)
    }

    pub fn get(&self, entity_id: &str) -> Option<SharedStore> {
        self.stores.read().get(entity_id).cloned()
    }

    /// Forget an entity. Outstanding handles keep working.
    pub fn remove(&self, entity_id: &str) -> Option<SharedStore> {
        self.stores.write().remove(entity_id)
    }

    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stores.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }
}
