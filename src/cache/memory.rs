//! In-process state backing. Lives and dies with the process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{Scope, ScopedCache, StateKey};
use crate::error::CacheError;

/// Shared map of every scope's entries.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Scope, HashMap<StateKey, String>>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scoped(self: &Arc<Self>, scope: Scope) -> MemoryCache {
        MemoryCache {
            scope,
            store: Arc::clone(self),
        }
    }

    pub fn scope_count(&self) -> Result<usize, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.len())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryCache {
    scope: Scope,
    store: Arc<MemoryStore>,
}

impl MemoryCache {
    /// Cache with its own private store.
    pub fn new(scope: Scope) -> Self {
        MemoryStore::new().scoped(scope)
    }
}

#[async_trait]
impl ScopedCache for MemoryCache {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    async fn get(&self, key: StateKey) -> Result<Option<String>, CacheError> {
        let entries = self.store.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries
            .get(&self.scope)
            .and_then(|fields| fields.get(&key))
            .cloned())
    }

    async fn set(&self, key: StateKey, value: &str) -> Result<(), CacheError> {
        let mut entries = self.store.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries
            .entry(self.scope.clone())
            .or_default()
            .insert(key, value.to_string());
        Ok(())
    }
}
