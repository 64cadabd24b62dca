// Copyright 2025 Cowboy AI, LLC.

//! Process-local persistence

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use crate::errors::{TradeError, TradeResult};
use crate::persistence::PersistenceProvider;
use crate::sync::{read, write};

/// In-memory provider storing records as serialized JSON
///
/// Records are serialized on store and deserialized on load so callers never
/// share state with the stored copy. Clones share the same storage.
pub struct InMemoryPersistence<T> {
    storage: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> InMemoryPersistence<T> {
    /// Create an empty provider
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            _phantom: PhantomData,
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        read(&self.storage).len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for InMemoryPersistence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for InMemoryPersistence<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for InMemoryPersistence<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryPersistence")
            .field("records", &self.len())
            .finish()
    }
}

fn decode<T: DeserializeOwned>(id: &str, bytes: &[u8]) -> TradeResult<T> {
    serde_json::from_slice(bytes).map_err(|e| TradeError::persistence("load", id, e.to_string()))
}

impl<T> PersistenceProvider<T> for InMemoryPersistence<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self, id: &str) -> TradeResult<T> {
        let storage = read(&self.storage);
        let bytes = storage
            .get(id)
            .ok_or_else(|| TradeError::NotFound(format!("record {id}")))?;
        decode(id, bytes)
    }

    fn store(&self, id: &str, record: &T) -> TradeResult<()> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| TradeError::persistence("store", id, e.to_string()))?;
        write(&self.storage).insert(id.to_string(), bytes);
        Ok(())
    }

    fn delete(&self, id: &str) -> TradeResult<()> {
        write(&self.storage).remove(id);
        Ok(())
    }

    fn load_all(&self, ids: Option<&[String]>) -> TradeResult<BTreeMap<String, T>> {
        let storage = read(&self.storage);
        match ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| storage.get(id).map(|bytes| (id, bytes)))
                .map(|(id, bytes)| Ok((id.clone(), decode(id, bytes)?)))
                .collect(),
            None => storage
                .iter()
                .map(|(id, bytes)| Ok((id.clone(), decode(id, bytes)?)))
                .collect(),
        }
    }
}
