// Copyright 2025 Cowboy AI, LLC.

//! Data value management
//!
//! The [`DataValueManager`] is the entry point for moving application data in
//! and out of the middleware. It owns every [`DataValue`] it creates, keeps a
//! persisted [`DataValueRecord`] per value and reports each push, pull and
//! delete as a data handling event.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::auditing::EventBus;
use crate::entity::{DataValueMarker, EntityId, ModelEntity};
use crate::errors::{TradeError, TradeResult};
use crate::events::{DataOperation, EventSource, TradeEvent};
use crate::instance::DataValue;
use crate::persistence::PersistenceProvider;
use crate::state_machine::InstanceState;

/// Persisted form of a data value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DataValueRecord {
    /// Data value id
    pub id: String,
    /// Who created the value
    pub owner: String,
    /// MIME type of the data
    pub content_type: Option<String>,
    /// Application type of the data
    pub data_type: Option<String>,
    /// The data, absent while the value is empty
    pub data: Option<Vec<u8>>,
    /// When the data was last pushed
    pub updated_at: DateTime<Utc>,
}

impl DataValueRecord {
    fn of(value: &DataValue) -> Self {
        Self {
            id: value.id().to_string(),
            owner: value.owner(),
            content_type: value.content_type().map(str::to_string),
            data_type: value.data_type().map(str::to_string),
            data: value.data().map(|d| d.to_vec()),
            updated_at: Utc::now(),
        }
    }
}

/// Creates data values and moves data in and out of them
pub struct DataValueManager {
    bus: Arc<EventBus>,
    store: Arc<dyn PersistenceProvider<DataValueRecord>>,
    values: DashMap<EntityId<DataValueMarker>, Arc<DataValue>>,
}

impl DataValueManager {
    /// Create a manager persisting records in `store`
    pub fn new(bus: Arc<EventBus>, store: Arc<dyn PersistenceProvider<DataValueRecord>>) -> Self {
        Self {
            bus,
            store,
            values: DashMap::new(),
        }
    }

    /// Create an empty data value and persist its record
    pub fn create_data_value(
        &self,
        owner: impl Into<String>,
        content_type: Option<String>,
        data_type: Option<String>,
    ) -> TradeResult<Arc<DataValue>> {
        let value = DataValue::new(&self.bus, owner, content_type, data_type);
        self.store.store(&value.id().to_string(), &DataValueRecord::of(&value))?;
        self.values.insert(value.id(), value.clone());
        debug!(data_value = %value.id(), "created data value");
        Ok(value)
    }

    /// A managed data value
    pub fn get(&self, id: EntityId<DataValueMarker>) -> TradeResult<Arc<DataValue>> {
        self.values
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TradeError::NotFound(format!("data value {id}")))
    }

    /// Managed data values
    pub fn values(&self) -> Vec<Arc<DataValue>> {
        self.values.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Replace the data of a value
    ///
    /// The record is persisted after the value accepted the data; the data
    /// handling event follows the data change event fired by the value.
    pub fn push_data(&self, id: EntityId<DataValueMarker>, data: Bytes) -> TradeResult<()> {
        let value = self.get(id)?;
        let size = data.len();
        value.set_data(Some(data))?;
        self.store.store(&id.to_string(), &DataValueRecord::of(&value))?;
        self.fire(&value, DataOperation::Push, size);
        Ok(())
    }

    /// Read the data of a value; an empty value yields empty bytes
    pub fn pull_data(&self, id: EntityId<DataValueMarker>) -> TradeResult<Bytes> {
        let value = self.get(id)?;
        let data = value.data().unwrap_or_default();
        self.fire(&value, DataOperation::Pull, data.len());
        Ok(data)
    }

    /// Delete a value, its associations and its record
    ///
    /// A value that was already deleted directly is still dropped from the
    /// manager together with its record; the failed transition is returned.
    pub fn delete_data_value(&self, id: EntityId<DataValueMarker>) -> TradeResult<()> {
        let value = self.get(id)?;
        let size = value.size();
        let deleted = value.delete();
        if value.state() == InstanceState::Deleted {
            self.values.remove(&id);
            self.store.delete(&id.to_string())?;
        }
        deleted?;
        self.fire(&value, DataOperation::Delete, size);
        info!(data_value = %id, "deleted data value");
        Ok(())
    }

    fn fire(&self, value: &Arc<DataValue>, operation: DataOperation, size: usize) {
        self.bus.fire_event(&TradeEvent::data_handling(
            value.identifier(),
            Some(EventSource::DataValue(value.clone())),
            operation,
            size,
        ));
    }
}

impl std::fmt::Debug for DataValueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataValueManager")
            .field("values", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auditing::tests::RecordingListener;
    use crate::config::TradeConfig;
    use crate::events::EventKind;
    use crate::persistence::InMemoryPersistence;
    use pretty_assertions::assert_eq;

    struct Fixture {
        manager: DataValueManager,
        store: InMemoryPersistence<DataValueRecord>,
        recorder: Arc<RecordingListener>,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(EventBus::new(Arc::new(TradeConfig::default())));
        let recorder = Arc::new(RecordingListener::new("recorder"));
        bus.register_listener(recorder.clone()).unwrap();
        let store = InMemoryPersistence::new();
        Fixture {
            manager: DataValueManager::new(bus, Arc::new(store.clone())),
            store,
            recorder,
        }
    }

    fn handling(recorder: &RecordingListener) -> Vec<(String, String)> {
        recorder
            .events()
            .iter()
            .filter(|e| e.kind() == EventKind::DataHandling)
            .map(|e| {
                (
                    e.property("Operation").unwrap_or_default(),
                    e.property("Size").unwrap_or_default(),
                )
            })
            .collect()
    }

    #[test]
    fn test_push_and_pull() {
        let f = fixture();
        let value = f
            .manager
            .create_data_value("process-1", Some("text/plain".to_string()), None)
            .unwrap();

        f.manager.push_data(value.id(), Bytes::from_static(b"hello")).unwrap();
        assert_eq!(value.state(), InstanceState::Initialized);
        assert_eq!(f.manager.pull_data(value.id()).unwrap(), Bytes::from_static(b"hello"));

        let record = f.store.load(&value.id().to_string()).unwrap();
        assert_eq!(record.data.as_deref(), Some(&b"hello"[..]));
        assert_eq!(record.content_type.as_deref(), Some("text/plain"));
        assert_eq!(
            handling(&f.recorder),
            vec![
                ("Push".to_string(), "5".to_string()),
                ("Pull".to_string(), "5".to_string())
            ]
        );
    }

    #[test]
    fn test_pull_from_empty_value() {
        let f = fixture();
        let value = f.manager.create_data_value("process-1", None, None).unwrap();
        assert!(f.manager.pull_data(value.id()).unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_record() {
        let f = fixture();
        let value = f.manager.create_data_value("process-1", None, None).unwrap();
        f.manager.push_data(value.id(), Bytes::from_static(b"abc")).unwrap();

        f.manager.delete_data_value(value.id()).unwrap();
        assert_eq!(value.state(), InstanceState::Deleted);
        assert!(f.store.is_empty());
        assert!(f.manager.get(value.id()).unwrap_err().is_not_found());
        assert_eq!(handling(&f.recorder).last().unwrap().0, "Delete");

        let err = f
            .manager
            .push_data(value.id(), Bytes::from_static(b"x"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_directly_deleted_value_leaves_no_record() {
        let f = fixture();
        let value = f.manager.create_data_value("process-1", None, None).unwrap();
        value.delete().unwrap();

        let err = f.manager.delete_data_value(value.id()).unwrap_err();
        assert!(err.is_lifecycle_error());
        assert!(f.store.is_empty());
        assert!(f.manager.get(value.id()).unwrap_err().is_not_found());
        assert!(f
            .manager
            .delete_data_value(value.id())
            .unwrap_err()
            .is_not_found());
        assert!(handling(&f.recorder).is_empty());
    }

    #[test]
    fn test_rejected_push_is_not_persisted() {
        let f = fixture();
        let value = f.manager.create_data_value("process-1", None, None).unwrap();
        f.manager.push_data(value.id(), Bytes::from_static(b"abc")).unwrap();
        value.archive().unwrap();
        assert!(f
            .manager
            .push_data(value.id(), Bytes::from_static(b"defg"))
            .is_err());
        assert_eq!(
            f.store.load(&value.id().to_string()).unwrap().data.as_deref(),
            Some(&b"abc"[..])
        );
        assert_eq!(handling(&f.recorder).len(), 1);
    }
}
