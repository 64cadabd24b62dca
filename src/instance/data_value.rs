// Copyright 2025 Cowboy AI, LLC.

use bytes::Bytes;
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::warn;

use crate::auditing::EventBus;
use crate::entity::{DataElementInstanceMarker, DataValueMarker, EntityId, ModelClass, ModelEntity};
use crate::errors::{TradeError, TradeResult};
use crate::events::{EventSource, TradeEvent};
use crate::instance::{is_live, settle, DataElementInstance};
use crate::state_machine::{InstanceEvent, InstanceState, LifecycleMachine, State, TransitionSubject};
use crate::sync::{lock, read, write};

/// An opaque blob of application data
///
/// A value is INITIALIZED while it holds non-empty data. It can back several
/// [`DataElementInstance`]s; it only keeps weak back references to them.
pub struct DataValue {
    id: EntityId<DataValueMarker>,
    owner: RwLock<String>,
    content_type: Option<String>,
    data_type: Option<String>,
    data: RwLock<Option<Bytes>>,
    // Held across a data write and the state change it implies
    writer: Mutex<()>,
    associations: Mutex<IndexMap<EntityId<DataElementInstanceMarker>, Weak<DataElementInstance>>>,
    lifecycle: LifecycleMachine<InstanceState>,
    bus: Arc<EventBus>,
    self_ref: Weak<DataValue>,
}

impl DataValue {
    /// Create an empty value in state CREATED
    pub fn new(
        bus: &Arc<EventBus>,
        owner: impl Into<String>,
        content_type: Option<String>,
        data_type: Option<String>,
    ) -> Arc<Self> {
        let value = Arc::new_cyclic(|self_ref| Self {
            id: EntityId::new(),
            owner: RwLock::new(owner.into()),
            content_type,
            data_type,
            data: RwLock::new(None),
            writer: Mutex::new(()),
            associations: Mutex::new(IndexMap::new()),
            lifecycle: LifecycleMachine::new(bus.config().transition_retries),
            bus: bus.clone(),
            self_ref: self_ref.clone(),
        });
        value.lifecycle.initialize(&value.subject());
        value
    }

    /// Who created the value
    pub fn owner(&self) -> String {
        read(&self.owner).clone()
    }

    /// MIME type of the data
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Application level type of the data
    pub fn data_type(&self) -> Option<&str> {
        self.data_type.as_deref()
    }

    /// Current lifecycle state
    pub fn state(&self) -> InstanceState {
        self.lifecycle.current().unwrap_or(InstanceState::Created)
    }

    /// Check if the value holds data
    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_in_state(InstanceState::Initialized)
    }

    /// Current data
    pub fn data(&self) -> Option<Bytes> {
        read(&self.data).clone()
    }

    /// Size of the current data in bytes
    pub fn size(&self) -> usize {
        read(&self.data).as_ref().map_or(0, Bytes::len)
    }

    /// Replace the data
    ///
    /// Non-empty data initializes the value, empty or absent data reverts it
    /// to CREATED. Every associated element instance follows, then a data
    /// change event is fired. Writers to one value are serialized, so a
    /// state change listener must not write to the value it observes.
    pub fn set_data(&self, data: Option<Bytes>) -> TradeResult<InstanceState> {
        let size = data.as_ref().map_or(0, Bytes::len);
        {
            let _writer = lock(&self.writer);
            if !is_live(self.state()) {
                return Err(TradeError::illegal_modification(
                    ModelClass::DataValue.name(),
                    self.id.to_string(),
                    format!("cannot change data while {}", self.state().name()),
                ));
            }
            *write(&self.data) = data.filter(|d| !d.is_empty());
            let holds_data = read(&self.data).is_some();
            settle(&self.lifecycle, &self.subject(), holds_data)?;
        }

        for instance in self.associated_instances() {
            if let Err(e) = instance.refresh_from_value() {
                warn!(data_value = %self.id, data_element_instance = %instance.id(), error = %e, "state propagation to data element instance failed");
            }
        }

        self.bus.fire_event(&TradeEvent::data_changed(
            self.id.to_string(),
            self.self_ref.upgrade().map(EventSource::DataValue),
            size,
        ));
        Ok(self.state())
    }

    /// Live element instances backed by this value, in association order
    pub fn associated_instances(&self) -> Vec<Arc<DataElementInstance>> {
        lock(&self.associations)
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Ids of the associated element instances
    pub fn associated_instance_ids(&self) -> Vec<EntityId<DataElementInstanceMarker>> {
        lock(&self.associations).keys().copied().collect()
    }

    pub(crate) fn add_association(&self, instance: &Arc<DataElementInstance>) {
        let added = lock(&self.associations)
            .insert(instance.id(), Arc::downgrade(instance))
            .is_none();
        if added {
            self.fire_association_changed(instance.id(), true);
        }
    }

    pub(crate) fn remove_association(&self, instance_id: EntityId<DataElementInstanceMarker>) {
        let removed = lock(&self.associations).shift_remove(&instance_id).is_some();
        if removed {
            self.fire_association_changed(instance_id, false);
        }
    }

    /// INITIALIZED → ARCHIVED
    pub fn archive(&self) -> TradeResult<InstanceState> {
        self.lifecycle.trigger(&self.subject(), InstanceEvent::Archive)
    }

    /// ARCHIVED → INITIALIZED
    pub fn unarchive(&self) -> TradeResult<InstanceState> {
        self.lifecycle.trigger(&self.subject(), InstanceEvent::Unarchive)
    }

    /// Release every associated element instance, delete the value and
    /// drop its data
    pub fn delete(&self) -> TradeResult<InstanceState> {
        if self.lifecycle.is_in_state(InstanceState::Deleted) {
            return self.lifecycle.trigger(&self.subject(), InstanceEvent::Delete);
        }
        let released: Vec<_> = lock(&self.associations).drain(..).collect();
        for (instance_id, instance) in released {
            self.fire_association_changed(instance_id, false);
            if let Some(instance) = instance.upgrade() {
                instance.release_value(self.id);
            }
        }
        let _writer = lock(&self.writer);
        let state = self.lifecycle.trigger(&self.subject(), InstanceEvent::Delete)?;
        *write(&self.data) = None;
        write(&self.owner).clear();
        Ok(state)
    }

    fn fire_association_changed(&self, instance_id: EntityId<DataElementInstanceMarker>, associated: bool) {
        self.bus.fire_event(&TradeEvent::association_changed(
            self.id.to_string(),
            self.self_ref.upgrade().map(EventSource::DataValue),
            instance_id.to_string(),
            associated,
        ));
    }

    fn subject(&self) -> TransitionSubject<'_> {
        TransitionSubject {
            bus: &self.bus,
            model_class: ModelClass::DataValue,
            identifier: self.id.to_string(),
            source: self.self_ref.upgrade().map(EventSource::DataValue),
        }
    }
}

impl ModelEntity for DataValue {
    type IdType = DataValueMarker;

    fn id(&self) -> EntityId<DataValueMarker> {
        self.id
    }

    fn model_class(&self) -> ModelClass {
        ModelClass::DataValue
    }
}

impl fmt::Debug for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataValue")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("size", &self.size())
            .field("associations", &lock(&self.associations).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auditing::tests::RecordingListener;
    use crate::config::TradeConfig;
    use crate::events::EventKind;

    fn bus() -> Arc<EventBus> {
        Arc::new(EventBus::new(Arc::new(TradeConfig::default())))
    }

    #[test]
    fn test_data_drives_state() {
        let value = DataValue::new(&bus(), "process-1", Some("text/plain".to_string()), None);
        assert_eq!(value.state(), InstanceState::Created);

        assert_eq!(
            value.set_data(Some(Bytes::from_static(b"100"))).unwrap(),
            InstanceState::Initialized
        );
        assert_eq!(value.size(), 3);
        assert_eq!(value.data().unwrap(), Bytes::from_static(b"100"));

        // Replacing data keeps the value initialized
        value.set_data(Some(Bytes::from_static(b"2500"))).unwrap();
        assert_eq!(value.state(), InstanceState::Initialized);

        assert_eq!(value.set_data(Some(Bytes::new())).unwrap(), InstanceState::Created);
        assert_eq!(value.data(), None);
        assert_eq!(value.size(), 0);
    }

    #[test]
    fn test_set_data_fires_data_event_with_size() {
        let bus = bus();
        let recorder = Arc::new(RecordingListener::new("recorder"));
        bus.register_listener(recorder.clone()).unwrap();
        let value = DataValue::new(&bus, "process-1", None, None);

        value.set_data(Some(Bytes::from_static(b"hello"))).unwrap();
        let last = recorder.last().unwrap();
        assert_eq!(last.kind(), EventKind::Data);
        assert_eq!(last.property("Size").as_deref(), Some("5"));
        assert_eq!(last.source().and_then(|s| s.as_data_value()).map(|v| v.id()), Some(value.id()));
    }

    #[test]
    fn test_archived_value_rejects_data() {
        let value = DataValue::new(&bus(), "process-1", None, None);
        value.set_data(Some(Bytes::from_static(b"1"))).unwrap();
        value.archive().unwrap();

        let err = value.set_data(None).unwrap_err();
        assert!(matches!(err, TradeError::IllegalModification { .. }));
        assert_eq!(value.size(), 1);

        value.unarchive().unwrap();
        assert_eq!(value.state(), InstanceState::Initialized);
    }

    #[test]
    fn test_concurrent_writers_keep_state_and_data_in_step() {
        let bus = bus();
        for _ in 0..500 {
            let value = DataValue::new(&bus, "process-1", None, None);
            std::thread::scope(|scope| {
                scope.spawn(|| value.set_data(Some(Bytes::from_static(b"x"))).unwrap());
                scope.spawn(|| value.set_data(None).unwrap());
            });
            assert_eq!(value.is_initialized(), value.data().is_some());
        }
    }

    #[test]
    fn test_delete_clears_data() {
        let value = DataValue::new(&bus(), "process-1", None, None);
        value.set_data(Some(Bytes::from_static(b"1"))).unwrap();
        assert_eq!(value.delete().unwrap(), InstanceState::Deleted);
        assert_eq!(value.data(), None);
        assert_eq!(value.owner(), "");
        assert!(value.delete().is_err());
    }
}
