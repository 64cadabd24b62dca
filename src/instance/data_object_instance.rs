// Copyright 2025 Cowboy AI, LLC.

use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::warn;

use crate::auditing::EventBus;
use crate::config::InitializationPolicy;
use crate::entity::{
    DataElementInstanceMarker, DataElementMarker, DataObjectInstanceMarker, EntityId, ModelClass,
    ModelEntity,
};
use crate::errors::{TradeError, TradeResult};
use crate::events::EventSource;
use crate::instance::{is_live, settle, DataElementInstance};
use crate::model::DataObject;
use crate::state_machine::{InstanceEvent, InstanceState, LifecycleMachine, State, TransitionSubject};
use crate::sync::{lock, read, write};

#[derive(Debug, Clone, Default)]
struct Details {
    created_by: String,
    correlation_properties: BTreeMap<String, String>,
}

/// Runtime occurrence of a [`DataObject`], created per choreography
/// execution
///
/// Whether the instance is INITIALIZED is derived from its element
/// instances according to the configured [`InitializationPolicy`].
pub struct DataObjectInstance {
    id: EntityId<DataObjectInstanceMarker>,
    object: Arc<DataObject>,
    details: RwLock<Details>,
    element_instances: Mutex<IndexMap<EntityId<DataElementInstanceMarker>, Arc<DataElementInstance>>>,
    policy: InitializationPolicy,
    lifecycle: LifecycleMachine<InstanceState>,
    bus: Arc<EventBus>,
    self_ref: Weak<DataObjectInstance>,
}

impl DataObjectInstance {
    pub(crate) fn new(
        bus: &Arc<EventBus>,
        object: Arc<DataObject>,
        created_by: String,
        correlation_properties: BTreeMap<String, String>,
    ) -> Arc<Self> {
        let instance = Arc::new_cyclic(|self_ref| Self {
            id: EntityId::new(),
            object,
            details: RwLock::new(Details {
                created_by,
                correlation_properties,
            }),
            element_instances: Mutex::new(IndexMap::new()),
            policy: bus.config().instance_initialization,
            lifecycle: LifecycleMachine::new(bus.config().transition_retries),
            bus: bus.clone(),
            self_ref: self_ref.clone(),
        });
        instance.lifecycle.initialize(&instance.subject());
        instance
    }

    /// The instantiated object
    pub fn data_object(&self) -> &Arc<DataObject> {
        &self.object
    }

    /// Who created the instance
    pub fn created_by(&self) -> String {
        read(&self.details).created_by.clone()
    }

    /// Properties correlating this instance with a choreography execution
    pub fn correlation_properties(&self) -> BTreeMap<String, String> {
        read(&self.details).correlation_properties.clone()
    }

    /// One correlation property
    pub fn correlation_property(&self, key: &str) -> Option<String> {
        read(&self.details).correlation_properties.get(key).cloned()
    }

    /// Current lifecycle state
    pub fn state(&self) -> InstanceState {
        self.lifecycle.current().unwrap_or(InstanceState::Created)
    }

    /// Check if the initialization policy is satisfied
    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_in_state(InstanceState::Initialized)
    }

    /// Owned element instances, in creation order
    pub fn data_element_instances(&self) -> Vec<Arc<DataElementInstance>> {
        lock(&self.element_instances).values().cloned().collect()
    }

    /// The owned instance of element `element_id`
    pub fn element_instance_of(
        &self,
        element_id: EntityId<DataElementMarker>,
    ) -> Option<Arc<DataElementInstance>> {
        lock(&self.element_instances)
            .values()
            .find(|instance| instance.data_element().id() == element_id)
            .cloned()
    }

    pub(crate) fn attach(&self, instance: &Arc<DataElementInstance>) -> TradeResult<()> {
        {
            let mut instances = lock(&self.element_instances);
            if !is_live(self.state()) {
                return Err(self.modification_error(format!(
                    "cannot add element instances while {}",
                    self.state().name()
                )));
            }
            let element_id = instance.data_element().id();
            if instances
                .values()
                .any(|existing| existing.data_element().id() == element_id)
            {
                return Err(self.modification_error(format!(
                    "an instance of data element {element_id} already exists"
                )));
            }
            instances.insert(instance.id(), instance.clone());
        }
        self.reevaluate()
    }

    pub(crate) fn detach(&self, instance_id: EntityId<DataElementInstanceMarker>) {
        lock(&self.element_instances).shift_remove(&instance_id);
    }

    /// Apply the initialization policy to the current element instances
    pub(crate) fn reevaluate(&self) -> TradeResult<()> {
        let states: Vec<InstanceState> = self
            .data_element_instances()
            .iter()
            .map(|instance| instance.state())
            .filter(|state| *state != InstanceState::Deleted)
            .collect();
        // An archived element instance keeps its data
        let holds_data =
            |state: &InstanceState| matches!(state, InstanceState::Initialized | InstanceState::Archived);
        let satisfied = match self.policy {
            InitializationPolicy::AllElements => !states.is_empty() && states.iter().all(holds_data),
            InitializationPolicy::AnyElement => states.iter().any(holds_data),
        };
        settle(&self.lifecycle, &self.subject(), satisfied)
    }

    /// INITIALIZED → ARCHIVED
    pub fn archive(&self) -> TradeResult<InstanceState> {
        self.lifecycle.trigger(&self.subject(), InstanceEvent::Archive)
    }

    /// ARCHIVED → INITIALIZED
    pub fn unarchive(&self) -> TradeResult<InstanceState> {
        self.lifecycle.trigger(&self.subject(), InstanceEvent::Unarchive)
    }

    /// Delete every element instance, then this instance, then clear its
    /// creator and correlation properties
    pub fn delete(&self) -> TradeResult<InstanceState> {
        if self.lifecycle.is_in_state(InstanceState::Deleted) {
            return self.lifecycle.trigger(&self.subject(), InstanceEvent::Delete);
        }
        let children: Vec<_> = lock(&self.element_instances)
            .drain(..)
            .map(|(_, instance)| instance)
            .collect();
        for child in children {
            if child.state() == InstanceState::Deleted {
                continue;
            }
            if let Err(e) = child.delete_cascaded() {
                warn!(data_object_instance = %self.id, data_element_instance = %child.id(), error = %e, "cascade delete of data element instance failed");
            }
        }
        let state = self.lifecycle.trigger(&self.subject(), InstanceEvent::Delete)?;
        *write(&self.details) = Details::default();
        Ok(state)
    }

    fn modification_error(&self, reason: String) -> TradeError {
        TradeError::illegal_modification(
            ModelClass::DataObjectInstance.name(),
            self.id.to_string(),
            reason,
        )
    }

    fn subject(&self) -> TransitionSubject<'_> {
        TransitionSubject {
            bus: &self.bus,
            model_class: ModelClass::DataObjectInstance,
            identifier: self.id.to_string(),
            source: self.self_ref.upgrade().map(EventSource::DataObjectInstance),
        }
    }
}

impl ModelEntity for DataObjectInstance {
    type IdType = DataObjectInstanceMarker;

    fn id(&self) -> EntityId<DataObjectInstanceMarker> {
        self.id
    }

    fn model_class(&self) -> ModelClass {
        ModelClass::DataObjectInstance
    }
}

impl fmt::Debug for DataObjectInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataObjectInstance")
            .field("id", &self.id)
            .field("object", &self.object.id())
            .field("state", &self.state())
            .field("element_instances", &lock(&self.element_instances).len())
            .finish()
    }
}
