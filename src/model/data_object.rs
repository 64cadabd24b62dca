// Copyright 2025 Cowboy AI, LLC.

use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::warn;

use crate::auditing::EventBus;
use crate::entity::{
    DataElementMarker, DataModelMarker, DataObjectMarker, EntityId, ModelClass, ModelEntity,
};
use crate::errors::{TradeError, TradeResult};
use crate::events::EventSource;
use crate::identifiers::ModelUrn;
use crate::instance::DataObjectInstance;
use crate::model::DataElement;
use crate::state_machine::{LifecycleMachine, ModelEvent, ModelState, State, TransitionSubject};
use crate::sync::{lock, read, write};

#[derive(Debug, Clone, Default)]
struct Identity {
    entity: String,
    name: String,
}

/// A named container definition for structured data within a choreography
/// entity
///
/// A data object owns an ordered set of [`DataElement`]s, unique by name. It
/// becomes READY with its first READY element and falls back to INITIAL when
/// the last element is removed.
pub struct DataObject {
    id: EntityId<DataObjectMarker>,
    model_id: Option<EntityId<DataModelMarker>>,
    identity: RwLock<Identity>,
    elements: Mutex<IndexMap<String, Arc<DataElement>>>,
    lifecycle: LifecycleMachine<ModelState>,
    bus: Arc<EventBus>,
    self_ref: Weak<DataObject>,
}

impl DataObject {
    /// Create a free-standing data object in state INITIAL
    pub fn new(bus: &Arc<EventBus>, entity: impl Into<String>, name: impl Into<String>) -> Arc<Self> {
        Self::build(bus, None, entity.into(), name.into())
    }

    pub(crate) fn new_in_model(
        bus: &Arc<EventBus>,
        model_id: EntityId<DataModelMarker>,
        entity: impl Into<String>,
        name: impl Into<String>,
    ) -> Arc<Self> {
        Self::build(bus, Some(model_id), entity.into(), name.into())
    }

    fn build(
        bus: &Arc<EventBus>,
        model_id: Option<EntityId<DataModelMarker>>,
        entity: String,
        name: String,
    ) -> Arc<Self> {
        let object = Arc::new_cyclic(|self_ref| Self {
            id: EntityId::new(),
            model_id,
            identity: RwLock::new(Identity { entity, name }),
            elements: Mutex::new(IndexMap::new()),
            lifecycle: LifecycleMachine::new(bus.config().transition_retries),
            bus: bus.clone(),
            self_ref: self_ref.clone(),
        });
        object.lifecycle.initialize(&object.subject());
        object
    }

    /// Owning entity (namespace) of the object
    pub fn entity(&self) -> String {
        read(&self.identity).entity.clone()
    }

    /// Name of the object, empty once deleted
    pub fn name(&self) -> String {
        read(&self.identity).name.clone()
    }

    /// Structural name of the object
    pub fn urn(&self) -> ModelUrn {
        let identity = read(&self.identity);
        ModelUrn::for_data_object(&identity.entity, &identity.name)
    }

    /// The data model this object was compiled into, if any
    pub fn model_id(&self) -> Option<EntityId<DataModelMarker>> {
        self.model_id
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModelState {
        self.lifecycle.current().unwrap_or(ModelState::Initial)
    }

    /// Check if instances may be created
    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_in_state(ModelState::Ready)
    }

    /// Owned elements, in insertion order
    pub fn data_elements(&self) -> Vec<Arc<DataElement>> {
        lock(&self.elements).values().cloned().collect()
    }

    /// Owned element by name
    pub fn data_element(&self, name: &str) -> Option<Arc<DataElement>> {
        lock(&self.elements).get(name).cloned()
    }

    /// Add a READY element created for this object
    ///
    /// Rejected unless this object is INITIAL or READY, the element is READY,
    /// belongs to this object and its name is not taken yet. Adding the
    /// first element makes the object READY.
    pub fn add_data_element(&self, element: &Arc<DataElement>) -> TradeResult<()> {
        {
            let mut elements = lock(&self.elements);
            self.require_editable("add a data element")?;
            if element.data_object_id() != self.id {
                return Err(self.modification_error(format!(
                    "data element {} belongs to data object {}",
                    element.id(),
                    element.data_object_id()
                )));
            }
            if element.state() != ModelState::Ready {
                return Err(self.modification_error(format!(
                    "data element '{}' is {}, not READY",
                    element.name(),
                    element.state().name()
                )));
            }
            let name = element.name();
            if elements.contains_key(&name) {
                return Err(self.modification_error(format!(
                    "a data element named '{name}' already exists"
                )));
            }
            elements.insert(name, element.clone());
        }
        self.reconcile_readiness()
    }

    /// Remove and delete an owned element
    ///
    /// Removing the last element makes a READY object INITIAL again.
    pub fn delete_data_element(&self, element: &Arc<DataElement>) -> TradeResult<()> {
        let removed = {
            let mut elements = lock(&self.elements);
            self.require_editable("delete a data element")?;
            let position = elements
                .values()
                .position(|candidate| candidate.id() == element.id())
                .ok_or_else(|| {
                    TradeError::NotFound(format!(
                        "data element {} in data object {}",
                        element.id(),
                        self.id
                    ))
                })?;
            elements.shift_remove_index(position).map(|(_, removed)| removed)
        };
        if let Some(removed) = removed {
            if removed.state() != ModelState::Deleted {
                removed.delete()?;
            }
        }
        self.reconcile_readiness()
    }

    /// READY → ARCHIVED
    pub fn archive(&self) -> TradeResult<ModelState> {
        self.lifecycle.trigger(&self.subject(), ModelEvent::Archive)
    }

    /// ARCHIVED → READY
    pub fn unarchive(&self) -> TradeResult<ModelState> {
        self.lifecycle.trigger(&self.subject(), ModelEvent::Unarchive)
    }

    /// Delete all owned elements, then this object, then clear its identity
    ///
    /// The cascade is a sequence of independent transitions; a failure
    /// deleting one element is logged and does not stop the others.
    pub fn delete(&self) -> TradeResult<ModelState> {
        if self.lifecycle.is_in_state(ModelState::Deleted) {
            return self.lifecycle.trigger(&self.subject(), ModelEvent::Delete);
        }
        let elements: Vec<_> = lock(&self.elements).drain(..).map(|(_, e)| e).collect();
        for element in elements {
            if element.state() == ModelState::Deleted {
                continue;
            }
            if let Err(e) = element.delete() {
                warn!(data_object = %self.id, data_element = %element.id(), error = %e, "cascade delete of data element failed");
            }
        }
        let state = self.lifecycle.trigger(&self.subject(), ModelEvent::Delete)?;
        *write(&self.identity) = Identity::default();
        Ok(state)
    }

    /// Create a runtime instance of this object
    ///
    /// Only READY objects can be instantiated. The instance starts CREATED.
    pub fn instantiate(
        &self,
        created_by: impl Into<String>,
        correlation_properties: BTreeMap<String, String>,
    ) -> TradeResult<Arc<DataObjectInstance>> {
        if !self.is_ready() {
            return Err(self.modification_error(format!(
                "cannot instantiate a data object in state {}",
                self.state().name()
            )));
        }
        let this = self
            .self_ref
            .upgrade()
            .ok_or_else(|| TradeError::NotFound(format!("data object {}", self.id)))?;
        Ok(DataObjectInstance::new(
            &self.bus,
            this,
            created_by.into(),
            correlation_properties,
        ))
    }

    pub(crate) fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub(crate) fn forget_element(&self, element_id: EntityId<DataElementMarker>) {
        let removed = {
            let mut elements = lock(&self.elements);
            let before = elements.len();
            elements.retain(|_, element| element.id() != element_id);
            before != elements.len()
        };
        if removed {
            if let Err(e) = self.reconcile_readiness() {
                warn!(data_object = %self.id, error = %e, "readiness update after element removal failed");
            }
        }
    }

    fn reconcile_readiness(&self) -> TradeResult<()> {
        let has_elements = !lock(&self.elements).is_empty();
        match (self.state(), has_elements) {
            (ModelState::Initial, true) => self.lifecycle.trigger(&self.subject(), ModelEvent::Ready).map(|_| ()),
            (ModelState::Ready, false) => self.lifecycle.trigger(&self.subject(), ModelEvent::Initial).map(|_| ()),
            _ => Ok(()),
        }
    }

    fn require_editable(&self, action: &str) -> TradeResult<()> {
        match self.state() {
            ModelState::Initial | ModelState::Ready => Ok(()),
            other => Err(self.modification_error(format!(
                "cannot {action} while {}",
                other.name()
            ))),
        }
    }

    fn modification_error(&self, reason: String) -> TradeError {
        TradeError::illegal_modification(ModelClass::DataObject.name(), self.id.to_string(), reason)
    }

    fn subject(&self) -> TransitionSubject<'_> {
        TransitionSubject {
            bus: &self.bus,
            model_class: ModelClass::DataObject,
            identifier: self.id.to_string(),
            source: self.self_ref.upgrade().map(EventSource::DataObject),
        }
    }
}

impl ModelEntity for DataObject {
    type IdType = DataObjectMarker;

    fn id(&self) -> EntityId<DataObjectMarker> {
        self.id
    }

    fn model_class(&self) -> ModelClass {
        ModelClass::DataObject
    }
}

impl fmt::Debug for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataObject")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}
