// Copyright 2025 Cowboy AI, LLC.

use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use crate::auditing::EventBus;
use crate::entity::{DataElementMarker, DataObjectMarker, EntityId, ModelClass, ModelEntity};
use crate::errors::{TradeError, TradeResult};
use crate::events::EventSource;
use crate::identifiers::ModelUrn;
use crate::instance::{DataElementInstance, DataObjectInstance};
use crate::model::DataObject;
use crate::state_machine::{InstanceState, LifecycleMachine, ModelEvent, ModelState, State, TransitionSubject};
use crate::sync::{read, write};

#[derive(Debug, Clone, Default)]
struct Identity {
    entity: String,
    object_name: String,
    name: String,
}

/// A typed leaf field definition belonging to exactly one [`DataObject`]
///
/// Elements are created INITIAL and must be made READY with
/// [`DataElement::initialize`] before they can be added to their object.
pub struct DataElement {
    id: EntityId<DataElementMarker>,
    object_id: EntityId<DataObjectMarker>,
    object: Weak<DataObject>,
    identity: RwLock<Identity>,
    content_type: Option<String>,
    data_type: Option<String>,
    lifecycle: LifecycleMachine<ModelState>,
    bus: Arc<EventBus>,
    self_ref: Weak<DataElement>,
}

impl DataElement {
    /// Create an element definition for `object`, in state INITIAL
    ///
    /// The element is not added to the object; see
    /// [`DataObject::add_data_element`].
    pub fn new(
        object: &Arc<DataObject>,
        name: impl Into<String>,
        content_type: Option<String>,
        data_type: Option<String>,
    ) -> Arc<Self> {
        let bus = object.bus().clone();
        let element = Arc::new_cyclic(|self_ref| Self {
            id: EntityId::new(),
            object_id: object.id(),
            object: Arc::downgrade(object),
            identity: RwLock::new(Identity {
                entity: object.entity(),
                object_name: object.name(),
                name: name.into(),
            }),
            content_type,
            data_type,
            lifecycle: LifecycleMachine::new(bus.config().transition_retries),
            bus,
            self_ref: self_ref.clone(),
        });
        element.lifecycle.initialize(&element.subject());
        element
    }

    /// Name of the element, empty once deleted
    pub fn name(&self) -> String {
        read(&self.identity).name.clone()
    }

    /// Owning entity (namespace)
    pub fn entity(&self) -> String {
        read(&self.identity).entity.clone()
    }

    /// Structural name of the element
    pub fn urn(&self) -> ModelUrn {
        let identity = read(&self.identity);
        ModelUrn::for_data_element(&identity.entity, &identity.object_name, &identity.name)
    }

    /// MIME type of the values this element holds
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Application level type of the values this element holds
    pub fn data_type(&self) -> Option<&str> {
        self.data_type.as_deref()
    }

    /// Id of the owning data object
    pub fn data_object_id(&self) -> EntityId<DataObjectMarker> {
        self.object_id
    }

    /// The owning data object, while it is alive
    pub fn data_object(&self) -> Option<Arc<DataObject>> {
        self.object.upgrade()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModelState {
        self.lifecycle.current().unwrap_or(ModelState::Initial)
    }

    /// Check if instances may be created
    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_in_state(ModelState::Ready)
    }

    /// INITIAL → READY
    pub fn initialize(&self) -> TradeResult<ModelState> {
        self.lifecycle.trigger(&self.subject(), ModelEvent::Ready)
    }

    /// READY → ARCHIVED
    pub fn archive(&self) -> TradeResult<ModelState> {
        self.lifecycle.trigger(&self.subject(), ModelEvent::Archive)
    }

    /// ARCHIVED → READY
    pub fn unarchive(&self) -> TradeResult<ModelState> {
        self.lifecycle.trigger(&self.subject(), ModelEvent::Unarchive)
    }

    /// Delete the element and clear its identity
    ///
    /// An element still listed by its object is removed from it.
    pub fn delete(&self) -> TradeResult<ModelState> {
        let state = self.lifecycle.trigger(&self.subject(), ModelEvent::Delete)?;
        *write(&self.identity) = Identity::default();
        if let Some(object) = self.object.upgrade() {
            object.forget_element(self.id);
        }
        Ok(state)
    }

    /// Create a runtime instance of this element inside `object_instance`
    ///
    /// Requires a READY element and a live instance of the owning object
    /// that has no instance of this element yet.
    pub fn instantiate(
        &self,
        object_instance: &Arc<DataObjectInstance>,
        created_by: impl Into<String>,
    ) -> TradeResult<Arc<DataElementInstance>> {
        if !self.is_ready() {
            return Err(self.modification_error(format!(
                "cannot instantiate a data element in state {}",
                self.state().name()
            )));
        }
        if object_instance.data_object().id() != self.object_id {
            return Err(self.modification_error(format!(
                "data object instance {} does not instantiate data object {}",
                object_instance.id(),
                self.object_id
            )));
        }
        if !matches!(
            object_instance.state(),
            InstanceState::Created | InstanceState::Initialized
        ) {
            return Err(self.modification_error(format!(
                "data object instance {} is {}",
                object_instance.id(),
                object_instance.state().name()
            )));
        }
        if object_instance.element_instance_of(self.id).is_some() {
            return Err(self.modification_error(format!(
                "data object instance {} already holds an instance of this element",
                object_instance.id()
            )));
        }
        let this = self
            .self_ref
            .upgrade()
            .ok_or_else(|| TradeError::NotFound(format!("data element {}", self.id)))?;
        DataElementInstance::new(&self.bus, this, object_instance, created_by.into())
    }

    fn modification_error(&self, reason: String) -> TradeError {
        TradeError::illegal_modification(ModelClass::DataElement.name(), self.id.to_string(), reason)
    }

    fn subject(&self) -> TransitionSubject<'_> {
        TransitionSubject {
            bus: &self.bus,
            model_class: ModelClass::DataElement,
            identifier: self.id.to_string(),
            source: self.self_ref.upgrade().map(EventSource::DataElement),
        }
    }
}

impl ModelEntity for DataElement {
    type IdType = DataElementMarker;

    fn id(&self) -> EntityId<DataElementMarker> {
        self.id
    }

    fn model_class(&self) -> ModelClass {
        ModelClass::DataElement
    }
}

impl fmt::Debug for DataElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataElement")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("object_id", &self.object_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TradeConfig;
    use std::collections::BTreeMap;

    fn object() -> Arc<DataObject> {
        let bus = Arc::new(EventBus::new(Arc::new(TradeConfig::default())));
        DataObject::new(&bus, "teamA", "orderData")
    }

    #[test]
    fn test_element_starts_initial_and_carries_types() {
        let object = object();
        let element = DataElement::new(
            &object,
            "amount",
            Some("text/plain".to_string()),
            Some("decimal".to_string()),
        );
        assert_eq!(element.state(), ModelState::Initial);
        assert_eq!(element.content_type(), Some("text/plain"));
        assert_eq!(element.data_type(), Some("decimal"));
        assert_eq!(element.urn().to_string(), "urn:teamA:orderData$/:amount");
        assert_eq!(element.data_object().unwrap().id(), object.id());
    }

    #[test]
    fn test_initialize_twice_is_illegal() {
        let element = DataElement::new(&object(), "amount", None, None);
        assert_eq!(element.initialize().unwrap(), ModelState::Ready);
        assert!(matches!(
            element.initialize().unwrap_err(),
            TradeError::IllegalTransition { .. }
        ));
    }

    #[test]
    fn test_direct_delete_detaches_from_object() {
        let object = object();
        let element = DataElement::new(&object, "amount", None, None);
        element.initialize().unwrap();
        object.add_data_element(&element).unwrap();

        element.delete().unwrap();
        assert_eq!(element.name(), "");
        assert!(object.data_elements().is_empty());
        assert_eq!(object.state(), ModelState::Initial);
    }

    #[test]
    fn test_instantiate_checks_owner_and_duplicates() {
        let object = object();
        let amount = DataElement::new(&object, "amount", None, None);
        amount.initialize().unwrap();
        object.add_data_element(&amount).unwrap();
        let instance = object.instantiate("process-1", BTreeMap::new()).unwrap();

        let element_instance = amount.instantiate(&instance, "process-1").unwrap();
        assert_eq!(element_instance.state(), InstanceState::Created);
        assert!(amount.instantiate(&instance, "process-1").is_err());

        let other = DataObject::new(object.bus(), "teamA", "invoice");
        let total = DataElement::new(&other, "total", None, None);
        total.initialize().unwrap();
        other.add_data_element(&total).unwrap();
        assert!(total.instantiate(&instance, "process-1").is_err());
    }

    #[test]
    fn test_archived_element_cannot_be_instantiated() {
        let object = object();
        let amount = DataElement::new(&object, "amount", None, None);
        amount.initialize().unwrap();
        object.add_data_element(&amount).unwrap();
        let instance = object.instantiate("process-1", BTreeMap::new()).unwrap();

        amount.archive().unwrap();
        assert!(amount.instantiate(&instance, "process-1").unwrap_err().is_lifecycle_error());
        amount.unarchive().unwrap();
        assert!(amount.instantiate(&instance, "process-1").is_ok());
    }
}
