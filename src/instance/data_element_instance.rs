// Copyright 2025 Cowboy AI, LLC.

use std::fmt;
use std::sync::{Arc, RwLock, Weak};
use tracing::warn;

use crate::auditing::EventBus;
use crate::entity::{
    DataElementInstanceMarker, DataObjectInstanceMarker, DataValueMarker, EntityId, ModelClass,
    ModelEntity,
};
use crate::errors::{TradeError, TradeResult};
use crate::events::EventSource;
use crate::instance::{is_live, settle, DataObjectInstance, DataValue};
use crate::model::DataElement;
use crate::state_machine::{InstanceEvent, InstanceState, LifecycleMachine, State, TransitionSubject};
use crate::sync::{read, write};

/// Runtime occurrence of a [`DataElement`] inside a [`DataObjectInstance`]
///
/// The instance is INITIALIZED exactly while it holds an initialized
/// [`DataValue`].
pub struct DataElementInstance {
    id: EntityId<DataElementInstanceMarker>,
    element: Arc<DataElement>,
    owner_id: EntityId<DataObjectInstanceMarker>,
    owner: Weak<DataObjectInstance>,
    created_by: RwLock<String>,
    data_value: RwLock<Option<Arc<DataValue>>>,
    lifecycle: LifecycleMachine<InstanceState>,
    bus: Arc<EventBus>,
    self_ref: Weak<DataElementInstance>,
}

impl DataElementInstance {
    pub(crate) fn new(
        bus: &Arc<EventBus>,
        element: Arc<DataElement>,
        owner: &Arc<DataObjectInstance>,
        created_by: String,
    ) -> TradeResult<Arc<Self>> {
        let instance = Arc::new_cyclic(|self_ref| Self {
            id: EntityId::new(),
            element,
            owner_id: owner.id(),
            owner: Arc::downgrade(owner),
            created_by: RwLock::new(created_by),
            data_value: RwLock::new(None),
            lifecycle: LifecycleMachine::new(bus.config().transition_retries),
            bus: bus.clone(),
            self_ref: self_ref.clone(),
        });
        instance.lifecycle.initialize(&instance.subject());
        owner.attach(&instance)?;
        Ok(instance)
    }

    /// The instantiated element
    pub fn data_element(&self) -> &Arc<DataElement> {
        &self.element
    }

    /// Id of the owning object instance
    pub fn data_object_instance_id(&self) -> EntityId<DataObjectInstanceMarker> {
        self.owner_id
    }

    /// The owning object instance, while it is alive
    pub fn data_object_instance(&self) -> Option<Arc<DataObjectInstance>> {
        self.owner.upgrade()
    }

    /// Who created the instance
    pub fn created_by(&self) -> String {
        read(&self.created_by).clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> InstanceState {
        self.lifecycle.current().unwrap_or(InstanceState::Created)
    }

    /// Check if the instance holds initialized data
    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_in_state(InstanceState::Initialized)
    }

    /// The backing value
    pub fn data_value(&self) -> Option<Arc<DataValue>> {
        read(&self.data_value).clone()
    }

    /// Bind, replace or (with `None`) unbind the backing value
    ///
    /// A new value must still be CREATED. The instance registers itself on
    /// the value and takes over its state; the owning object instance is
    /// re-evaluated.
    pub fn set_data_value(&self, value: Option<&Arc<DataValue>>) -> TradeResult<()> {
        if !is_live(self.state()) {
            return Err(self.modification_error(format!(
                "cannot change the data value while {}",
                self.state().name()
            )));
        }
        if let Some(value) = value {
            if value.state() != InstanceState::Created {
                return Err(self.modification_error(format!(
                    "data value {} is {}, not CREATED",
                    value.id(),
                    value.state().name()
                )));
            }
        }

        let previous = std::mem::replace(&mut *write(&self.data_value), value.cloned());
        let unchanged = match (&previous, value) {
            (Some(old), Some(new)) => Arc::ptr_eq(old, new),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(());
        }
        if let Some(old) = previous {
            old.remove_association(self.id);
        }
        if let (Some(value), Some(this)) = (value, self.self_ref.upgrade()) {
            value.add_association(&this);
        }
        self.refresh_from_value()
    }

    /// Align the state with the backing value, then re-evaluate the owner
    pub(crate) fn refresh_from_value(&self) -> TradeResult<()> {
        let initialized = self
            .data_value()
            .map(|value| value.is_initialized())
            .unwrap_or(false);
        settle(&self.lifecycle, &self.subject(), initialized)?;
        match self.owner.upgrade() {
            Some(owner) => owner.reevaluate(),
            None => Ok(()),
        }
    }

    /// Drop the binding to a value that is being deleted
    pub(crate) fn release_value(&self, value_id: EntityId<DataValueMarker>) {
        let released = {
            let mut slot = write(&self.data_value);
            match slot.as_ref() {
                Some(current) if current.id() == value_id => slot.take().is_some(),
                _ => false,
            }
        };
        if released {
            if let Err(e) = self.refresh_from_value() {
                warn!(data_element_instance = %self.id, data_value = %value_id, error = %e, "state update after value release failed");
            }
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

    /// Delete the instance, unbind its value and leave the owner
    pub fn delete(&self) -> TradeResult<InstanceState> {
        let state = self.delete_cascaded()?;
        if let Some(owner) = self.owner.upgrade() {
            owner.detach(self.id);
            if let Err(e) = owner.reevaluate() {
                warn!(data_object_instance = %self.owner_id, error = %e, "owner re-evaluation after element instance delete failed");
            }
        }
        Ok(state)
    }

    /// Delete without notifying the owner; used by the owner's own cascade
    pub(crate) fn delete_cascaded(&self) -> TradeResult<InstanceState> {
        let state = self.lifecycle.trigger(&self.subject(), InstanceEvent::Delete)?;
        if let Some(value) = write(&self.data_value).take() {
            value.remove_association(self.id);
        }
        write(&self.created_by).clear();
        Ok(state)
    }

    fn modification_error(&self, reason: String) -> TradeError {
        TradeError::illegal_modification(
            ModelClass::DataElementInstance.name(),
            self.id.to_string(),
            reason,
        )
    }

    fn subject(&self) -> TransitionSubject<'_> {
        TransitionSubject {
            bus: &self.bus,
            model_class: ModelClass::DataElementInstance,
            identifier: self.id.to_string(),
            source: self.self_ref.upgrade().map(EventSource::DataElementInstance),
        }
    }
}

impl ModelEntity for DataElementInstance {
    type IdType = DataElementInstanceMarker;

    fn id(&self) -> EntityId<DataElementInstanceMarker> {
        self.id
    }

    fn model_class(&self) -> ModelClass {
        ModelClass::DataElementInstance
    }
}

impl fmt::Debug for DataElementInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataElementInstance")
            .field("id", &self.id)
            .field("element", &self.element.id())
            .field("owner", &self.owner_id)
            .field("state", &self.state())
            .field("data_value", &self.data_value().map(|v| v.id()))
            .finish()
    }
}
