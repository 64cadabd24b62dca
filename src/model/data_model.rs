// Copyright 2025 Cowboy AI, LLC.

use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};
use tracing::warn;

use crate::auditing::EventBus;
use crate::entity::{DataModelMarker, EntityId, ModelClass, ModelEntity};
use crate::errors::{TradeError, TradeResult};
use crate::events::EventSource;
use crate::model::{DataElement, DataObject, DataTransformation};
use crate::state_machine::{LifecycleMachine, ModelEvent, ModelState, State, TransitionSubject};
use crate::sync::{read, write};

#[derive(Debug, Clone, Default)]
struct Identity {
    name: String,
    namespace: String,
    entity: String,
}

/// A compiled data dependency graph
///
/// Owns a set of data objects (unique by name) and the data transformations
/// declared between their elements.
pub struct DataModel {
    id: EntityId<DataModelMarker>,
    identity: RwLock<Identity>,
    objects: RwLock<IndexMap<String, Arc<DataObject>>>,
    transformations: RwLock<Vec<Arc<DataTransformation>>>,
    lifecycle: LifecycleMachine<ModelState>,
    bus: Arc<EventBus>,
    self_ref: Weak<DataModel>,
}

impl DataModel {
    /// Create an empty model in state INITIAL
    pub fn new(
        bus: &Arc<EventBus>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        entity: impl Into<String>,
    ) -> Arc<Self> {
        let model = Arc::new_cyclic(|self_ref| Self {
            id: EntityId::new(),
            identity: RwLock::new(Identity {
                name: name.into(),
                namespace: namespace.into(),
                entity: entity.into(),
            }),
            objects: RwLock::new(IndexMap::new()),
            transformations: RwLock::new(Vec::new()),
            lifecycle: LifecycleMachine::new(bus.config().transition_retries),
            bus: bus.clone(),
            self_ref: self_ref.clone(),
        });
        model.lifecycle.initialize(&model.subject());
        model
    }

    /// Name of the graph
    pub fn name(&self) -> String {
        read(&self.identity).name.clone()
    }

    /// Namespace of the graph
    pub fn namespace(&self) -> String {
        read(&self.identity).namespace.clone()
    }

    /// Choreography entity the graph belongs to
    pub fn entity(&self) -> String {
        read(&self.identity).entity.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModelState {
        self.lifecycle.current().unwrap_or(ModelState::Initial)
    }

    /// Check if the model takes part in correlation
    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_in_state(ModelState::Ready)
    }

    /// Create a data object owned by this model
    pub fn create_data_object(&self, name: impl Into<String>) -> TradeResult<Arc<DataObject>> {
        let object = DataObject::new_in_model(&self.bus, self.id, self.entity(), name);
        self.add_data_object(&object)?;
        Ok(object)
    }

    /// Add an object of this model; names are unique per model
    pub fn add_data_object(&self, object: &Arc<DataObject>) -> TradeResult<()> {
        let mut objects = write(&self.objects);
        self.require_editable("add a data object")?;
        if object.model_id() != Some(self.id) {
            return Err(self.modification_error(format!(
                "data object {} was not created for this model",
                object.id()
            )));
        }
        let name = object.name();
        if objects.contains_key(&name) {
            return Err(self.modification_error(format!(
                "a data object named '{name}' already exists"
            )));
        }
        objects.insert(name, object.clone());
        Ok(())
    }

    /// Add a transformation declared for this model; names are unique
    pub fn add_transformation(&self, transformation: Arc<DataTransformation>) -> TradeResult<()> {
        let mut transformations = write(&self.transformations);
        self.require_editable("add a data transformation")?;
        if transformation.model_id() != self.id {
            return Err(self.modification_error(format!(
                "data transformation '{}' belongs to another model",
                transformation.name()
            )));
        }
        if transformations.iter().any(|t| t.name() == transformation.name()) {
            return Err(self.modification_error(format!(
                "a data transformation named '{}' already exists",
                transformation.name()
            )));
        }
        transformations.push(transformation);
        Ok(())
    }

    /// Owned objects, in insertion order
    pub fn data_objects(&self) -> Vec<Arc<DataObject>> {
        read(&self.objects).values().cloned().collect()
    }

    /// Owned object by name
    pub fn data_object(&self, name: &str) -> Option<Arc<DataObject>> {
        read(&self.objects).get(name).cloned()
    }

    /// Declared transformations
    pub fn transformations(&self) -> Vec<Arc<DataTransformation>> {
        read(&self.transformations).clone()
    }

    /// Transformation by name
    pub fn transformation(&self, name: &str) -> Option<Arc<DataTransformation>> {
        read(&self.transformations)
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }

    /// Transformations whose source is `element` or its owning object
    pub fn transformations_triggered_by(&self, element: &DataElement) -> Vec<Arc<DataTransformation>> {
        read(&self.transformations)
            .iter()
            .filter(|t| t.is_triggered_by(element))
            .cloned()
            .collect()
    }

    /// INITIAL → READY, requires at least one data object
    pub fn ready(&self) -> TradeResult<ModelState> {
        if read(&self.objects).is_empty() {
            return Err(self.modification_error("a data model without data objects cannot become READY".to_string()));
        }
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

    /// Delete every owned object, drop the transformations, then delete the
    /// model and clear its identity
    pub fn delete(&self) -> TradeResult<ModelState> {
        if self.lifecycle.is_in_state(ModelState::Deleted) {
            return self.lifecycle.trigger(&self.subject(), ModelEvent::Delete);
        }
        let objects: Vec<_> = write(&self.objects).drain(..).map(|(_, o)| o).collect();
        for object in objects {
            if object.state() == ModelState::Deleted {
                continue;
            }
            if let Err(e) = object.delete() {
                warn!(data_model = %self.id, data_object = %object.id(), error = %e, "cascade delete of data object failed");
            }
        }
        write(&self.transformations).clear();
        let state = self.lifecycle.trigger(&self.subject(), ModelEvent::Delete)?;
        *write(&self.identity) = Identity::default();
        Ok(state)
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
        TradeError::illegal_modification(ModelClass::DataModel.name(), self.id.to_string(), reason)
    }

    fn subject(&self) -> TransitionSubject<'_> {
        TransitionSubject {
            bus: &self.bus,
            model_class: ModelClass::DataModel,
            identifier: self.id.to_string(),
            source: self.self_ref.upgrade().map(EventSource::DataModel),
        }
    }
}

impl ModelEntity for DataModel {
    type IdType = DataModelMarker;

    fn id(&self) -> EntityId<DataModelMarker> {
        self.id
    }

    fn model_class(&self) -> ModelClass {
        ModelClass::DataModel
    }
}

impl fmt::Debug for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataModel")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("state", &self.state())
            .field("objects", &read(&self.objects).len())
            .field("transformations", &read(&self.transformations).len())
            .finish()
    }
}
