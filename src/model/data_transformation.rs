// Copyright 2025 Cowboy AI, LLC.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::entity::{
    DataElementMarker, DataModelMarker, DataObjectMarker, DataTransformationMarker, EntityId,
    ModelEntity,
};
use crate::model::DataElement;

/// Source or target of a data transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum ResourceRef {
    /// A whole data object
    DataObject(EntityId<DataObjectMarker>),
    /// A single data element
    DataElement(EntityId<DataElementMarker>),
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::DataObject(id) => write!(f, "DataObject[{id}]"),
            ResourceRef::DataElement(id) => write!(f, "DataElement[{id}]"),
        }
    }
}

/// A declared source → target mapping inside one data model
///
/// The record itself is immutable apart from its related instances: per
/// triggering resource (a data value id), the element instances the
/// transformation was matched for.
pub struct DataTransformation {
    id: EntityId<DataTransformationMarker>,
    model_id: EntityId<DataModelMarker>,
    name: String,
    source: ResourceRef,
    target: ResourceRef,
    transformer: String,
    parameters: BTreeMap<String, String>,
    related_instances: DashMap<String, BTreeSet<String>>,
}

impl DataTransformation {
    /// Declare a transformation of model `model_id`
    pub fn new(
        model_id: EntityId<DataModelMarker>,
        name: impl Into<String>,
        source: ResourceRef,
        target: ResourceRef,
        transformer: impl Into<String>,
        parameters: BTreeMap<String, String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: EntityId::new(),
            model_id,
            name: name.into(),
            source,
            target,
            transformer: transformer.into(),
            parameters,
            related_instances: DashMap::new(),
        })
    }

    /// Get the transformation's ID
    pub fn id(&self) -> EntityId<DataTransformationMarker> {
        self.id
    }

    /// Owning model
    pub fn model_id(&self) -> EntityId<DataModelMarker> {
        self.model_id
    }

    /// Name, unique within the model
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource whose changes trigger the transformation
    pub fn source(&self) -> ResourceRef {
        self.source
    }

    /// Resource the transformation writes
    pub fn target(&self) -> ResourceRef {
        self.target
    }

    /// Reference to the transformer implementation
    pub fn transformer(&self) -> &str {
        &self.transformer
    }

    /// Transformer parameters
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Check if a change of `element` triggers this transformation
    ///
    /// An object-level source is triggered by any of its elements.
    pub fn is_triggered_by(&self, element: &DataElement) -> bool {
        match self.source {
            ResourceRef::DataElement(id) => id == element.id(),
            ResourceRef::DataObject(id) => id == element.data_object_id(),
        }
    }

    /// Record that `instance_id` was matched through `trigger_id`
    pub fn add_related_instance(&self, trigger_id: &str, instance_id: impl Into<String>) {
        self.related_instances
            .entry(trigger_id.to_string())
            .or_default()
            .insert(instance_id.into());
    }

    /// Element instances matched through `trigger_id`
    pub fn related_instances(&self, trigger_id: &str) -> BTreeSet<String> {
        self.related_instances
            .get(trigger_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Drop everything recorded under `trigger_id`
    pub fn forget_related(&self, trigger_id: &str) -> bool {
        self.related_instances.remove(trigger_id).is_some()
    }

    /// Trigger ids with recorded instances
    pub fn related_trigger_ids(&self) -> Vec<String> {
        self.related_instances
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl fmt::Debug for DataTransformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTransformation")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("transformer", &self.transformer)
            .finish()
    }
}
