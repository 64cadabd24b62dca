// Copyright 2025 Cowboy AI, LLC.

//! Entity identity: typed ids and the closed set of model classes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use uuid::Uuid;

/// A typed entity ID using phantom types for type safety
///
/// These IDs are globally unique. The phantom type parameter ensures that
/// IDs for different entity kinds cannot be mixed up at compile time.
///
/// # Examples
///
/// ```rust
/// use trade_core::EntityId;
/// use trade_core::markers::{DataObjectMarker, DataValueMarker};
///
/// let object_id = EntityId::<DataObjectMarker>::new();
/// let value_id = EntityId::<DataValueMarker>::new();
///
/// // These are different types - won't compile if mixed up:
/// // let _: EntityId<DataObjectMarker> = value_id; // ERROR!
/// assert_ne!(object_id.as_uuid(), value_id.as_uuid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId<T> {
    id: Uuid,
    #[serde(skip)]
    _phantom: PhantomData<T>,
}

impl<T> EntityId<T> {
    /// Create a new random entity ID
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            _phantom: PhantomData,
        }
    }

    /// Create an entity ID from a UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self {
            id,
            _phantom: PhantomData,
        }
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.id
    }
}

impl<T> fmt::Display for EntityId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> Default for EntityId<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromStr for EntityId<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self::from_uuid)
    }
}

impl<T> From<EntityId<T>> for Uuid {
    fn from(id: EntityId<T>) -> Self {
        id.id
    }
}

/// The static kind tag carried by every event ("ModelClass" filter key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelClass {
    /// A compiled data dependency graph
    DataModel,
    /// A data object definition
    DataObject,
    /// A data element definition
    DataElement,
    /// A runtime instance of a data object
    DataObjectInstance,
    /// A runtime instance of a data element
    DataElementInstance,
    /// An opaque data blob
    DataValue,
}

impl ModelClass {
    /// All model classes, in declaration order
    pub const ALL: [ModelClass; 6] = [
        ModelClass::DataModel,
        ModelClass::DataObject,
        ModelClass::DataElement,
        ModelClass::DataObjectInstance,
        ModelClass::DataElementInstance,
        ModelClass::DataValue,
    ];

    /// Name used in events and filters
    pub fn name(&self) -> &'static str {
        match self {
            ModelClass::DataModel => "DataModel",
            ModelClass::DataObject => "DataObject",
            ModelClass::DataElement => "DataElement",
            ModelClass::DataObjectInstance => "DataObjectInstance",
            ModelClass::DataElementInstance => "DataElementInstance",
            ModelClass::DataValue => "DataValue",
        }
    }

    /// Definitional entities publish model lifecycle events, everything else
    /// publishes instance lifecycle events
    pub fn is_definitional(&self) -> bool {
        matches!(
            self,
            ModelClass::DataModel | ModelClass::DataObject | ModelClass::DataElement
        )
    }
}

impl fmt::Display for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for governed entities with identity
pub trait ModelEntity: Send + Sync {
    /// The marker type for this entity
    type IdType;

    /// Get the entity's ID
    fn id(&self) -> EntityId<Self::IdType>;

    /// Static kind tag of the entity
    fn model_class(&self) -> ModelClass;

    /// Identifier used in events and filters
    fn identifier(&self) -> String {
        self.id().to_string()
    }
}

// Marker types for entity IDs
/// Marker for data model / data dependency graph ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataModelMarker;

/// Marker for data object ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataObjectMarker;

/// Marker for data element ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataElementMarker;

/// Marker for data object instance ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataObjectInstanceMarker;

/// Marker for data element instance ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataElementInstanceMarker;

/// Marker for data value ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataValueMarker;

/// Marker for data transformation ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataTransformationMarker;

/// Marker for notification ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationMarker;
