// Copyright (c) 2025 - Cowboy AI, LLC.

//! Auditing events
//!
//! Events represent facts about governed entities. The taxonomy is closed:
//! data handling, model lifecycle, instance lifecycle, data (content change)
//! and internal events. Every event carries the identifier and kind of the
//! affected resource, an optional handle on the resource itself and its
//! creation time.
//!
//! Filterable properties are exposed through an explicit accessor table per
//! event kind. The same table drives [`TradeEvent::property`] (used by
//! notification filters), [`TradeEvent::render_fields`] (the default
//! notification message) and [`TradeEvent::filter_catalogue`] (discovery
//! metadata for API consumers).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::entity::{ModelClass, ModelEntity};
use crate::instance::{DataElementInstance, DataObjectInstance, DataValue};
use crate::model::{DataElement, DataModel, DataObject};
use crate::state_machine::{
    InstanceEvent, InstanceState, LifecycleEvent, LifecycleState, ModelEvent, ModelState, Trigger,
};

/// Base trait for auditing events
pub trait DomainEvent: Send + Sync + fmt::Debug {
    /// Identifier of the affected resource
    fn identifier(&self) -> &str;

    /// Get the event type name
    fn event_type(&self) -> &'static str;

    /// Get the schema version
    fn version(&self) -> &'static str {
        "v1"
    }
}

/// The closed set of event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum EventKind {
    /// Data was pushed to, pulled from or deleted from a data value store
    DataHandling,
    /// A data model, data object or data element changed state
    ModelLifecycle,
    /// An instance or data value changed state
    InstanceLifecycle,
    /// The content of a data value changed
    Data,
    /// Internal bookkeeping, not for external consumption
    Internal,
}

impl EventKind {
    /// All event kinds
    pub const ALL: [EventKind; 5] = [
        EventKind::DataHandling,
        EventKind::ModelLifecycle,
        EventKind::InstanceLifecycle,
        EventKind::Data,
        EventKind::Internal,
    ];

    /// Name of the kind
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::DataHandling => "dataHandling",
            EventKind::ModelLifecycle => "modelLifecycle",
            EventKind::InstanceLifecycle => "instanceLifecycle",
            EventKind::Data => "data",
            EventKind::Internal => "internal",
        }
    }
}

/// Handle on the entity an event originates from
#[derive(Clone)]
pub enum EventSource {
    /// A data model
    DataModel(Arc<DataModel>),
    /// A data object
    DataObject(Arc<DataObject>),
    /// A data element
    DataElement(Arc<DataElement>),
    /// A data object instance
    DataObjectInstance(Arc<DataObjectInstance>),
    /// A data element instance
    DataElementInstance(Arc<DataElementInstance>),
    /// A data value
    DataValue(Arc<DataValue>),
}

impl EventSource {
    /// Kind of the source entity
    pub fn model_class(&self) -> ModelClass {
        match self {
            EventSource::DataModel(e) => e.model_class(),
            EventSource::DataObject(e) => e.model_class(),
            EventSource::DataElement(e) => e.model_class(),
            EventSource::DataObjectInstance(e) => e.model_class(),
            EventSource::DataElementInstance(e) => e.model_class(),
            EventSource::DataValue(e) => e.model_class(),
        }
    }

    /// Identifier of the source entity
    pub fn identifier(&self) -> String {
        match self {
            EventSource::DataModel(e) => e.identifier(),
            EventSource::DataObject(e) => e.identifier(),
            EventSource::DataElement(e) => e.identifier(),
            EventSource::DataObjectInstance(e) => e.identifier(),
            EventSource::DataElementInstance(e) => e.identifier(),
            EventSource::DataValue(e) => e.identifier(),
        }
    }

    /// The source as a data value, if it is one
    pub fn as_data_value(&self) -> Option<&Arc<DataValue>> {
        match self {
            EventSource::DataValue(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.model_class(), self.identifier())
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventSource({self})")
    }
}

/// Fields shared by every event
#[derive(Debug, Clone)]
pub struct EventHeader {
    /// Unique id of this event
    pub event_id: Uuid,
    /// Identifier of the affected resource
    pub identifier: String,
    /// Static kind of the affected resource
    pub model_class: ModelClass,
    /// The affected resource itself
    pub source: Option<EventSource>,
    /// When the event was created
    pub created_at: DateTime<Utc>,
}

impl EventHeader {
    fn new(model_class: ModelClass, identifier: String, source: Option<EventSource>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            identifier,
            model_class,
            source,
            created_at: Utc::now(),
        }
    }
}

/// A lifecycle transition of a governed entity
#[derive(Debug, Clone)]
pub struct StateChangeEvent {
    /// Common fields
    pub header: EventHeader,
    /// State before the transition, `None` when the lifecycle just started
    pub old_state: Option<&'static str>,
    /// State after the transition
    pub new_state: &'static str,
    /// Name of the triggering event
    pub event: &'static str,
}

/// The content of a data value changed
#[derive(Debug, Clone)]
pub struct DataChangeEvent {
    /// Common fields
    pub header: EventHeader,
    /// Size of the new content in bytes
    pub size: usize,
}

/// Operations reported by data handling events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataOperation {
    /// Data was uploaded
    Push,
    /// Data was downloaded
    Pull,
    /// Data was removed
    Delete,
}

impl DataOperation {
    /// Name of the operation
    pub fn name(&self) -> &'static str {
        match self {
            DataOperation::Push => "Push",
            DataOperation::Pull => "Pull",
            DataOperation::Delete => "Delete",
        }
    }
}

/// Data was moved in or out of a data value store
#[derive(Debug, Clone)]
pub struct DataHandlingEvent {
    /// Common fields
    pub header: EventHeader,
    /// What happened to the data
    pub operation: DataOperation,
    /// Bytes moved
    pub size: usize,
}

/// A data value gained or lost an associated data element instance
#[derive(Debug, Clone)]
pub struct AssociationChangedEvent {
    /// Common fields; the identifier is the data value's
    pub header: EventHeader,
    /// Identifier of the data element instance
    pub instance_identifier: String,
    /// `true` when the association was added
    pub associated: bool,
}

/// Every event published on the auditing bus
#[derive(Debug, Clone)]
pub enum TradeEvent {
    /// Data handling
    DataHandling(DataHandlingEvent),
    /// Definitional entity state change
    ModelLifecycle(StateChangeEvent),
    /// Instance or data value state change
    InstanceLifecycle(StateChangeEvent),
    /// Data value content change
    Data(DataChangeEvent),
    /// Association change between a data value and an element instance
    Internal(AssociationChangedEvent),
}

impl TradeEvent {
    /// Build the state change event for a transition; the kind follows the
    /// model class
    pub fn state_change(
        model_class: ModelClass,
        identifier: String,
        source: Option<EventSource>,
        old_state: Option<&'static str>,
        new_state: &'static str,
        event: &'static str,
    ) -> Self {
        let change = StateChangeEvent {
            header: EventHeader::new(model_class, identifier, source),
            old_state,
            new_state,
            event,
        };
        if model_class.is_definitional() {
            TradeEvent::ModelLifecycle(change)
        } else {
            TradeEvent::InstanceLifecycle(change)
        }
    }

    /// Build a data change event for a data value
    pub fn data_changed(identifier: String, source: Option<EventSource>, size: usize) -> Self {
        TradeEvent::Data(DataChangeEvent {
            header: EventHeader::new(ModelClass::DataValue, identifier, source),
            size,
        })
    }

    /// Build a data handling event for a data value
    pub fn data_handling(
        identifier: String,
        source: Option<EventSource>,
        operation: DataOperation,
        size: usize,
    ) -> Self {
        TradeEvent::DataHandling(DataHandlingEvent {
            header: EventHeader::new(ModelClass::DataValue, identifier, source),
            operation,
            size,
        })
    }

    /// Build an association changed event for a data value
    pub fn association_changed(
        identifier: String,
        source: Option<EventSource>,
        instance_identifier: String,
        associated: bool,
    ) -> Self {
        TradeEvent::Internal(AssociationChangedEvent {
            header: EventHeader::new(ModelClass::DataValue, identifier, source),
            instance_identifier,
            associated,
        })
    }

    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            TradeEvent::DataHandling(_) => EventKind::DataHandling,
            TradeEvent::ModelLifecycle(_) => EventKind::ModelLifecycle,
            TradeEvent::InstanceLifecycle(_) => EventKind::InstanceLifecycle,
            TradeEvent::Data(_) => EventKind::Data,
            TradeEvent::Internal(_) => EventKind::Internal,
        }
    }

    /// Common fields
    pub fn header(&self) -> &EventHeader {
        match self {
            TradeEvent::DataHandling(e) => &e.header,
            TradeEvent::ModelLifecycle(e) | TradeEvent::InstanceLifecycle(e) => &e.header,
            TradeEvent::Data(e) => &e.header,
            TradeEvent::Internal(e) => &e.header,
        }
    }

    /// Identifier of the affected resource
    pub fn identifier(&self) -> &str {
        &self.header().identifier
    }

    /// Static kind of the affected resource
    pub fn model_class(&self) -> ModelClass {
        self.header().model_class
    }

    /// The affected resource, when attached
    pub fn source(&self) -> Option<&EventSource> {
        self.header().source.as_ref()
    }

    /// When the event was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.header().created_at
    }

    /// The state change carried by lifecycle events
    pub fn as_state_change(&self) -> Option<&StateChangeEvent> {
        match self {
            TradeEvent::ModelLifecycle(e) | TradeEvent::InstanceLifecycle(e) => Some(e),
            _ => None,
        }
    }

    /// Read the filterable property `key`
    ///
    /// Returns `None` when this kind of event has no such property or the
    /// property is not set.
    pub fn property(&self, key: &str) -> Option<String> {
        properties_of(self.kind())
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| (p.read)(self))
    }

    /// Field dump `EventType{Key=value, ...}` over every set property
    pub fn render_fields(&self) -> String {
        let fields: Vec<String> = properties_of(self.kind())
            .iter()
            .filter_map(|p| (p.read)(self).map(|value| format!("{}={}", p.key, value)))
            .chain(std::iter::once(format!(
                "Timestamp={}",
                self.created_at().to_rfc3339()
            )))
            .collect();
        format!("{}{{{}}}", self.event_type(), fields.join(", "))
    }

    /// Filterable keys of an event kind
    pub fn filter_catalogue(kind: EventKind) -> Vec<FilterDescriptor> {
        properties_of(kind)
            .iter()
            .map(|p| FilterDescriptor {
                key: p.key.to_string(),
                description: p.description.to_string(),
                values: p.values.map(|values| values()),
            })
            .collect()
    }
}

impl DomainEvent for TradeEvent {
    fn identifier(&self) -> &str {
        TradeEvent::identifier(self)
    }

    fn event_type(&self) -> &'static str {
        match self {
            TradeEvent::DataHandling(_) => "DataHandlingEvent",
            TradeEvent::ModelLifecycle(_) => "ModelStateChangeEvent",
            TradeEvent::InstanceLifecycle(_) => "InstanceStateChangeEvent",
            TradeEvent::Data(_) => "DataChangeEvent",
            TradeEvent::Internal(_) => "AssociationChangedEvent",
        }
    }
}

/// Discovery metadata for one filterable key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FilterDescriptor {
    /// Filter key, as used in notification filters
    pub key: String,
    /// Human readable description
    pub description: String,
    /// Constrained value domain, when there is one
    pub values: Option<Vec<String>>,
}

struct PropertyAccessor {
    key: &'static str,
    description: &'static str,
    read: fn(&TradeEvent) -> Option<String>,
    values: Option<fn() -> Vec<String>>,
}

fn read_identifier(event: &TradeEvent) -> Option<String> {
    Some(event.identifier().to_string())
}

fn read_model_class(event: &TradeEvent) -> Option<String> {
    Some(event.model_class().name().to_string())
}

fn read_event_source(event: &TradeEvent) -> Option<String> {
    event.source().map(|s| s.to_string())
}

fn read_old_state(event: &TradeEvent) -> Option<String> {
    event
        .as_state_change()
        .and_then(|e| e.old_state)
        .map(str::to_string)
}

fn read_new_state(event: &TradeEvent) -> Option<String> {
    event.as_state_change().map(|e| e.new_state.to_string())
}

fn read_event_name(event: &TradeEvent) -> Option<String> {
    event.as_state_change().map(|e| e.event.to_string())
}

fn read_size(event: &TradeEvent) -> Option<String> {
    match event {
        TradeEvent::Data(e) => Some(e.size.to_string()),
        TradeEvent::DataHandling(e) => Some(e.size.to_string()),
        _ => None,
    }
}

fn read_operation(event: &TradeEvent) -> Option<String> {
    match event {
        TradeEvent::DataHandling(e) => Some(e.operation.name().to_string()),
        _ => None,
    }
}

fn read_instance_identifier(event: &TradeEvent) -> Option<String> {
    match event {
        TradeEvent::Internal(e) => Some(e.instance_identifier.clone()),
        _ => None,
    }
}

fn read_associated(event: &TradeEvent) -> Option<String> {
    match event {
        TradeEvent::Internal(e) => Some(e.associated.to_string()),
        _ => None,
    }
}

fn model_class_names() -> Vec<String> {
    ModelClass::ALL.iter().map(|c| c.name().to_string()).collect()
}

fn model_state_names() -> Vec<String> {
    ModelState::names().into_iter().map(str::to_string).collect()
}

fn instance_state_names() -> Vec<String> {
    InstanceState::names().into_iter().map(str::to_string).collect()
}

const TRIGGERS: [Trigger; 5] = [
    Trigger::Initial,
    Trigger::Ready,
    Trigger::Archive,
    Trigger::Unarchive,
    Trigger::Delete,
];

fn model_event_names() -> Vec<String> {
    TRIGGERS
        .iter()
        .map(|t| ModelEvent::from_trigger(*t).name().to_string())
        .collect()
}

fn instance_event_names() -> Vec<String> {
    TRIGGERS
        .iter()
        .map(|t| InstanceEvent::from_trigger(*t).name().to_string())
        .collect()
}

fn operation_names() -> Vec<String> {
    [DataOperation::Push, DataOperation::Pull, DataOperation::Delete]
        .iter()
        .map(|o| o.name().to_string())
        .collect()
}

fn boolean_names() -> Vec<String> {
    vec!["true".to_string(), "false".to_string()]
}

const IDENTIFIER: PropertyAccessor = PropertyAccessor {
    key: "Identifier",
    description: "Identifier of the affected resource",
    read: read_identifier,
    values: None,
};

const MODEL_CLASS: PropertyAccessor = PropertyAccessor {
    key: "ModelClass",
    description: "Kind of the affected resource",
    read: read_model_class,
    values: Some(model_class_names),
};

const EVENT_SOURCE: PropertyAccessor = PropertyAccessor {
    key: "EventSource",
    description: "The affected resource, rendered as Kind[identifier]",
    read: read_event_source,
    values: None,
};

const SIZE: PropertyAccessor = PropertyAccessor {
    key: "Size",
    description: "Size of the data in bytes",
    read: read_size,
    values: None,
};

const MODEL_LIFECYCLE_PROPERTIES: &[PropertyAccessor] = &[
    IDENTIFIER,
    MODEL_CLASS,
    EVENT_SOURCE,
    PropertyAccessor {
        key: "OldState",
        description: "State of the resource before the transition",
        read: read_old_state,
        values: Some(model_state_names),
    },
    PropertyAccessor {
        key: "NewState",
        description: "State of the resource after the transition",
        read: read_new_state,
        values: Some(model_state_names),
    },
    PropertyAccessor {
        key: "Event",
        description: "Lifecycle event that triggered the transition",
        read: read_event_name,
        values: Some(model_event_names),
    },
];

const INSTANCE_LIFECYCLE_PROPERTIES: &[PropertyAccessor] = &[
    IDENTIFIER,
    MODEL_CLASS,
    EVENT_SOURCE,
    PropertyAccessor {
        key: "OldState",
        description: "State of the resource before the transition",
        read: read_old_state,
        values: Some(instance_state_names),
    },
    PropertyAccessor {
        key: "NewState",
        description: "State of the resource after the transition",
        read: read_new_state,
        values: Some(instance_state_names),
    },
    PropertyAccessor {
        key: "Event",
        description: "Lifecycle event that triggered the transition",
        read: read_event_name,
        values: Some(instance_event_names),
    },
];

const DATA_PROPERTIES: &[PropertyAccessor] = &[IDENTIFIER, MODEL_CLASS, EVENT_SOURCE, SIZE];

const DATA_HANDLING_PROPERTIES: &[PropertyAccessor] = &[
    IDENTIFIER,
    MODEL_CLASS,
    EVENT_SOURCE,
    PropertyAccessor {
        key: "Operation",
        description: "What happened to the data",
        read: read_operation,
        values: Some(operation_names),
    },
    SIZE,
];

const INTERNAL_PROPERTIES: &[PropertyAccessor] = &[
    IDENTIFIER,
    MODEL_CLASS,
    EVENT_SOURCE,
    PropertyAccessor {
        key: "InstanceIdentifier",
        description: "Data element instance whose association changed",
        read: read_instance_identifier,
        values: None,
    },
    PropertyAccessor {
        key: "Associated",
        description: "Whether the association was added",
        read: read_associated,
        values: Some(boolean_names),
    },
];

fn properties_of(kind: EventKind) -> &'static [PropertyAccessor] {
    match kind {
        EventKind::DataHandling => DATA_HANDLING_PROPERTIES,
        EventKind::ModelLifecycle => MODEL_LIFECYCLE_PROPERTIES,
        EventKind::InstanceLifecycle => INSTANCE_LIFECYCLE_PROPERTIES,
        EventKind::Data => DATA_PROPERTIES,
        EventKind::Internal => INTERNAL_PROPERTIES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ready_event() -> TradeEvent {
        TradeEvent::state_change(
            ModelClass::DataObject,
            "obj-1".to_string(),
            None,
            Some("INITIAL"),
            "READY",
            "ready",
        )
    }

    #[test]
    fn test_state_change_kind_follows_model_class() {
        assert_eq!(ready_event().kind(), EventKind::ModelLifecycle);
        let instance = TradeEvent::state_change(
            ModelClass::DataObjectInstance,
            "inst-1".to_string(),
            None,
            None,
            "CREATED",
            "create",
        );
        assert_eq!(instance.kind(), EventKind::InstanceLifecycle);
        assert_eq!(instance.event_type(), "InstanceStateChangeEvent");
    }

    #[test]
    fn test_property_lookup() {
        let event = ready_event();
        assert_eq!(event.property("Identifier").as_deref(), Some("obj-1"));
        assert_eq!(event.property("ModelClass").as_deref(), Some("DataObject"));
        assert_eq!(event.property("OldState").as_deref(), Some("INITIAL"));
        assert_eq!(event.property("NewState").as_deref(), Some("READY"));
        assert_eq!(event.property("Event").as_deref(), Some("ready"));
        // No source attached and no such key
        assert_eq!(event.property("EventSource"), None);
        assert_eq!(event.property("Colour"), None);
    }

    #[test]
    fn test_properties_are_kind_specific() {
        let data = TradeEvent::data_changed("v-1".to_string(), None, 3);
        assert_eq!(data.property("Size").as_deref(), Some("3"));
        assert_eq!(data.property("NewState"), None);

        let handling =
            TradeEvent::data_handling("v-1".to_string(), None, DataOperation::Pull, 5);
        assert_eq!(handling.property("Operation").as_deref(), Some("Pull"));

        let internal =
            TradeEvent::association_changed("v-1".to_string(), None, "ei-1".to_string(), false);
        assert_eq!(internal.property("InstanceIdentifier").as_deref(), Some("ei-1"));
        assert_eq!(internal.property("Associated").as_deref(), Some("false"));
    }

    #[test]
    fn test_render_fields() {
        let rendered = ready_event().render_fields();
        assert!(rendered.starts_with(
            "ModelStateChangeEvent{Identifier=obj-1, ModelClass=DataObject, OldState=INITIAL, NewState=READY, Event=ready, Timestamp="
        ));
        assert!(rendered.ends_with('}'));
    }

    #[test]
    fn test_filter_catalogue() {
        let catalogue = TradeEvent::filter_catalogue(EventKind::InstanceLifecycle);
        let keys: Vec<_> = catalogue.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["Identifier", "ModelClass", "EventSource", "OldState", "NewState", "Event"]
        );
        let new_state = catalogue.iter().find(|d| d.key == "NewState").unwrap();
        assert_eq!(
            new_state.values.clone().unwrap(),
            vec!["CREATED", "INITIALIZED", "ARCHIVED", "DELETED"]
        );
        let identifier = catalogue.iter().find(|d| d.key == "Identifier").unwrap();
        assert!(identifier.values.is_none());

        for kind in EventKind::ALL {
            let catalogue = TradeEvent::filter_catalogue(kind);
            assert_eq!(catalogue[0].key, "Identifier", "{}", kind.name());
        }
    }
}
