// Copyright 2025 Cowboy AI, LLC.

//! # TraDE Core
//!
//! Core of a data-flow middleware that lets process choreographies exchange
//! data through shared, lifecycle-governed data objects instead of
//! point-to-point messages.
//!
//! This crate provides:
//! - **Definitions**: data models, data objects, data elements and the
//!   transformations declared between them
//! - **Instances**: runtime occurrences of definitions, backed by shareable
//!   data values
//! - **Lifecycle Engine**: one validated transition table driving every
//!   entity kind, with a state change event per transition
//! - **Auditing Bus**: synchronous, ordered publish/subscribe for those
//!   events
//! - **Transformation Correlator**: matches data changes to the
//!   transformations they trigger, with a per-value cache
//! - **Notification Dispatcher**: forwards filtered lifecycle events to
//!   pluggable notifier back-ends
//!
//! ## Design Principles
//!
//! 1. **Type Safety**: Typed ids keep entity kinds apart at compile time
//! 2. **Controlled State**: Enums restrict states and transitions to the
//!    table entries
//! 3. **Upward Propagation**: Data changes flow from values to element
//!    instances to object instances
//! 4. **Isolation**: A failing listener, notifier or executor never stops
//!    delivery to the others

#![warn(missing_docs)]

mod sync;

pub mod auditing;
pub mod compiler;
pub mod config;
pub mod context;
pub mod entity;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod instance;
pub mod model;
pub mod notification;
pub mod persistence;
pub mod state_machine;
pub mod transformation;
pub mod value_manager;

/// Marker types distinguishing [`EntityId`]s
pub mod markers {
    pub use crate::entity::{
        DataElementInstanceMarker, DataElementMarker, DataModelMarker, DataObjectInstanceMarker,
        DataObjectMarker, DataTransformationMarker, DataValueMarker, NotificationMarker,
    };
}

// Re-export core types
pub use auditing::{AuditingListener, EventBus};
pub use compiler::{
    CompilationIssue, CompilationOutcome, DataDependencyGraphCompiler, IssueSeverity,
    JsonGraphCompiler,
};
pub use config::{
    DeploymentMode, InitializationPolicy, NotificationMode, PersistenceMode, TradeConfig,
};
pub use context::{TradeContext, TradeContextBuilder};
pub use entity::{EntityId, ModelClass, ModelEntity};
pub use errors::{TradeError, TradeResult};
pub use events::{
    DataOperation, DomainEvent, EventKind, EventSource, FilterDescriptor, TradeEvent,
};
pub use identifiers::ModelUrn;
pub use instance::{DataElementInstance, DataObjectInstance, DataValue};
pub use model::{
    DataElement, DataModel, DataModelRegistry, DataObject, DataTransformation,
    ModelDefinitionRecord, ResourceRef,
};
pub use notification::{
    ChannelNotifier, LoggingNotifier, Notification, NotificationDispatcher, NotificationMessage,
    NotificationUpdate, NotifierRegistry, NotifierService,
};
pub use persistence::{InMemoryPersistence, PersistenceProvider};
pub use state_machine::{InstanceEvent, InstanceState, LifecycleState, ModelEvent, ModelState, State};
pub use transformation::{LoggingExecutor, TransformationCorrelator, TransformationExecutor};
pub use value_manager::{DataValueManager, DataValueRecord};
