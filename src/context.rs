// Copyright 2025 Cowboy AI, LLC.

//! Application context
//!
//! A [`TradeContext`] owns one auditing bus together with the services
//! listening on it. Contexts are independent of each other; several may
//! coexist in one process.
//!
//! ```rust
//! use trade_core::{TradeConfig, TradeContext};
//!
//! let context = TradeContext::builder()
//!     .config(TradeConfig::default())
//!     .build();
//! context.start().unwrap();
//!
//! let object = context.create_data_object("teamA", "orderData");
//! let amount = context.create_data_element(&object, "amount", None, None);
//! amount.initialize().unwrap();
//! object.add_data_element(&amount).unwrap();
//! assert!(object.is_ready());
//!
//! context.shutdown();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::auditing::{AuditingListener, EventBus};
use crate::compiler::{DataDependencyGraphCompiler, JsonGraphCompiler};
use crate::config::TradeConfig;
use crate::errors::TradeResult;
use crate::instance::DataValue;
use crate::model::{DataElement, DataModelRegistry, DataObject, ModelDefinitionRecord};
use crate::notification::{Notification, NotificationDispatcher, NotifierRegistry, NotifierService};
use crate::persistence::{InMemoryPersistence, PersistenceProvider};
use crate::transformation::{LoggingExecutor, TransformationCorrelator, TransformationExecutor};
use crate::value_manager::{DataValueManager, DataValueRecord};

/// Builder for [`TradeContext`]
///
/// Every collaborator has a default: the configuration defaults, a
/// [`LoggingExecutor`], in-memory stores, the [`JsonGraphCompiler`] and the
/// bundled notifiers.
pub struct TradeContextBuilder {
    config: TradeConfig,
    executor: Option<Arc<dyn TransformationExecutor>>,
    compiler: Option<Arc<dyn DataDependencyGraphCompiler>>,
    notification_store: Option<Arc<dyn PersistenceProvider<Notification>>>,
    data_value_store: Option<Arc<dyn PersistenceProvider<DataValueRecord>>>,
    model_store: Option<Arc<dyn PersistenceProvider<ModelDefinitionRecord>>>,
    notifiers: NotifierRegistry,
}

impl TradeContextBuilder {
    fn new() -> Self {
        Self {
            config: TradeConfig::default(),
            executor: None,
            compiler: None,
            notification_store: None,
            data_value_store: None,
            model_store: None,
            notifiers: NotifierRegistry::with_defaults(),
        }
    }

    /// Use `config`
    pub fn config(mut self, config: TradeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sink for triggered transformations
    pub fn executor(mut self, executor: Arc<dyn TransformationExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Compiler for data dependency graph definitions
    pub fn compiler(mut self, compiler: Arc<dyn DataDependencyGraphCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Where notifications are persisted
    pub fn notification_store(mut self, store: Arc<dyn PersistenceProvider<Notification>>) -> Self {
        self.notification_store = Some(store);
        self
    }

    /// Where data values are persisted
    pub fn data_value_store(mut self, store: Arc<dyn PersistenceProvider<DataValueRecord>>) -> Self {
        self.data_value_store = Some(store);
        self
    }

    /// Where model definitions are persisted
    pub fn model_store(mut self, store: Arc<dyn PersistenceProvider<ModelDefinitionRecord>>) -> Self {
        self.model_store = Some(store);
        self
    }

    /// Register a notifier implementation under `key`
    pub fn notifier<F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn NotifierService> + Send + Sync + 'static,
    {
        self.notifiers.register(key, factory);
        self
    }

    /// Construct the services; nothing listens on the bus until
    /// [`TradeContext::start`]
    pub fn build(self) -> TradeContext {
        let config = Arc::new(self.config);
        let bus = Arc::new(EventBus::new(config.clone()));

        let models = Arc::new(DataModelRegistry::new(
            bus.clone(),
            self.compiler
                .unwrap_or_else(|| Arc::new(JsonGraphCompiler::new())),
            self.model_store
                .unwrap_or_else(|| Arc::new(InMemoryPersistence::<ModelDefinitionRecord>::new())),
        ));
        let values = Arc::new(DataValueManager::new(
            bus.clone(),
            self.data_value_store
                .unwrap_or_else(|| Arc::new(InMemoryPersistence::<DataValueRecord>::new())),
        ));
        let correlator = Arc::new(TransformationCorrelator::new(
            models.clone(),
            self.executor
                .unwrap_or_else(|| Arc::new(LoggingExecutor::new())),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            config.clone(),
            self.notification_store
                .unwrap_or_else(|| Arc::new(InMemoryPersistence::<Notification>::new())),
            self.notifiers,
        ));

        TradeContext {
            config,
            bus,
            models,
            values,
            correlator,
            dispatcher,
            started: AtomicBool::new(false),
        }
    }
}

/// One running instance of the middleware core
pub struct TradeContext {
    config: Arc<TradeConfig>,
    bus: Arc<EventBus>,
    models: Arc<DataModelRegistry>,
    values: Arc<DataValueManager>,
    correlator: Arc<TransformationCorrelator>,
    dispatcher: Arc<NotificationDispatcher>,
    started: AtomicBool,
}

impl TradeContext {
    /// Start building a context
    pub fn builder() -> TradeContextBuilder {
        TradeContextBuilder::new()
    }

    /// Register the correlator and the dispatcher on the bus
    ///
    /// Starting a started context does nothing. When the dispatcher fails
    /// to start the correlator is unregistered again.
    pub fn start(&self) -> TradeResult<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let correlator = self.correlator_listener();
        if let Err(e) = self.bus.register_listener(correlator.clone()) {
            self.started.store(false, Ordering::Release);
            return Err(e);
        }
        if let Err(e) = self.bus.register_listener(self.dispatcher_listener()) {
            self.bus.unregister_listener(&correlator);
            self.started.store(false, Ordering::Release);
            return Err(e);
        }
        info!(
            deployment_mode = ?self.config.deployment_mode,
            persistence_mode = ?self.config.persistence_mode,
            "trade context started"
        );
        Ok(())
    }

    /// Unregister the dispatcher and the correlator, shutting both down
    pub fn shutdown(&self) {
        if !self.started.swap(false, Ordering::AcqRel) {
            return;
        }
        self.bus.unregister_listener(&self.dispatcher_listener());
        self.bus.unregister_listener(&self.correlator_listener());
        info!("trade context stopped");
    }

    /// Check if the context is started
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Create a standalone data object, in state INITIAL
    pub fn create_data_object(&self, entity: impl Into<String>, name: impl Into<String>) -> Arc<DataObject> {
        DataObject::new(&self.bus, entity, name)
    }

    /// Create a data element definition for `object`, in state INITIAL
    pub fn create_data_element(
        &self,
        object: &Arc<DataObject>,
        name: impl Into<String>,
        content_type: Option<String>,
        data_type: Option<String>,
    ) -> Arc<DataElement> {
        DataElement::new(object, name, content_type, data_type)
    }

    /// Create a managed data value, in state CREATED
    pub fn create_data_value(
        &self,
        owner: impl Into<String>,
        content_type: Option<String>,
        data_type: Option<String>,
    ) -> TradeResult<Arc<DataValue>> {
        self.values.create_data_value(owner, content_type, data_type)
    }

    /// Configuration of this context
    pub fn config(&self) -> &Arc<TradeConfig> {
        &self.config
    }

    /// Auditing bus
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Data model registry
    pub fn models(&self) -> &Arc<DataModelRegistry> {
        &self.models
    }

    /// Data value manager
    pub fn values(&self) -> &Arc<DataValueManager> {
        &self.values
    }

    /// Transformation correlator
    pub fn correlator(&self) -> &Arc<TransformationCorrelator> {
        &self.correlator
    }

    /// Notification dispatcher
    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    fn correlator_listener(&self) -> Arc<dyn AuditingListener> {
        self.correlator.clone()
    }

    fn dispatcher_listener(&self) -> Arc<dyn AuditingListener> {
        self.dispatcher.clone()
    }
}

impl std::fmt::Debug for TradeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeContext")
            .field("started", &self.is_started())
            .field("bus", &self.bus)
            .field("values", &self.values)
            .field("correlator", &self.correlator)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
