// Copyright 2025 Cowboy AI, LLC.

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use trade_core::{
    AuditingListener, ChannelNotifier, DataElement, DataObject, EventKind, NotifierService,
    TradeConfig, TradeContext, TradeEvent, TradeResult,
};

/// Order graph: `amount` feeds two transformations, `note` feeds none
pub const ORDER_GRAPH: &str = r#"{
    "name": "orders",
    "namespace": "urn:trade:orders",
    "entity": "teamA",
    "dataObjects": [
        { "name": "orderData", "dataElements": [
            { "name": "amount", "contentType": "text/plain", "type": "decimal" },
            { "name": "note" }
        ] },
        { "name": "invoice", "dataElements": [ { "name": "total" } ] }
    ],
    "transformations": [
        { "name": "computeTotal", "source": "orderData/amount", "target": "invoice/total", "transformer": "sum" },
        { "name": "auditAmount", "source": "orderData/amount", "target": "invoice", "transformer": "audit" }
    ]
}"#;

/// Listener keeping every event it receives
pub struct Recorder {
    name: String,
    events: Mutex<Vec<TradeEvent>>,
}

impl Recorder {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<TradeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// `(ModelClass, OldState, NewState)` of every lifecycle event
    pub fn transitions(&self) -> Vec<(String, Option<String>, String)> {
        self.events()
            .iter()
            .filter(|e| {
                matches!(
                    e.kind(),
                    EventKind::ModelLifecycle | EventKind::InstanceLifecycle
                )
            })
            .map(|e| {
                (
                    e.property("ModelClass").unwrap_or_default(),
                    e.property("OldState"),
                    e.property("NewState").unwrap_or_default(),
                )
            })
            .collect()
    }
}

impl AuditingListener for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &TradeEvent) -> TradeResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// A started context with a channel notifier registered under "channel"
pub fn context_with_channel(
    config: TradeConfig,
) -> (
    TradeContext,
    tokio::sync::mpsc::UnboundedReceiver<trade_core::NotificationMessage>,
) {
    let (channel, receiver) = ChannelNotifier::channel();
    let context = TradeContext::builder()
        .config(config)
        .notifier(ChannelNotifier::ID, move || -> Arc<dyn NotifierService> {
            Arc::new(channel.clone())
        })
        .build();
    context.start().unwrap();
    (context, receiver)
}

/// A READY data object with one READY element per name
pub fn ready_object(
    context: &TradeContext,
    entity: &str,
    name: &str,
    elements: &[&str],
) -> (Arc<DataObject>, Vec<Arc<DataElement>>) {
    let object = context.create_data_object(entity, name);
    let elements = elements
        .iter()
        .map(|element| {
            let element = context.create_data_element(&object, *element, None, None);
            element.initialize().unwrap();
            object.add_data_element(&element).unwrap();
            element
        })
        .collect();
    (object, elements)
}

pub fn correlation(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
