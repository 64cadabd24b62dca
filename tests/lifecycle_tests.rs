// Copyright 2025 Cowboy AI, LLC.

//! Lifecycle behaviour of definitions and instances through the public API

mod support;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

use support::{context_with_channel, correlation, ready_object, Recorder};
use trade_core::state_machine::{next_phase, Trigger};
use trade_core::{
    InitializationPolicy, InstanceState, LifecycleState, ModelEntity, ModelState, Notification,
    TradeConfig, TradeContext,
};

#[tokio::test]
async fn test_order_scenario_end_to_end() {
    let (context, mut receiver) = context_with_channel(TradeConfig::default());
    let notification = context
        .dispatcher()
        .register_notification(
            Notification::new("order initialized", "channel")
                .with_filter("ModelClass", "DataObjectInstance")
                .with_filter("NewState", "INITIALIZED"),
        )
        .unwrap();

    let object = context.create_data_object("teamA", "orderData");
    let amount = context.create_data_element(&object, "amount", None, None);
    assert_eq!(object.state(), ModelState::Initial);
    amount.initialize().unwrap();
    object.add_data_element(&amount).unwrap();
    assert_eq!(object.state(), ModelState::Ready);

    let order = object
        .instantiate("process-1", correlation(&[("orderId", "42")]))
        .unwrap();
    assert_eq!(order.state(), InstanceState::Created);
    assert_eq!(order.correlation_property("orderId").as_deref(), Some("42"));

    let amount_instance = amount.instantiate(&order, "process-1").unwrap();
    assert_eq!(amount_instance.state(), InstanceState::Created);

    let value = context.create_data_value("process-1", None, None).unwrap();
    amount_instance.set_data_value(Some(&value)).unwrap();
    context
        .values()
        .push_data(value.id(), Bytes::from_static(b"100"))
        .unwrap();

    assert_eq!(amount_instance.state(), InstanceState::Initialized);
    assert_eq!(order.state(), InstanceState::Initialized);

    let delivered = receiver.recv().await.unwrap();
    assert_eq!(delivered.notification_id, notification.to_string());
    assert!(delivered.message.contains(&format!("Identifier={}", order.id())));
    assert!(receiver.try_recv().is_err());
    assert_eq!(context.dispatcher().deliveries(notification), Some(1));

    context.shutdown();
}

#[test]
fn test_object_delete_cascades_to_elements() {
    let context = TradeContext::builder().build();
    let (object, elements) = ready_object(&context, "teamA", "orderData", &["amount", "note"]);

    object.delete().unwrap();
    assert_eq!(object.state(), ModelState::Deleted);
    for element in &elements {
        assert_eq!(element.state(), ModelState::Deleted);
    }
    assert!(object.data_elements().is_empty());
    assert_eq!(object.name(), "");

    let again = object.delete().unwrap_err();
    assert!(again.is_lifecycle_error());
}

#[test]
fn test_add_then_remove_restores_initial() {
    let context = TradeContext::builder().build();
    let recorder = Recorder::new("recorder");
    context.bus().register_listener(recorder.clone()).unwrap();

    let object = context.create_data_object("teamA", "orderData");
    let amount = context.create_data_element(&object, "amount", None, None);
    amount.initialize().unwrap();

    object.add_data_element(&amount).unwrap();
    assert_eq!(object.state(), ModelState::Ready);
    object.delete_data_element(&amount).unwrap();
    assert_eq!(object.state(), ModelState::Initial);
    assert_eq!(amount.state(), ModelState::Deleted);

    let object_transitions: Vec<_> = recorder
        .transitions()
        .into_iter()
        .filter(|(class, _, _)| class == "DataObject")
        .map(|(_, old, new)| (old, new))
        .collect();
    assert_eq!(
        object_transitions,
        vec![
            (None, "INITIAL".to_string()),
            (Some("INITIAL".to_string()), "READY".to_string()),
            (Some("READY".to_string()), "INITIAL".to_string()),
        ]
    );
}

#[test]
fn test_unready_element_is_rejected() {
    let context = TradeContext::builder().build();
    let object = context.create_data_object("teamA", "orderData");
    let amount = context.create_data_element(&object, "amount", None, None);

    let err = object.add_data_element(&amount).unwrap_err();
    assert!(err.is_lifecycle_error());
    assert_eq!(object.state(), ModelState::Initial);
    assert!(object.data_elements().is_empty());
}

#[test]
fn test_value_drives_instances_both_ways() {
    let context = TradeContext::builder().build();
    let (object, elements) = ready_object(&context, "teamA", "orderData", &["amount"]);
    let order = object.instantiate("process-1", correlation(&[])).unwrap();
    let amount = elements[0].instantiate(&order, "process-1").unwrap();
    let value = context.create_data_value("process-1", None, None).unwrap();
    amount.set_data_value(Some(&value)).unwrap();

    value.set_data(Some(Bytes::from_static(b"100"))).unwrap();
    assert!(amount.is_initialized());
    assert!(order.is_initialized());

    value.set_data(Some(Bytes::new())).unwrap();
    assert_eq!(value.state(), InstanceState::Created);
    assert_eq!(amount.state(), InstanceState::Created);
    assert_eq!(order.state(), InstanceState::Created);
}

#[test]
fn test_binding_requires_created_value() {
    let context = TradeContext::builder().build();
    let (object, elements) = ready_object(&context, "teamA", "orderData", &["amount"]);
    let order = object.instantiate("process-1", correlation(&[])).unwrap();
    let amount = elements[0].instantiate(&order, "process-1").unwrap();

    let value = context.create_data_value("process-1", None, None).unwrap();
    value.set_data(Some(Bytes::from_static(b"100"))).unwrap();
    let err = amount.set_data_value(Some(&value)).unwrap_err();
    assert!(err.is_lifecycle_error());
    assert!(amount.data_value().is_none());
}

#[test]
fn test_any_element_policy_initializes_early() {
    let config = TradeConfig {
        instance_initialization: InitializationPolicy::AnyElement,
        ..TradeConfig::default()
    };
    let context = TradeContext::builder().config(config).build();
    let (object, elements) = ready_object(&context, "teamA", "orderData", &["amount", "note"]);
    let order = object.instantiate("process-1", correlation(&[])).unwrap();
    let amount = elements[0].instantiate(&order, "process-1").unwrap();
    let _note = elements[1].instantiate(&order, "process-1").unwrap();

    let value = context.create_data_value("process-1", None, None).unwrap();
    amount.set_data_value(Some(&value)).unwrap();
    value.set_data(Some(Bytes::from_static(b"100"))).unwrap();
    assert!(order.is_initialized());
}

#[test]
fn test_initialization_fires_once() {
    let context = TradeContext::builder().build();
    let recorder = Recorder::new("recorder");
    context.bus().register_listener(recorder.clone()).unwrap();

    let object = context.create_data_object("teamA", "orderData");
    let created: Vec<_> = recorder
        .transitions()
        .into_iter()
        .filter(|(class, old, _)| class == "DataObject" && old.is_none())
        .collect();
    assert_eq!(created.len(), 1);
    assert_eq!(object.state(), ModelState::Initial);
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Ready,
    Archive,
    Unarchive,
    Delete,
}

impl Operation {
    fn trigger(self) -> Trigger {
        match self {
            Operation::Ready => Trigger::Ready,
            Operation::Archive => Trigger::Archive,
            Operation::Unarchive => Trigger::Unarchive,
            Operation::Delete => Trigger::Delete,
        }
    }
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Ready),
        Just(Operation::Archive),
        Just(Operation::Unarchive),
        Just(Operation::Delete),
    ]
}

proptest! {
    #[test]
    fn model_follows_transition_table(operations in prop::collection::vec(operation(), 1..24)) {
        let context = TradeContext::builder().build();
        let (model, _) = context
            .models()
            .register(support::ORDER_GRAPH.as_bytes())
            .unwrap();
        let model = Arc::clone(&model);

        for op in operations {
            let before = model.state();
            let result = match op {
                Operation::Ready => model.ready(),
                Operation::Archive => model.archive(),
                Operation::Unarchive => model.unarchive(),
                Operation::Delete => model.delete(),
            };
            match next_phase(before.phase(), op.trigger()) {
                Some(next) => {
                    prop_assert!(result.is_ok());
                    prop_assert_eq!(model.state().phase(), next);
                }
                None => {
                    prop_assert!(result.unwrap_err().is_lifecycle_error());
                    prop_assert_eq!(model.state(), before);
                }
            }
        }
    }
}
