// Copyright 2025 Cowboy AI, LLC.

//! Transformation correlation driven through a running context

mod support;

use bytes::Bytes;
use mockall::mock;
use mockall::predicate::always;
use pretty_assertions::assert_eq;
use std::sync::Arc;

use support::{correlation, ORDER_GRAPH};
use trade_core::{
    DataElementInstance, DataModel, DataTransformation, ModelEntity, TradeContext, TradeEvent,
    TradeResult, TransformationExecutor,
};

mock! {
    Executor {}

    impl TransformationExecutor for Executor {
        fn execute(&self, transformation: &Arc<DataTransformation>, trigger: &TradeEvent) -> TradeResult<()>;
    }
}

fn started(executor: MockExecutor) -> (TradeContext, Arc<DataModel>) {
    let context = TradeContext::builder().executor(Arc::new(executor)).build();
    context.start().unwrap();
    let (model, issues) = context.models().register(ORDER_GRAPH.as_bytes()).unwrap();
    assert!(issues.is_empty());
    (context, model)
}

fn amount_instance(model: &DataModel, process: &str) -> Arc<DataElementInstance> {
    let order = model.data_object("orderData").unwrap();
    let instance = order.instantiate(process, correlation(&[])).unwrap();
    order
        .data_element("amount")
        .unwrap()
        .instantiate(&instance, process)
        .unwrap()
}

#[test]
fn test_second_change_is_served_from_cache() {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .with(always(), always())
        .times(4)
        .returning(|_, _| Ok(()));
    let (context, model) = started(executor);

    let amount = amount_instance(&model, "process-1");
    let value = context.create_data_value("process-1", None, None).unwrap();
    amount.set_data_value(Some(&value)).unwrap();

    context
        .values()
        .push_data(value.id(), Bytes::from_static(b"100"))
        .unwrap();
    let correlator = context.correlator();
    assert_eq!(correlator.cache_len(), 1);
    let cached = correlator.cached(&value.id().to_string()).unwrap();
    assert!(cached.iter().any(|t| t.name() == "computeTotal"));

    context
        .values()
        .push_data(value.id(), Bytes::from_static(b"250"))
        .unwrap();
    assert_eq!(correlator.scan_count(), 1);
}

#[test]
fn test_shared_value_accumulates_related_instances() {
    let mut executor = MockExecutor::new();
    executor.expect_execute().returning(|_, _| Ok(()));
    let (context, model) = started(executor);

    let first = amount_instance(&model, "process-1");
    let second = amount_instance(&model, "process-2");
    let value = context.create_data_value("process-1", None, None).unwrap();
    first.set_data_value(Some(&value)).unwrap();
    second.set_data_value(Some(&value)).unwrap();

    value.set_data(Some(Bytes::from_static(b"100"))).unwrap();

    let key = value.id().to_string();
    let compute = model.transformation("computeTotal").unwrap();
    assert_eq!(
        compute.related_instances(&key).len(),
        2,
        "both element instances sharing the value are related"
    );
    assert_eq!(context.correlator().cached(&key).unwrap().len(), 2);
}

#[test]
fn test_rebinding_invalidates_correlation() {
    let mut executor = MockExecutor::new();
    executor.expect_execute().returning(|_, _| Ok(()));
    let (context, model) = started(executor);

    let amount = amount_instance(&model, "process-1");
    let value = context.create_data_value("process-1", None, None).unwrap();
    amount.set_data_value(Some(&value)).unwrap();
    value.set_data(Some(Bytes::from_static(b"100"))).unwrap();
    let key = value.id().to_string();
    assert!(context.correlator().cached(&key).is_some());

    amount.set_data_value(None).unwrap();
    assert!(context.correlator().cached(&key).is_none());
    for transformation in model.transformations() {
        assert!(transformation.related_instances(&key).is_empty());
    }
}

#[test]
fn test_shutdown_stops_correlation() {
    let mut executor = MockExecutor::new();
    executor.expect_execute().times(2).returning(|_, _| Ok(()));
    let (context, model) = started(executor);

    let amount = amount_instance(&model, "process-1");
    let value = context.create_data_value("process-1", None, None).unwrap();
    amount.set_data_value(Some(&value)).unwrap();
    value.set_data(Some(Bytes::from_static(b"100"))).unwrap();

    context.shutdown();
    assert_eq!(context.correlator().cache_len(), 0);
    value.set_data(Some(Bytes::from_static(b"200"))).unwrap();
    assert_eq!(context.correlator().scan_count(), 1);
}
