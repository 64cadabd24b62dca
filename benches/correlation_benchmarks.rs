// Copyright 2025 Cowboy AI, LLC.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeMap;
use std::sync::Arc;

use trade_core::{
    DataValue, EventKind, ModelClass, Notification, TradeContext, TradeEvent,
};

fn graph(objects: usize) -> String {
    let data_objects: Vec<String> = (0..objects)
        .map(|i| format!(r#"{{ "name": "object{i}", "dataElements": [ {{ "name": "value" }} ] }}"#))
        .collect();
    let transformations: Vec<String> = (1..objects)
        .map(|i| {
            format!(
                r#"{{ "name": "step{i}", "source": "object{}/value", "target": "object{i}/value", "transformer": "copy" }}"#,
                i - 1
            )
        })
        .collect();
    format!(
        r#"{{ "name": "chain", "entity": "bench", "dataObjects": [{}], "transformations": [{}] }}"#,
        data_objects.join(","),
        transformations.join(",")
    )
}

fn bound_value(context: &TradeContext, objects: usize) -> Arc<DataValue> {
    let (model, _) = context
        .models()
        .register(graph(objects).as_bytes())
        .expect("graph compiles");
    let object = model.data_object("object0").expect("first object");
    let instance = object
        .instantiate("bench", BTreeMap::new())
        .expect("object instance");
    let element_instance = object
        .data_element("value")
        .expect("element")
        .instantiate(&instance, "bench")
        .expect("element instance");
    let value = context
        .create_data_value("bench", None, None)
        .expect("data value");
    element_instance
        .set_data_value(Some(&value))
        .expect("binding");
    value
}

fn benchmark_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation");

    for objects in [2usize, 16, 64] {
        let context = TradeContext::builder().build();
        context.start().expect("context starts");
        let value = bound_value(&context, objects);

        group.bench_with_input(BenchmarkId::new("cached", objects), &objects, |b, _| {
            b.iter(|| {
                value
                    .set_data(Some(Bytes::from_static(b"42")))
                    .expect("set data")
            })
        });

        group.bench_with_input(BenchmarkId::new("resolved", objects), &objects, |b, _| {
            b.iter(|| {
                context.correlator().clear_cache();
                value
                    .set_data(Some(Bytes::from_static(b"42")))
                    .expect("set data")
            })
        });
    }

    group.finish();
}

fn benchmark_filter_matching(c: &mut Criterion) {
    let event = TradeEvent::state_change(
        ModelClass::DataObjectInstance,
        "instance-1".to_string(),
        None,
        Some("CREATED"),
        "INITIALIZED",
        "initialize",
    );
    let notification = Notification::new("initialized", "logging")
        .with_filter("ModelClass", "DataObjectInstance")
        .with_filter("OldState", "CREATED")
        .with_filter("NewState", "INITIALIZED");

    c.bench_function("filter_match", |b| {
        b.iter(|| black_box(notification.matches(black_box(&event))))
    });

    c.bench_function("render_fields", |b| {
        b.iter(|| black_box(event.render_fields()))
    });

    c.bench_function("filter_catalogue", |b| {
        b.iter(|| black_box(TradeEvent::filter_catalogue(EventKind::InstanceLifecycle)))
    });
}

fn benchmark_dispatch(c: &mut Criterion) {
    let context = TradeContext::builder().build();
    context.start().expect("context starts");
    for i in 0..32 {
        context
            .dispatcher()
            .register_notification(
                Notification::new(format!("n{i}"), "logging")
                    .with_filter("NewState", if i % 2 == 0 { "READY" } else { "ARCHIVED" })
                    .with_message("bench"),
            )
            .expect("registered");
    }
    let event = TradeEvent::state_change(
        ModelClass::DataObject,
        "object-1".to_string(),
        None,
        Some("INITIAL"),
        "READY",
        "ready",
    );

    c.bench_function("dispatch_32_notifications", |b| {
        b.iter(|| black_box(context.dispatcher().dispatch(black_box(&event))))
    });
}

criterion_group!(
    benches,
    benchmark_correlation,
    benchmark_filter_matching,
    benchmark_dispatch
);
criterion_main!(benches);
