// Copyright 2025 Cowboy AI, LLC.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auditing::AuditingListener;
use crate::entity::ModelEntity;
use crate::errors::{TradeError, TradeResult};
use crate::events::{EventKind, TradeEvent};
use crate::instance::DataValue;
use crate::model::{DataModelRegistry, DataTransformation};
use crate::state_machine::ModelState;
use crate::transformation::TransformationExecutor;

/// Name the correlator registers under
pub const CORRELATOR_NAME: &str = "transformation-correlator";

/// Matches data changes to the transformations they trigger
///
/// Resolved matches are cached per data value id until an association
/// change on that value invalidates them. Only non-empty results are cached.
pub struct TransformationCorrelator {
    models: Arc<DataModelRegistry>,
    executor: Arc<dyn TransformationExecutor>,
    cache: DashMap<String, Vec<Arc<DataTransformation>>>,
    graph_scans: AtomicUsize,
}

impl TransformationCorrelator {
    /// Create a correlator resolving against `models`
    pub fn new(models: Arc<DataModelRegistry>, executor: Arc<dyn TransformationExecutor>) -> Self {
        Self {
            models,
            executor,
            cache: DashMap::new(),
            graph_scans: AtomicUsize::new(0),
        }
    }

    /// Number of cached data values
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Cached matches for a data value
    pub fn cached(&self, value_id: &str) -> Option<Vec<Arc<DataTransformation>>> {
        self.cache.get(value_id).map(|entry| entry.value().clone())
    }

    /// How often the data models were scanned for matches
    pub fn scan_count(&self) -> usize {
        self.graph_scans.load(Ordering::Relaxed)
    }

    /// Drop every cached match
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn on_data_change(&self, event: &TradeEvent) {
        let Some(value) = event.source().and_then(|source| source.as_data_value()) else {
            debug!(identifier = event.identifier(), "data event without a data value source ignored");
            return;
        };
        let key = event.identifier();
        // Resolution runs under the entry lock so an invalidation of the
        // same value waits for it instead of being overwritten.
        let matched = match self.cache.entry(key.to_string()) {
            Entry::Occupied(hit) => hit.get().clone(),
            Entry::Vacant(slot) => {
                let resolved = self.resolve(key, value);
                if !resolved.is_empty() {
                    slot.insert(resolved.clone());
                }
                resolved
            }
        };
        for transformation in &matched {
            self.dispatch(transformation, event);
        }
    }

    fn resolve(&self, key: &str, value: &DataValue) -> Vec<Arc<DataTransformation>> {
        self.graph_scans.fetch_add(1, Ordering::Relaxed);
        let models = self.models.ready_models();
        let mut matched: Vec<Arc<DataTransformation>> = Vec::new();

        for instance in value.associated_instances() {
            let element = instance.data_element();
            if element.state() == ModelState::Deleted {
                let failure = TradeError::ResolutionFailure(format!(
                    "data element {} of instance {} is deleted",
                    element.id(),
                    instance.id()
                ));
                warn!(data_value = key, error = %failure, "skipping unresolvable data element instance");
                continue;
            }
            for model in &models {
                for transformation in model.transformations_triggered_by(element) {
                    transformation.add_related_instance(key, instance.id().to_string());
                    if !matched.iter().any(|m| m.id() == transformation.id()) {
                        matched.push(transformation);
                    }
                }
            }
        }
        debug!(data_value = key, matched = matched.len(), "resolved triggered transformations");
        matched
    }

    fn dispatch(&self, transformation: &Arc<DataTransformation>, event: &TradeEvent) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.executor.execute(transformation, event)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                transformation = transformation.name(),
                trigger = event.identifier(),
                error = %e,
                "transformation dispatch failed"
            ),
            Err(_) => warn!(
                transformation = transformation.name(),
                trigger = event.identifier(),
                "transformation executor panicked"
            ),
        }
    }

    fn invalidate(&self, value_id: &str) {
        let entry = self.cache.entry(value_id.to_string());
        let mut forgotten = 0usize;
        for model in self.models.models() {
            for transformation in model.transformations() {
                if transformation.forget_related(value_id) {
                    forgotten += 1;
                }
            }
        }
        let evicted = match entry {
            Entry::Occupied(cached) => {
                cached.remove();
                true
            }
            Entry::Vacant(_) => false,
        };
        debug!(data_value = value_id, evicted, forgotten, "invalidated correlation");
    }
}

impl AuditingListener for TransformationCorrelator {
    fn name(&self) -> &str {
        CORRELATOR_NAME
    }

    fn on_event(&self, event: &TradeEvent) -> TradeResult<()> {
        match event.kind() {
            EventKind::Data => self.on_data_change(event),
            EventKind::Internal => self.invalidate(event.identifier()),
            _ => {}
        }
        Ok(())
    }

    fn shutdown(&self) -> TradeResult<()> {
        self.cache.clear();
        Ok(())
    }
}

impl std::fmt::Debug for TransformationCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationCorrelator")
            .field("cached_values", &self.cache.len())
            .field("graph_scans", &self.scan_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auditing::EventBus;
    use crate::compiler::JsonGraphCompiler;
    use crate::config::TradeConfig;
    use crate::instance::DataElementInstance;
    use crate::model::{DataModel, ModelDefinitionRecord};
    use crate::persistence::InMemoryPersistence;
    use crate::transformation::MockTransformationExecutor;
    use bytes::Bytes;
    use std::collections::BTreeMap;

    const GRAPH: &str = r#"{
        "name": "orders",
        "entity": "teamA",
        "dataObjects": [
            { "name": "orderData", "dataElements": [ { "name": "amount" }, { "name": "note" } ] },
            { "name": "invoice", "dataElements": [ { "name": "total" } ] }
        ],
        "transformations": [
            { "name": "computeTotal", "source": "orderData/amount", "target": "invoice/total", "transformer": "sum" },
            { "name": "auditAmount", "source": "orderData/amount", "target": "invoice", "transformer": "audit" }
        ]
    }"#;

    struct Fixture {
        bus: Arc<EventBus>,
        correlator: Arc<TransformationCorrelator>,
        model: Arc<DataModel>,
    }

    fn fixture(executor: MockTransformationExecutor) -> Fixture {
        let bus = Arc::new(EventBus::new(Arc::new(TradeConfig::default())));
        let registry = Arc::new(DataModelRegistry::new(
            bus.clone(),
            Arc::new(JsonGraphCompiler::new()),
            Arc::new(InMemoryPersistence::<ModelDefinitionRecord>::new()),
        ));
        let (model, _) = registry.register(GRAPH.as_bytes()).unwrap();
        let correlator = Arc::new(TransformationCorrelator::new(registry, Arc::new(executor)));
        bus.register_listener(correlator.clone()).unwrap();
        Fixture {
            bus,
            correlator,
            model,
        }
    }

    fn element_instance(model: &DataModel, element: &str) -> Arc<DataElementInstance> {
        let order = model.data_object("orderData").unwrap();
        let instance = order.instantiate("process-1", BTreeMap::new()).unwrap();
        order
            .data_element(element)
            .unwrap()
            .instantiate(&instance, "process-1")
            .unwrap()
    }

    #[test]
    fn test_first_event_resolves_second_hits_cache() {
        let mut executor = MockTransformationExecutor::new();
        executor.expect_execute().times(4).returning(|_, _| Ok(()));
        let f = fixture(executor);

        let amount = element_instance(&f.model, "amount");
        let value = DataValue::new(&f.bus, "process-1", None, None);
        amount.set_data_value(Some(&value)).unwrap();

        value.set_data(Some(Bytes::from_static(b"100"))).unwrap();
        assert_eq!(f.correlator.cache_len(), 1);
        let names: Vec<_> = f
            .correlator
            .cached(&value.id().to_string())
            .unwrap()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["computeTotal", "auditAmount"]);

        value.set_data(Some(Bytes::from_static(b"200"))).unwrap();
        assert_eq!(f.correlator.scan_count(), 1);

        let compute = f.model.transformation("computeTotal").unwrap();
        assert_eq!(
            compute.related_instances(&value.id().to_string()).into_iter().collect::<Vec<_>>(),
            vec![amount.id().to_string()]
        );
    }

    #[test]
    fn test_unmatched_values_are_not_cached() {
        let mut executor = MockTransformationExecutor::new();
        executor.expect_execute().never();
        let f = fixture(executor);

        let note = element_instance(&f.model, "note");
        let value = DataValue::new(&f.bus, "process-1", None, None);
        note.set_data_value(Some(&value)).unwrap();

        value.set_data(Some(Bytes::from_static(b"x"))).unwrap();
        value.set_data(Some(Bytes::from_static(b"y"))).unwrap();
        assert_eq!(f.correlator.cache_len(), 0);
        assert_eq!(f.correlator.scan_count(), 2);
    }

    #[test]
    fn test_association_change_invalidates() {
        let mut executor = MockTransformationExecutor::new();
        executor.expect_execute().returning(|_, _| Ok(()));
        let f = fixture(executor);

        let amount = element_instance(&f.model, "amount");
        let value = DataValue::new(&f.bus, "process-1", None, None);
        amount.set_data_value(Some(&value)).unwrap();
        value.set_data(Some(Bytes::from_static(b"100"))).unwrap();
        let key = value.id().to_string();
        assert!(f.correlator.cached(&key).is_some());

        f.bus.fire_event(&TradeEvent::association_changed(
            key.clone(),
            None,
            amount.id().to_string(),
            false,
        ));
        assert!(f.correlator.cached(&key).is_none());
        for transformation in f.model.transformations() {
            assert!(transformation.related_instances(&key).is_empty());
        }
    }

    #[test]
    fn test_invalidation_racing_resolution_leaves_nothing_stale() {
        let mut executor = MockTransformationExecutor::new();
        executor.expect_execute().returning(|_, _| Ok(()));
        let f = fixture(executor);

        for _ in 0..100 {
            let amount = element_instance(&f.model, "amount");
            let value = DataValue::new(&f.bus, "process-1", None, None);
            value.add_association(&amount);
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for round in 0..20u8 {
                        value.set_data(Some(Bytes::from(vec![round + 1]))).unwrap();
                    }
                });
                scope.spawn(|| {
                    for _ in 0..20 {
                        value.remove_association(amount.id());
                        value.add_association(&amount);
                    }
                    value.remove_association(amount.id());
                });
            });

            let key = value.id().to_string();
            assert!(f.correlator.cached(&key).is_none());
            for transformation in f.model.transformations() {
                assert!(transformation.related_instances(&key).is_empty());
            }
        }
    }

    #[test]
    fn test_failing_dispatch_does_not_block_others() {
        let mut executor = MockTransformationExecutor::new();
        executor
            .expect_execute()
            .withf(|t, _| t.name() == "computeTotal")
            .times(1)
            .returning(|_, _| Err(TradeError::ResolutionFailure("executor offline".to_string())));
        executor
            .expect_execute()
            .withf(|t, _| t.name() == "auditAmount")
            .times(1)
            .returning(|_, _| Ok(()));
        let f = fixture(executor);

        let amount = element_instance(&f.model, "amount");
        let value = DataValue::new(&f.bus, "process-1", None, None);
        amount.set_data_value(Some(&value)).unwrap();
        value.set_data(Some(Bytes::from_static(b"100"))).unwrap();
    }

    #[test]
    fn test_archived_models_are_not_scanned() {
        let mut executor = MockTransformationExecutor::new();
        executor.expect_execute().never();
        let f = fixture(executor);

        let amount = element_instance(&f.model, "amount");
        f.model.archive().unwrap();
        let value = DataValue::new(&f.bus, "process-1", None, None);
        amount.set_data_value(Some(&value)).unwrap();
        value.set_data(Some(Bytes::from_static(b"100"))).unwrap();
        assert_eq!(f.correlator.cache_len(), 0);
    }
}
