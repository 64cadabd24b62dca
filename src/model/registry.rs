// Copyright 2025 Cowboy AI, LLC.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::auditing::EventBus;
use crate::compiler::{CompilationIssue, DataDependencyGraphCompiler};
use crate::entity::{DataModelMarker, EntityId, ModelEntity};
use crate::errors::{TradeError, TradeResult};
use crate::model::DataModel;
use crate::persistence::PersistenceProvider;
use crate::state_machine::ModelState;
use crate::sync::{read, write};

/// Persisted form of a registered data model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModelDefinitionRecord {
    /// Model id
    pub id: String,
    /// Model name
    pub name: String,
    /// The definition the model was compiled from
    pub definition: String,
}

/// Index of the compiled data models known to one context
pub struct DataModelRegistry {
    bus: Arc<EventBus>,
    compiler: Arc<dyn DataDependencyGraphCompiler>,
    store: Arc<dyn PersistenceProvider<ModelDefinitionRecord>>,
    models: RwLock<IndexMap<EntityId<DataModelMarker>, Arc<DataModel>>>,
}

impl DataModelRegistry {
    /// Create an empty registry
    pub fn new(
        bus: Arc<EventBus>,
        compiler: Arc<dyn DataDependencyGraphCompiler>,
        store: Arc<dyn PersistenceProvider<ModelDefinitionRecord>>,
    ) -> Self {
        Self {
            bus,
            compiler,
            store,
            models: RwLock::new(IndexMap::new()),
        }
    }

    /// Compile `definition`, persist it and index the model
    ///
    /// Fails with [`TradeError::Compilation`] when no model could be built;
    /// otherwise returns the model with the issues found.
    pub fn register(&self, definition: &[u8]) -> TradeResult<(Arc<DataModel>, Vec<CompilationIssue>)> {
        let outcome = self.compiler.compile(&self.bus, definition);
        let Some(model) = outcome.model else {
            let reasons: Vec<String> = outcome.issues.iter().map(ToString::to_string).collect();
            return Err(TradeError::Compilation(reasons.join("; ")));
        };
        let record = ModelDefinitionRecord {
            id: model.id().to_string(),
            name: model.name(),
            definition: String::from_utf8_lossy(definition).into_owned(),
        };
        self.store.store(&record.id, &record)?;
        write(&self.models).insert(model.id(), model.clone());
        info!(data_model = %model.id(), name = %record.name, issues = outcome.issues.len(), "registered data model");
        Ok((model, outcome.issues))
    }

    /// Index a model built in code
    pub fn add(&self, model: Arc<DataModel>) -> TradeResult<()> {
        let mut models = write(&self.models);
        if models.contains_key(&model.id()) {
            return Err(TradeError::AlreadyExists(format!("data model {}", model.id())));
        }
        models.insert(model.id(), model);
        Ok(())
    }

    /// Model by id
    pub fn get(&self, id: EntityId<DataModelMarker>) -> TradeResult<Arc<DataModel>> {
        read(&self.models)
            .get(&id)
            .cloned()
            .ok_or_else(|| TradeError::NotFound(format!("data model {id}")))
    }

    /// Every indexed model, in registration order
    pub fn models(&self) -> Vec<Arc<DataModel>> {
        read(&self.models).values().cloned().collect()
    }

    /// Models taking part in correlation
    pub fn ready_models(&self) -> Vec<Arc<DataModel>> {
        read(&self.models)
            .values()
            .filter(|model| model.state() == ModelState::Ready)
            .cloned()
            .collect()
    }

    /// Archive a model
    pub fn archive(&self, id: EntityId<DataModelMarker>) -> TradeResult<ModelState> {
        self.get(id)?.archive()
    }

    /// Restore an archived model
    pub fn unarchive(&self, id: EntityId<DataModelMarker>) -> TradeResult<ModelState> {
        self.get(id)?.unarchive()
    }

    /// Delete a model with its objects and drop its record
    pub fn delete(&self, id: EntityId<DataModelMarker>) -> TradeResult<()> {
        let model = self.get(id)?;
        model.delete()?;
        write(&self.models).shift_remove(&id);
        if let Err(e) = self.store.delete(&id.to_string()) {
            warn!(data_model = %id, error = %e, "deleting data model record failed");
            return Err(e);
        }
        Ok(())
    }
}

impl std::fmt::Debug for DataModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataModelRegistry")
            .field("models", &read(&self.models).len())
            .finish()
    }
}
