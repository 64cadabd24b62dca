// Copyright 2025 Cowboy AI, LLC.

//! Data dependency graph compilation
//!
//! A compiler turns a serialized graph definition into a [`DataModel`] plus
//! the issues found along the way. [`JsonGraphCompiler`] reads this shape:
//!
//! ```json
//! {
//!   "name": "orders",
//!   "namespace": "http://example.org/orders",
//!   "entity": "teamA",
//!   "dataObjects": [
//!     { "name": "orderData",
//!       "dataElements": [ { "name": "amount", "contentType": "text/plain", "type": "decimal" } ] }
//!   ],
//!   "transformations": [
//!     { "name": "computeTotal", "source": "orderData/amount", "target": "invoice",
//!       "transformer": "sum", "parameters": { "precision": "2" } }
//!   ]
//! }
//! ```
//!
//! Resource paths are `"object"` or `"object/element"`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::auditing::EventBus;
use crate::entity::ModelEntity;
use crate::model::{DataElement, DataModel, DataTransformation, ResourceRef};

/// How bad a compilation issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum IssueSeverity {
    /// The affected part was skipped, or no model could be built
    Error,
    /// The model was built but may not be what was meant
    Warning,
}

/// A problem found while compiling a graph definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CompilationIssue {
    /// Severity
    pub severity: IssueSeverity,
    /// Where in the definition, e.g. `dataObjects/orderData`
    pub location: Option<String>,
    /// What is wrong
    pub message: String,
}

impl CompilationIssue {
    fn error(location: Option<String>, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            location,
            message: message.into(),
        }
    }

    fn warning(location: Option<String>, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompilationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{:?} at {location}: {}", self.severity, self.message),
            None => write!(f, "{:?}: {}", self.severity, self.message),
        }
    }
}

/// Result of a compilation
#[derive(Debug, Default)]
pub struct CompilationOutcome {
    /// The compiled model, absent when the definition was unusable
    pub model: Option<Arc<DataModel>>,
    /// Everything worth reporting
    pub issues: Vec<CompilationIssue>,
}

impl CompilationOutcome {
    /// Check if any issue is an error
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == IssueSeverity::Error)
    }
}

/// Compiles serialized graph definitions into data models
pub trait DataDependencyGraphCompiler: Send + Sync {
    /// Compile `definition`; entities are created on `bus`
    fn compile(&self, bus: &Arc<EventBus>, definition: &[u8]) -> CompilationOutcome;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDefinition {
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    entity: String,
    #[serde(default)]
    data_objects: Vec<ObjectDefinition>,
    #[serde(default)]
    transformations: Vec<TransformationDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectDefinition {
    name: String,
    #[serde(default)]
    data_elements: Vec<ElementDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ElementDefinition {
    name: String,
    content_type: Option<String>,
    #[serde(rename = "type")]
    data_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransformationDefinition {
    name: String,
    source: String,
    target: String,
    transformer: String,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
}

/// Compiler for JSON graph definitions
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonGraphCompiler;

impl JsonGraphCompiler {
    /// Create a compiler
    pub fn new() -> Self {
        Self
    }

    fn build_object(
        model: &DataModel,
        definition: &ObjectDefinition,
        issues: &mut Vec<CompilationIssue>,
    ) {
        let location = format!("dataObjects/{}", definition.name);
        if model.data_object(&definition.name).is_some() {
            issues.push(CompilationIssue::warning(
                Some(location),
                "duplicate data object ignored",
            ));
            return;
        }
        let object = match model.create_data_object(definition.name.as_str()) {
            Ok(object) => object,
            Err(e) => {
                issues.push(CompilationIssue::error(Some(location), e.to_string()));
                return;
            }
        };
        for element in &definition.data_elements {
            let element_location = format!("{location}/{}", element.name);
            if object.data_element(&element.name).is_some() {
                issues.push(CompilationIssue::warning(
                    Some(element_location),
                    "duplicate data element ignored",
                ));
                continue;
            }
            let compiled = DataElement::new(
                &object,
                element.name.as_str(),
                element.content_type.clone(),
                element.data_type.clone(),
            );
            if let Err(e) = compiled
                .initialize()
                .and_then(|_| object.add_data_element(&compiled))
            {
                issues.push(CompilationIssue::error(Some(element_location), e.to_string()));
            }
        }
        if object.data_elements().is_empty() {
            issues.push(CompilationIssue::warning(
                Some(location),
                "data object has no data elements and stays INITIAL",
            ));
        }
    }

    fn resolve(model: &DataModel, path: &str) -> Option<ResourceRef> {
        match path.split_once('/') {
            None => model
                .data_object(path)
                .map(|object| ResourceRef::DataObject(object.id())),
            Some((object, element)) => model
                .data_object(object)?
                .data_element(element)
                .map(|element| ResourceRef::DataElement(element.id())),
        }
    }

    fn build_transformation(
        model: &DataModel,
        definition: &TransformationDefinition,
        issues: &mut Vec<CompilationIssue>,
    ) {
        let location = Some(format!("transformations/{}", definition.name));
        let Some(source) = Self::resolve(model, &definition.source) else {
            issues.push(CompilationIssue::error(
                location,
                format!("source '{}' cannot be resolved", definition.source),
            ));
            return;
        };
        let Some(target) = Self::resolve(model, &definition.target) else {
            issues.push(CompilationIssue::error(
                location,
                format!("target '{}' cannot be resolved", definition.target),
            ));
            return;
        };
        let transformation = DataTransformation::new(
            model.id(),
            definition.name.as_str(),
            source,
            target,
            definition.transformer.as_str(),
            definition.parameters.clone(),
        );
        if let Err(e) = model.add_transformation(transformation) {
            issues.push(CompilationIssue::error(location, e.to_string()));
        }
    }
}

impl DataDependencyGraphCompiler for JsonGraphCompiler {
    fn compile(&self, bus: &Arc<EventBus>, definition: &[u8]) -> CompilationOutcome {
        let mut outcome = CompilationOutcome::default();
        let graph: GraphDefinition = match serde_json::from_slice(definition) {
            Ok(graph) => graph,
            Err(e) => {
                outcome
                    .issues
                    .push(CompilationIssue::error(None, format!("invalid definition: {e}")));
                return outcome;
            }
        };
        if graph.data_objects.is_empty() {
            outcome.issues.push(CompilationIssue::error(
                Some("dataObjects".to_string()),
                "a data dependency graph needs at least one data object",
            ));
            return outcome;
        }

        let model = DataModel::new(bus, graph.name, graph.namespace, graph.entity);
        for object in &graph.data_objects {
            Self::build_object(&model, object, &mut outcome.issues);
        }
        for transformation in &graph.transformations {
            Self::build_transformation(&model, transformation, &mut outcome.issues);
        }
        if let Err(e) = model.ready() {
            outcome.issues.push(CompilationIssue::error(None, e.to_string()));
        }
        debug!(
            data_model = %model.id(),
            objects = model.data_objects().len(),
            transformations = model.transformations().len(),
            issues = outcome.issues.len(),
            "compiled data dependency graph"
        );
        outcome.model = Some(model);
        outcome
    }
}
