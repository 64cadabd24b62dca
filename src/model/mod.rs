// Copyright 2025 Cowboy AI, LLC.

//! Definitional entities: data models, data objects, data elements and the
//! transformations declared between them

mod data_element;
mod data_model;
mod data_object;
mod data_transformation;
mod registry;

pub use data_element::DataElement;
pub use data_model::DataModel;
pub use data_object::DataObject;
pub use data_transformation::{DataTransformation, ResourceRef};
pub use registry::{DataModelRegistry, ModelDefinitionRecord};
