// Copyright 2025 Cowboy AI, LLC.

//! Transformation correlation
//!
//! The [`TransformationCorrelator`] listens for data changes, works out
//! which declared [`DataTransformation`](crate::model::DataTransformation)s a
//! changed data value triggers and hands each of them to a
//! [`TransformationExecutor`]. Running the transformation itself is the
//! executor's business.

mod correlator;
mod executor;

pub use correlator::{TransformationCorrelator, CORRELATOR_NAME};
pub use executor::{LoggingExecutor, TransformationExecutor};

#[cfg(test)]
pub(crate) use executor::MockTransformationExecutor;
