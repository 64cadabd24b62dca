// Copyright 2025 Cowboy AI, LLC.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::errors::TradeResult;
use crate::events::TradeEvent;
use crate::model::DataTransformation;

/// Sink for transformations that should run now
#[cfg_attr(test, mockall::automock)]
pub trait TransformationExecutor: Send + Sync {
    /// Run `transformation` with `trigger` as its input event
    fn execute(&self, transformation: &Arc<DataTransformation>, trigger: &TradeEvent) -> TradeResult<()>;
}

/// Executor that only logs what would run
#[derive(Debug, Default)]
pub struct LoggingExecutor {
    executed: AtomicUsize,
}

impl LoggingExecutor {
    /// Create an executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transformations handed to this executor
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::Relaxed)
    }
}

impl TransformationExecutor for LoggingExecutor {
    fn execute(&self, transformation: &Arc<DataTransformation>, trigger: &TradeEvent) -> TradeResult<()> {
        self.executed.fetch_add(1, Ordering::Relaxed);
        info!(
            transformation = transformation.name(),
            transformer = transformation.transformer(),
            source = %transformation.source(),
            target = %transformation.target(),
            trigger = trigger.identifier(),
            "transformation triggered"
        );
        Ok(())
    }
}
