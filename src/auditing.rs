// Copyright 2025 Cowboy AI, LLC.

//! Auditing bus
//!
//! Process-wide publish/subscribe hub for [`TradeEvent`]s. Events are
//! delivered synchronously, on the caller's thread, to every registered
//! listener in registration order. The listener list is copy-on-write:
//! firing works on a snapshot and never blocks registration.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::config::TradeConfig;
use crate::errors::{TradeError, TradeResult};
use crate::events::TradeEvent;

/// Subscriber of the auditing bus
pub trait AuditingListener: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Called once when the listener is registered
    fn startup(&self, _config: &TradeConfig) -> TradeResult<()> {
        Ok(())
    }

    /// Handle one event
    fn on_event(&self, event: &TradeEvent) -> TradeResult<()>;

    /// Called once when the listener is unregistered
    fn shutdown(&self) -> TradeResult<()> {
        Ok(())
    }
}

type ListenerList = Arc<Vec<Arc<dyn AuditingListener>>>;

/// Synchronous, ordered event bus
pub struct EventBus {
    config: Arc<TradeConfig>,
    listeners: RwLock<ListenerList>,
}

impl EventBus {
    /// Create a bus handing `config` to listeners on startup
    pub fn new(config: Arc<TradeConfig>) -> Self {
        Self {
            config,
            listeners: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Configuration handed to listeners
    pub fn config(&self) -> &Arc<TradeConfig> {
        &self.config
    }

    /// Start `listener` and append it to the delivery list
    ///
    /// The bus does not deduplicate: registering the same listener twice
    /// delivers every event to it twice.
    pub fn register_listener(&self, listener: Arc<dyn AuditingListener>) -> TradeResult<()> {
        listener
            .startup(&self.config)
            .map_err(|e| TradeError::ListenerFailure {
                listener: listener.name().to_string(),
                message: format!("startup failed: {e}"),
            })?;

        let mut guard = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        debug!(listener = listener.name(), "registering auditing listener");
        next.push(listener);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Shut `listener` down and remove one registration of it
    ///
    /// Shutdown failures are logged, never propagated. Returns `false` when
    /// the listener was not registered.
    pub fn unregister_listener(&self, listener: &Arc<dyn AuditingListener>) -> bool {
        let registered = self
            .snapshot()
            .iter()
            .any(|l| same_listener(l, listener));
        if !registered {
            return false;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| listener.shutdown())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(listener = listener.name(), error = %e, "listener shutdown failed"),
            Err(_) => warn!(listener = listener.name(), "listener panicked during shutdown"),
        }

        let mut guard = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<_> = guard.iter().cloned().collect();
        let removed = match next.iter().position(|l| same_listener(l, listener)) {
            Some(index) => {
                next.remove(index);
                true
            }
            None => false,
        };
        *guard = Arc::new(next);
        debug!(listener = listener.name(), removed, "unregistered auditing listener");
        removed
    }

    /// Deliver `event` to every registered listener, in registration order
    ///
    /// A failing or panicking listener is logged and skipped.
    pub fn fire_event(&self, event: &TradeEvent) {
        for listener in self.snapshot().iter() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    listener = listener.name(),
                    kind = event.kind().name(),
                    identifier = event.identifier(),
                    error = %e,
                    "listener failed to handle event"
                ),
                Err(_) => warn!(
                    listener = listener.name(),
                    kind = event.kind().name(),
                    identifier = event.identifier(),
                    "listener panicked while handling event"
                ),
            }
        }
    }

    /// Number of registrations
    pub fn listener_count(&self) -> usize {
        self.snapshot().len()
    }

    fn snapshot(&self) -> ListenerList {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn same_listener(a: &Arc<dyn AuditingListener>, b: &Arc<dyn AuditingListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
