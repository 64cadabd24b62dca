// Copyright 2025 Cowboy AI, LLC.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auditing::AuditingListener;
use crate::config::TradeConfig;
use crate::entity::{EntityId, NotificationMarker};
use crate::errors::{TradeError, TradeResult};
use crate::events::{EventKind, TradeEvent};
use crate::notification::{Notification, NotificationUpdate, NotifierRegistry, NotifierService};
use crate::persistence::PersistenceProvider;

/// Name the dispatcher registers under
pub const DISPATCHER_NAME: &str = "notification-dispatcher";

struct Route {
    notification: Notification,
    active: AtomicBool,
    deliveries: AtomicU64,
}

impl Route {
    fn activate(notification: Notification) -> Arc<Self> {
        Arc::new(Self {
            notification,
            active: AtomicBool::new(true),
            deliveries: AtomicU64::new(0),
        })
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Routes lifecycle events to the notifiers of matching notifications
///
/// Every registered notification has one route. Routes are replaced, never
/// mutated: an update deactivates the old route before a fresh one is
/// activated with the changed notification.
pub struct NotificationDispatcher {
    config: Arc<TradeConfig>,
    store: Arc<dyn PersistenceProvider<Notification>>,
    registry: NotifierRegistry,
    notifiers: DashMap<String, Arc<dyn NotifierService>>,
    routes: DashMap<EntityId<NotificationMarker>, Arc<Route>>,
}

impl NotificationDispatcher {
    /// Create a dispatcher persisting notifications in `store`
    pub fn new(
        config: Arc<TradeConfig>,
        store: Arc<dyn PersistenceProvider<Notification>>,
        registry: NotifierRegistry,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            notifiers: DashMap::new(),
            routes: DashMap::new(),
        }
    }

    /// Persist `notification` and activate its route
    pub fn register_notification(&self, notification: Notification) -> TradeResult<EntityId<NotificationMarker>> {
        if self.routes.contains_key(&notification.id) {
            return Err(TradeError::AlreadyExists(format!("notification {}", notification.id)));
        }
        self.resolve_notifier(&notification.notifier_id)?;
        self.store.store(&notification.id.to_string(), &notification)?;
        let id = notification.id;
        info!(notification = %id, name = %notification.name, notifier = %notification.notifier_id, "registered notification");
        self.routes.insert(id, Route::activate(notification));
        Ok(id)
    }

    /// Change a notification
    ///
    /// The old route is deactivated first; when the change cannot be
    /// persisted the old route is reinstated.
    pub fn update_notification(
        &self,
        id: EntityId<NotificationMarker>,
        update: NotificationUpdate,
    ) -> TradeResult<Notification> {
        let (_, old) = self
            .routes
            .remove(&id)
            .ok_or_else(|| TradeError::NotFound(format!("notification {id}")))?;
        old.deactivate();

        let mut changed = old.notification.clone();
        update.apply(&mut changed);
        let persisted = self
            .resolve_notifier(&changed.notifier_id)
            .and_then(|_| self.store.store(&id.to_string(), &changed));
        if let Err(e) = persisted {
            self.routes.insert(id, Route::activate(old.notification.clone()));
            return Err(e);
        }
        self.routes.insert(id, Route::activate(changed.clone()));
        debug!(notification = %id, "updated notification");
        Ok(changed)
    }

    /// Deactivate and remove a notification
    pub fn delete_notification(&self, id: EntityId<NotificationMarker>) -> TradeResult<()> {
        let (_, route) = self
            .routes
            .remove(&id)
            .ok_or_else(|| TradeError::NotFound(format!("notification {id}")))?;
        route.deactivate();
        self.store.delete(&id.to_string())?;
        info!(notification = %id, "deleted notification");
        Ok(())
    }

    /// Registered notifications, by name
    pub fn notifications(&self) -> Vec<Notification> {
        let mut notifications: Vec<_> = self
            .routes
            .iter()
            .map(|route| route.notification.clone())
            .collect();
        notifications.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        notifications
    }

    /// One registered notification
    pub fn get_notification(&self, id: EntityId<NotificationMarker>) -> TradeResult<Notification> {
        self.routes
            .get(&id)
            .map(|route| route.notification.clone())
            .ok_or_else(|| TradeError::NotFound(format!("notification {id}")))
    }

    /// Messages delivered through a notification's current route
    pub fn deliveries(&self, id: EntityId<NotificationMarker>) -> Option<u64> {
        self.routes
            .get(&id)
            .map(|route| route.deliveries.load(Ordering::Relaxed))
    }

    /// Notifier keys with their parameter descriptions
    pub fn available_notifiers(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.registry
            .keys()
            .into_iter()
            .filter_map(|key| {
                let parameters = match self.notifiers.get(&key) {
                    Some(started) => started.describe_parameters(),
                    None => self.registry.create(&key)?.describe_parameters(),
                };
                Some((key, parameters))
            })
            .collect()
    }

    /// Deliver `event` to every matching notification; returns the number
    /// of deliveries
    pub fn dispatch(&self, event: &TradeEvent) -> usize {
        if !matches!(event.kind(), EventKind::ModelLifecycle | EventKind::InstanceLifecycle) {
            return 0;
        }
        let mut targets: Vec<Arc<Route>> = self
            .routes
            .iter()
            .filter(|route| route.is_active() && route.notification.matches(event))
            .map(|route| route.value().clone())
            .collect();
        targets.sort_by(|a, b| a.notification.name.cmp(&b.notification.name));

        targets
            .iter()
            .filter(|route| self.deliver(route, event))
            .count()
    }

    fn deliver(&self, route: &Route, event: &TradeEvent) -> bool {
        let notification = &route.notification;
        let notifier = match self.resolve_notifier(&notification.notifier_id) {
            Ok(notifier) => notifier,
            Err(e) => {
                warn!(notification = %notification.id, error = %e, "notifier unavailable");
                return false;
            }
        };
        let message = self.render_message(notification, event);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            notifier.execute_notification(notification, &message)
        }));
        match outcome {
            Ok(Ok(())) => {
                route.deliveries.fetch_add(1, Ordering::Relaxed);
                true
            }
            Ok(Err(e)) => {
                warn!(notification = %notification.id, notifier = notifier.id(), error = %e, "notification delivery failed");
                false
            }
            Err(_) => {
                warn!(notification = %notification.id, notifier = notifier.id(), "notifier panicked");
                false
            }
        }
    }

    fn render_message(&self, notification: &Notification, event: &TradeEvent) -> String {
        if let Some(message) = &notification.message {
            return message.clone();
        }
        match &self.config.message_template {
            Some(template) => fill_template(template, event),
            None => event.render_fields(),
        }
    }

    /// Started notifier for a notifier id, starting and caching it on first
    /// use
    fn resolve_notifier(&self, notifier_id: &str) -> TradeResult<Arc<dyn NotifierService>> {
        let key = self.config.notifier_implementation(notifier_id).to_string();
        if let Some(started) = self.notifiers.get(&key) {
            return Ok(started.value().clone());
        }
        // Concurrent first uses of one key start a single instance
        let cached = self
            .notifiers
            .entry(key.clone())
            .or_try_insert_with(|| {
                let notifier = self.registry.create(&key).ok_or_else(|| {
                    TradeError::NotFound(format!("notifier '{notifier_id}' ({key})"))
                })?;
                notifier
                    .startup(&self.config)
                    .map_err(|e| TradeError::NotifierFailure {
                        notifier: key.clone(),
                        message: format!("startup failed: {e}"),
                    })?;
                Ok::<_, TradeError>(notifier)
            })?
            .value()
            .clone();
        Ok(cached)
    }
}

/// Replace `{Key}` placeholders with event properties; unknown keys stay
fn fill_template(template: &str, event: &TradeEvent) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match event.property(key) {
                    Some(value) => rendered.push_str(&value),
                    None => {
                        rendered.push('{');
                        rendered.push_str(key);
                        rendered.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                rendered.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

impl AuditingListener for NotificationDispatcher {
    fn name(&self) -> &str {
        DISPATCHER_NAME
    }

    /// Reload persisted notifications and activate their routes
    fn startup(&self, _config: &TradeConfig) -> TradeResult<()> {
        let stored = self.store.load_all(None)?;
        let mut restored = 0usize;
        for (_, notification) in stored {
            if self.routes.contains_key(&notification.id) {
                continue;
            }
            self.routes.insert(notification.id, Route::activate(notification));
            restored += 1;
        }
        info!(restored, "notification dispatcher started");
        Ok(())
    }

    fn on_event(&self, event: &TradeEvent) -> TradeResult<()> {
        self.dispatch(event);
        Ok(())
    }

    /// Deactivate every route and shut the started notifiers down
    fn shutdown(&self) -> TradeResult<()> {
        for route in self.routes.iter() {
            route.deactivate();
        }
        self.routes.clear();
        let started: Vec<_> = self
            .notifiers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.notifiers.clear();
        for notifier in started {
            if let Err(e) = notifier.shutdown() {
                warn!(notifier = notifier.id(), error = %e, "notifier shutdown failed");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("routes", &self.routes.len())
            .field("notifiers", &self.notifiers.len())
            .finish()
    }
}
