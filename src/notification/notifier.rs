// Copyright 2025 Cowboy AI, LLC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::TradeConfig;
use crate::errors::{TradeError, TradeResult};
use crate::notification::Notification;

/// A notifier back-end
pub trait NotifierService: Send + Sync {
    /// Implementation key
    fn id(&self) -> &str;

    /// Called once before the first notification
    fn startup(&self, _config: &TradeConfig) -> TradeResult<()> {
        Ok(())
    }

    /// Called once when the dispatcher shuts down
    fn shutdown(&self) -> TradeResult<()> {
        Ok(())
    }

    /// Deliver `message` for `notification`
    fn execute_notification(&self, notification: &Notification, message: &str) -> TradeResult<()>;

    /// Parameter key → description
    fn describe_parameters(&self) -> BTreeMap<String, String>;
}

/// Builds a notifier instance
pub type NotifierFactory = Arc<dyn Fn() -> Arc<dyn NotifierService> + Send + Sync>;

/// Notifier implementations by key
#[derive(Clone, Default)]
pub struct NotifierRegistry {
    factories: BTreeMap<String, NotifierFactory>,
}

impl NotifierRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled [`LoggingNotifier`]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(LoggingNotifier::ID, || -> Arc<dyn NotifierService> {
            Arc::new(LoggingNotifier)
        });
        registry
    }

    /// Register (or replace) the factory for `key`
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn NotifierService> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Arc::new(factory));
    }

    /// Build a fresh instance of `key`
    pub fn create(&self, key: &str) -> Option<Arc<dyn NotifierService>> {
        self.factories.get(key).map(|factory| factory())
    }

    /// Check if `key` is registered
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys
    pub fn keys(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl fmt::Debug for NotifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Notifier writing messages to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    /// Implementation key
    pub const ID: &'static str = "logging";
}

impl NotifierService for LoggingNotifier {
    fn id(&self) -> &str {
        Self::ID
    }

    fn execute_notification(&self, notification: &Notification, message: &str) -> TradeResult<()> {
        let target = notification
            .notifier_parameters
            .get("target")
            .map(String::as_str)
            .unwrap_or("-");
        info!(
            notification = %notification.id,
            name = %notification.name,
            target,
            message,
            "notification"
        );
        Ok(())
    }

    fn describe_parameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            "target".to_string(),
            "Free-form label written next to the message".to_string(),
        )])
    }
}

/// A delivered notification, as seen by in-process consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Id of the notification that matched
    pub notification_id: String,
    /// Name of the notification that matched
    pub notification_name: String,
    /// Notifier parameters of the notification
    pub parameters: BTreeMap<String, String>,
    /// Rendered message
    pub message: String,
    /// When the message was handed over
    pub delivered_at: DateTime<Utc>,
}

/// Notifier forwarding messages into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<NotificationMessage>,
}

impl ChannelNotifier {
    /// Implementation key
    pub const ID: &'static str = "channel";

    /// Notifier sending into `sender`
    pub fn new(sender: mpsc::UnboundedSender<NotificationMessage>) -> Self {
        Self { sender }
    }

    /// Notifier plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl NotifierService for ChannelNotifier {
    fn id(&self) -> &str {
        Self::ID
    }

    fn execute_notification(&self, notification: &Notification, message: &str) -> TradeResult<()> {
        self.sender
            .send(NotificationMessage {
                notification_id: notification.id.to_string(),
                notification_name: notification.name.clone(),
                parameters: notification.notifier_parameters.clone(),
                message: message.to_string(),
                delivered_at: Utc::now(),
            })
            .map_err(|_| TradeError::NotifierFailure {
                notifier: Self::ID.to_string(),
                message: "receiver dropped".to_string(),
            })
    }

    fn describe_parameters(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}
