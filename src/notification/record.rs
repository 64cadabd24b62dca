// Copyright 2025 Cowboy AI, LLC.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::{EntityId, NotificationMarker};
use crate::events::TradeEvent;

/// A registered rule forwarding filtered lifecycle events to a notifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Notification {
    /// Notification id
    #[schemars(with = "String")]
    pub id: EntityId<NotificationMarker>,
    /// Display name
    pub name: String,
    /// Identifier of the observed resource; `None` observes every resource
    pub resource: Option<String>,
    /// Event property → expected value, all must match
    pub filters: BTreeMap<String, String>,
    /// Notifier service id
    pub notifier_id: String,
    /// Parameters handed to the notifier
    pub notifier_parameters: BTreeMap<String, String>,
    /// Fixed message; generated from the event when absent
    pub message: Option<String>,
}

impl Notification {
    /// Create a notification without filters
    pub fn new(name: impl Into<String>, notifier_id: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            resource: None,
            filters: BTreeMap::new(),
            notifier_id: notifier_id.into(),
            notifier_parameters: BTreeMap::new(),
            message: None,
        }
    }

    /// Observe a single resource
    pub fn with_resource(mut self, identifier: impl Into<String>) -> Self {
        self.resource = Some(identifier.into());
        self
    }

    /// Add a filter
    pub fn with_filter(mut self, key: impl Into<String>, expected: impl Into<String>) -> Self {
        self.filters.insert(key.into(), expected.into());
        self
    }

    /// Add a notifier parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.notifier_parameters.insert(key.into(), value.into());
        self
    }

    /// Use a fixed message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Check if `event` is about the observed resource and satisfies every
    /// filter
    ///
    /// A filter on a property the event does not expose fails the match.
    pub fn matches(&self, event: &TradeEvent) -> bool {
        if let Some(resource) = &self.resource {
            if resource != event.identifier() {
                return false;
            }
        }
        self.filters
            .iter()
            .all(|(key, expected)| event.property(key).as_deref() == Some(expected.as_str()))
    }
}

/// Changes applied by
/// [`NotificationDispatcher::update_notification`](crate::notification::NotificationDispatcher::update_notification);
/// `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationUpdate {
    /// New name
    pub name: Option<String>,
    /// New observed resource; `Some(None)` observes every resource
    pub resource: Option<Option<String>>,
    /// Replacement filters
    pub filters: Option<BTreeMap<String, String>>,
    /// New notifier service id
    pub notifier_id: Option<String>,
    /// Replacement notifier parameters
    pub notifier_parameters: Option<BTreeMap<String, String>>,
    /// New fixed message; `Some(None)` switches to generated messages
    pub message: Option<Option<String>>,
}

impl NotificationUpdate {
    pub(crate) fn apply(self, notification: &mut Notification) {
        if let Some(name) = self.name {
            notification.name = name;
        }
        if let Some(resource) = self.resource {
            notification.resource = resource;
        }
        if let Some(filters) = self.filters {
            notification.filters = filters;
        }
        if let Some(notifier_id) = self.notifier_id {
            notification.notifier_id = notifier_id;
        }
        if let Some(parameters) = self.notifier_parameters {
            notification.notifier_parameters = parameters;
        }
        if let Some(message) = self.message {
            notification.message = message;
        }
    }
}
