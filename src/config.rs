// Copyright 2025 Cowboy AI, LLC.

//! Configuration consumed once at startup by every manager

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::errors::{TradeError, TradeResult};
use crate::state_machine::DEFAULT_TRANSITION_RETRIES;

/// How the middleware is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    /// One process owns all state
    Standalone,
    /// Several processes share a persistence back-end
    Distributed,
}

/// Where entities and registries are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Volatile, process-local storage
    InMemory,
    /// Files on a local or shared file system
    FileSystem,
    /// An external database
    Database,
}

/// How notifications reach their notifier back-ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    /// Notifiers are invoked on the caller's thread
    Direct,
    /// Notifiers hand messages to a message-routing context
    MessageRouting,
}

/// When a data object instance counts as initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InitializationPolicy {
    /// Every owned data element instance is initialized (and there is one)
    AllElements,
    /// At least one owned data element instance is initialized
    AnyElement,
}

/// TraDE core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TradeConfig {
    /// Deployment mode
    pub deployment_mode: DeploymentMode,
    /// Persistence mode
    pub persistence_mode: PersistenceMode,
    /// Notification back-end mode
    pub notification_mode: NotificationMode,
    /// Retries for a contended lifecycle transition
    pub transition_retries: u32,
    /// Data object instance initialization policy
    pub instance_initialization: InitializationPolicy,
    /// Template for generated notification messages, `{Key}` placeholders
    /// are replaced by event properties
    pub message_template: Option<String>,
    /// Notifier id → notifier implementation key
    pub notifiers: BTreeMap<String, String>,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            deployment_mode: DeploymentMode::Standalone,
            persistence_mode: PersistenceMode::InMemory,
            notification_mode: NotificationMode::Direct,
            transition_retries: DEFAULT_TRANSITION_RETRIES,
            instance_initialization: InitializationPolicy::AllElements,
            message_template: None,
            notifiers: BTreeMap::new(),
        }
    }
}

/// Environment variables read by [`TradeConfig::with_env_overrides`]
pub const ENV_DEPLOYMENT_MODE: &str = "TRADE_DEPLOYMENT_MODE";
/// See [`ENV_DEPLOYMENT_MODE`]
pub const ENV_PERSISTENCE_MODE: &str = "TRADE_PERSISTENCE_MODE";
/// See [`ENV_DEPLOYMENT_MODE`]
pub const ENV_NOTIFICATION_MODE: &str = "TRADE_NOTIFICATION_MODE";
/// See [`ENV_DEPLOYMENT_MODE`]
pub const ENV_TRANSITION_RETRIES: &str = "TRADE_TRANSITION_RETRIES";

impl TradeConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> TradeResult<Self> {
        serde_json::from_str(json).map_err(|e| TradeError::Configuration(e.to_string()))
    }

    /// Read and parse a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> TradeResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TradeError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Apply `TRADE_*` environment variables on top of this configuration
    pub fn with_env_overrides(self) -> TradeResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> TradeResult<Self> {
        if let Some(value) = lookup(ENV_DEPLOYMENT_MODE) {
            self.deployment_mode = parse_mode(ENV_DEPLOYMENT_MODE, &value)?;
        }
        if let Some(value) = lookup(ENV_PERSISTENCE_MODE) {
            self.persistence_mode = parse_mode(ENV_PERSISTENCE_MODE, &value)?;
        }
        if let Some(value) = lookup(ENV_NOTIFICATION_MODE) {
            self.notification_mode = parse_mode(ENV_NOTIFICATION_MODE, &value)?;
        }
        if let Some(value) = lookup(ENV_TRANSITION_RETRIES) {
            self.transition_retries = u32::from_str(value.trim()).map_err(|e| {
                TradeError::Configuration(format!("{ENV_TRANSITION_RETRIES}={value}: {e}"))
            })?;
        }
        Ok(self)
    }

    /// Implementation key for a notifier id; ids without an alias map to
    /// themselves
    pub fn notifier_implementation<'a>(&'a self, notifier_id: &'a str) -> &'a str {
        self.notifiers
            .get(notifier_id)
            .map(String::as_str)
            .unwrap_or(notifier_id)
    }
}

fn parse_mode<T: for<'de> Deserialize<'de>>(key: &str, value: &str) -> TradeResult<T> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_ascii_lowercase()))
        .map_err(|_| TradeError::Configuration(format!("{key}: unsupported value '{value}'")))
}
