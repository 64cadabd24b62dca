// Copyright 2025 Cowboy AI, LLC.

//! Notification dispatch
//!
//! [`Notification`]s are rules of the form "when a lifecycle event about
//! resource R satisfies filters F, tell notifier N". The
//! [`NotificationDispatcher`] evaluates them for every model and instance
//! lifecycle event and hands matching events to pluggable
//! [`NotifierService`] back-ends.

mod dispatcher;
mod notifier;
mod record;

pub use dispatcher::{NotificationDispatcher, DISPATCHER_NAME};
pub use notifier::{
    ChannelNotifier, LoggingNotifier, NotificationMessage, NotifierFactory, NotifierRegistry,
    NotifierService,
};
pub use record::{Notification, NotificationUpdate};
