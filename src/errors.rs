// Copyright 2025 Cowboy AI, LLC.

//! Error types for TraDE core operations

use thiserror::Error;

/// Errors that can occur while driving entity lifecycles, correlating
/// transformations or dispatching notifications
#[derive(Debug, Clone, Error)]
pub enum TradeError {
    /// The requested (state, event) pair has no entry in the transition table
    #[error("Illegal transition on {model_class} {identifier}: event '{event}' in state {state}")]
    IllegalTransition {
        /// Kind of the entity the transition was requested on
        model_class: String,
        /// Identifier of the entity
        identifier: String,
        /// Current state (or `<unset>` when the lifecycle never started)
        state: String,
        /// Name of the triggering event
        event: String,
    },

    /// A structural mutation was attempted while the entity is in an
    /// incompatible state
    #[error("Illegal modification of {model_class} {identifier}: {reason}")]
    IllegalModification {
        /// Kind of the entity
        model_class: String,
        /// Identifier of the entity
        identifier: String,
        /// Why the modification was rejected
        reason: String,
    },

    /// Concurrent writers kept winning until the retry budget ran out
    #[error("Transition '{event}' on {identifier} abandoned after {attempts} contended attempts")]
    TransitionContention {
        /// Identifier of the entity
        identifier: String,
        /// Name of the triggering event
        event: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// A referenced data element or transformation could not be resolved
    #[error("Resolution failure: {0}")]
    ResolutionFailure(String),

    /// A listener failed during startup, event handling or shutdown
    #[error("Listener '{listener}' failed: {message}")]
    ListenerFailure {
        /// Name of the listener
        listener: String,
        /// Failure description
        message: String,
    },

    /// A notifier back-end failed
    #[error("Notifier '{notifier}' failed: {message}")]
    NotifierFailure {
        /// Notifier service id
        notifier: String,
        /// Failure description
        message: String,
    },

    /// The persistence collaborator failed
    #[error("Persistence failure during {operation} of {id}: {message}")]
    PersistenceFailure {
        /// Operation that failed (load, store, delete)
        operation: String,
        /// Identifier of the record
        id: String,
        /// Failure description
        message: String,
    },

    /// Not found error (generic)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Already exists error (generic)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A serialized graph definition could not be compiled at all
    #[error("Compilation error: {0}")]
    Compilation(String),
}

/// Result type for TraDE operations
pub type TradeResult<T> = Result<T, TradeError>;

impl From<serde_json::Error> for TradeError {
    fn from(err: serde_json::Error) -> Self {
        TradeError::Serialization(err.to_string())
    }
}

impl TradeError {
    /// Build an [`TradeError::IllegalModification`]
    pub fn illegal_modification(
        model_class: impl Into<String>,
        identifier: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TradeError::IllegalModification {
            model_class: model_class.into(),
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`TradeError::PersistenceFailure`]
    pub fn persistence(
        operation: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TradeError::PersistenceFailure {
            operation: operation.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, TradeError::NotFound(_))
    }

    /// Check if this error was raised by the lifecycle engine or a
    /// structural invariant
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(
            self,
            TradeError::IllegalTransition { .. }
                | TradeError::IllegalModification { .. }
                | TradeError::TransitionContention { .. }
        )
    }

    /// Check if retrying the operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, TradeError::TransitionContention { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = TradeError::IllegalTransition {
            model_class: "DataObject".to_string(),
            identifier: "42".to_string(),
            state: "DELETED".to_string(),
            event: "ready".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Illegal transition on DataObject 42: event 'ready' in state DELETED"
        );

        let err = TradeError::illegal_modification("DataObject", "42", "object is archived");
        assert_eq!(
            err.to_string(),
            "Illegal modification of DataObject 42: object is archived"
        );

        let err = TradeError::persistence("store", "n-1", "disk full");
        assert_eq!(
            err.to_string(),
            "Persistence failure during store of n-1: disk full"
        );

        let err = TradeError::NotFound("Notification n-1".to_string());
        assert_eq!(err.to_string(), "Not found: Notification n-1");
    }

    #[test]
    fn test_error_classification() {
        let contention = TradeError::TransitionContention {
            identifier: "v".to_string(),
            event: "initialize".to_string(),
            attempts: 3,
        };
        assert!(contention.is_lifecycle_error());
        assert!(contention.is_retryable());

        let modification = TradeError::illegal_modification("DataObject", "o", "archived");
        assert!(modification.is_lifecycle_error());
        assert!(!modification.is_retryable());

        assert!(TradeError::NotFound("x".to_string()).is_not_found());
        assert!(!TradeError::ResolutionFailure("x".to_string()).is_lifecycle_error());
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: TradeError = parse_err.into();
        assert!(matches!(err, TradeError::Serialization(_)));
    }
}
