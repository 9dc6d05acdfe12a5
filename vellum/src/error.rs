//! Error types for the runtime.
//!
//! Uses thiserror for ergonomic error definition. Errors here describe broken
//! contracts at a call boundary and always reach the caller; faults raised
//! inside isolated units (bus handlers, navigation observers, best-effort
//! cleanup) are recorded in [`crate::diagnostics`] instead.

use crate::component::LifecycleState;
use crate::id::ComponentId;
use std::time::Duration;

/// Main error type for the runtime
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed registration arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown view or component name
    #[error("{kind} not registered: {name}")]
    NotRegistered {
        /// Catalog that was searched
        kind: EntryKind,
        /// Requested name
        name: String,
    },

    /// A bounded wait for a collaborator ran out
    #[error("Dependency '{dependency}' unavailable after {attempts} attempts ({waited:?})")]
    DependencyUnavailable {
        /// Signal that never arrived
        dependency: String,
        /// Poll attempts the wait was budgeted for
        attempts: u32,
        /// Total time waited
        waited: Duration,
    },

    /// The mount target is missing from the document
    #[error("Container not found: #{0}")]
    ContainerNotFound(String),

    /// Illegal lifecycle transition
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Event bus failure visible to the publisher
    #[error("Event bus error: {0}")]
    Bus(#[from] EventBusError),

    /// Another navigation holds the navigation slot
    #[error("Navigation to '{requested}' rejected: navigation to '{active}' in progress")]
    NavigationInProgress {
        /// View the rejected call asked for
        requested: String,
        /// View the running navigation is switching to
        active: String,
    },

    /// A component hook reported a failure
    #[error("Component '{component}' failed: {reason}")]
    Component {
        /// Component name
        component: String,
        /// What went wrong
        reason: String,
    },

    /// Settings collaborator failure
    #[error("Settings error: {0}")]
    Settings(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a failing component hook
    pub fn component(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a setup defect rather than a runtime condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ContainerNotFound(_))
    }
}

/// Which catalog a name was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Component registry
    Component,
    /// Router view table
    View,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Component => write!(f, "Component"),
            Self::View => write!(f, "View"),
        }
    }
}

/// Lifecycle-specific errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LifecycleError {
    /// `mount` called on an already mounted instance
    #[error("component {name} ({id}) is already mounted")]
    AlreadyMounted {
        /// Component id
        id: ComponentId,
        /// Component name
        name: String,
    },

    /// Operation requires the Mounted state
    #[error("component {name} ({id}) is not mounted (state: {state:?})")]
    NotMounted {
        /// Component id
        id: ComponentId,
        /// Component name
        name: String,
        /// State the component was in
        state: LifecycleState,
    },
}

/// Event bus errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventBusError {
    /// Re-entrant publication exceeded the configured depth
    #[error("publish cycle detected on topic '{topic}' at depth {depth}")]
    CycleDetected {
        /// Topic whose publish was refused
        topic: String,
        /// Depth limit that was hit
        depth: usize,
    },

    /// Topic is empty or reserved
    #[error("invalid topic '{0}'")]
    InvalidTopic(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by bus handlers and navigation observers
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotRegistered {
            kind: EntryKind::View,
            name: "ghost".to_string(),
        };
        assert_eq!(err.to_string(), "View not registered: ghost");
    }

    #[test]
    fn test_error_conversion() {
        let bus_err = EventBusError::CycleDetected {
            topic: "loop".to_string(),
            depth: 50,
        };
        let err: Error = bus_err.into();
        assert!(matches!(err, Error::Bus(_)));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::ContainerNotFound("app".into()).is_fatal());
        assert!(!Error::Validation("empty name".into()).is_fatal());
    }
}
