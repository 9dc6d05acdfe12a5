//! Fault sink shared by the bus, registry, and router.
//!
//! Every contained fault is recorded here as a structured [`Fault`] and
//! emitted once through `tracing`, so callers never log ad hoc.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::id::{ComponentId, SubscriptionId};

/// Where a contained fault came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultSource {
    /// An event bus handler returned an error or panicked
    Handler {
        /// Topic being published
        topic: String,
        /// Failing subscription
        subscription: SubscriptionId,
        /// Component that owns the subscription, if any
        owner: Option<ComponentId>,
    },
    /// A navigation observer failed
    Observer {
        /// Registration order of the observer
        index: usize,
        /// View that was navigated to
        view: String,
    },
    /// A view failed while being unmounted during navigation
    Cleanup {
        /// Outgoing view
        view: String,
    },
    /// A view failed to mount
    Mount {
        /// View being mounted
        view: String,
    },
}

/// One recorded fault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    /// Origin
    pub source: FaultSource,
    /// Rendered error or panic message
    pub message: String,
    /// When it was recorded
    pub at: DateTime<Utc>,
}

/// Bounded fault log
#[derive(Debug)]
pub struct Diagnostics {
    capacity: usize,
    faults: Mutex<VecDeque<Fault>>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Diagnostics {
    /// Create a sink that keeps at most `capacity` faults
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            faults: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a fault and log it
    pub fn record(&self, source: FaultSource, message: impl Into<String>) {
        let message = message.into();
        match &source {
            FaultSource::Handler { topic, subscription, owner } => tracing::warn!(
                topic = %topic,
                subscription = %subscription.short(),
                owner = ?owner,
                error = %message,
                "event handler failed"
            ),
            FaultSource::Observer { index, view } => tracing::warn!(
                observer = index,
                view = %view,
                error = %message,
                "navigation observer failed"
            ),
            FaultSource::Cleanup { view } => {
                tracing::warn!(view = %view, error = %message, "view cleanup failed")
            }
            FaultSource::Mount { view } => {
                tracing::error!(view = %view, error = %message, "view mount failed")
            }
        }

        let mut faults = self.lock();
        if faults.len() == self.capacity {
            faults.pop_front();
        }
        faults.push_back(Fault {
            source,
            message,
            at: Utc::now(),
        });
    }

    /// Snapshot of the retained faults, oldest first
    pub fn faults(&self) -> Vec<Fault> {
        self.lock().iter().cloned().collect()
    }

    /// Remove and return all retained faults
    pub fn drain(&self) -> Vec<Fault> {
        self.lock().drain(..).collect()
    }

    /// Number of retained faults
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Fault>> {
        // A poisoned log is still a valid log.
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }
}
