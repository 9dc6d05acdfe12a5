//! Process-wide publish/subscribe event bus.
//!
//! Delivery is synchronous: [`EventBus::publish`] returns once every matching
//! handler body has run. Topic subscriptions and wildcard (`"*"`)
//! subscriptions are merged into one dispatch order per publish:
//! priority descending, then insertion order ascending.
//!
//! Handlers run with no bus lock held, so they may publish, subscribe, or
//! unsubscribe re-entrantly. Re-entrant publication is bounded by
//! `RuntimeConfig::max_publish_depth`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::diagnostics::{Diagnostics, FaultSource};
use crate::error::{BoxError, EventBusError};
use crate::id::{ComponentId, SubscriptionId};

/// Topic that observes every publish
pub const WILDCARD: &str = "*";

/// What a handler reports back
pub type HandlerResult = Result<(), BoxError>;

type Handler = Arc<dyn Fn(&Event) -> HandlerResult + Send + Sync>;

/// An event as seen by handlers
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Topic it was published under
    pub topic: String,
    /// Arbitrary JSON payload
    pub payload: Value,
    /// Publishing component, if any
    pub source: Option<ComponentId>,
    /// Publish time
    pub timestamp: DateTime<Utc>,
}

/// Options for [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    /// Higher runs first
    pub priority: i32,
    /// Remove after the first delivery
    pub once: bool,
    /// Component responsible for releasing the subscription
    pub owner: Option<ComponentId>,
}

impl SubscribeOptions {
    /// Default options: priority 0, persistent, unowned
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Deliver at most once
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Attach to an owning component
    pub fn owned_by(mut self, owner: ComponentId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Target of [`EventBus::unsubscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsubscribe {
    /// One subscription
    Handle(SubscriptionId),
    /// Every subscription owned by a component
    Owner(ComponentId),
}

impl From<SubscriptionId> for Unsubscribe {
    fn from(id: SubscriptionId) -> Self {
        Unsubscribe::Handle(id)
    }
}

impl From<ComponentId> for Unsubscribe {
    fn from(id: ComponentId) -> Self {
        Unsubscribe::Owner(id)
    }
}

/// A handler failure contained by `publish`
#[derive(Debug, Clone, thiserror::Error)]
#[error("handler {subscription:?} on '{topic}' failed: {message}")]
pub struct HandlerFault {
    /// Topic being published
    pub topic: String,
    /// Failing subscription
    pub subscription: SubscriptionId,
    /// Its owner, if any
    pub owner: Option<ComponentId>,
    /// Error or panic message
    pub message: String,
}

/// Outcome of one `publish` call
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    /// Handlers that completed without error
    pub delivered: usize,
    /// Handlers that failed
    pub faults: Vec<HandlerFault>,
}

impl PublishReport {
    /// Check if every handler succeeded
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    handler: Handler,
    priority: i32,
    once: bool,
    owner: Option<ComponentId>,
    seq: u64,
}

#[derive(Default)]
struct BusState {
    topics: HashMap<String, Vec<Subscription>>,
    wildcard: Vec<Subscription>,
    next_seq: u64,
}

impl BusState {
    fn lists_mut(&mut self) -> impl Iterator<Item = &mut Vec<Subscription>> {
        self.topics.values_mut().chain(std::iter::once(&mut self.wildcard))
    }
}

/// The event bus
pub struct EventBus {
    state: Mutex<BusState>,
    depth: AtomicUsize,
    max_depth: usize,
    diagnostics: Arc<Diagnostics>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("EventBus")
            .field("topics", &state.topics.keys().collect::<Vec<_>>())
            .field("wildcard_count", &state.wildcard.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(50, Arc::new(Diagnostics::default()))
    }
}

struct DepthGuard<'a>(&'a AtomicUsize);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EventBus {
    /// Create a bus with a re-entrancy bound and a fault sink
    pub fn new(max_depth: usize, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            state: Mutex::new(BusState::default()),
            depth: AtomicUsize::new(0),
            max_depth,
            diagnostics,
        }
    }

    /// Register `handler` for `topic` (`"*"` for every topic)
    pub fn subscribe<F>(
        &self,
        topic: &str,
        handler: F,
        options: SubscribeOptions,
    ) -> Result<SubscriptionId, EventBusError>
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        if topic.trim().is_empty() {
            return Err(EventBusError::InvalidTopic(topic.to_string()));
        }

        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        let subscription = Subscription {
            id: SubscriptionId::new(),
            handler: Arc::new(handler),
            priority: options.priority,
            once: options.once,
            owner: options.owner,
            seq,
        };
        let id = subscription.id;

        let list = if topic == WILDCARD {
            &mut state.wildcard
        } else {
            state.topics.entry(topic.to_string()).or_default()
        };
        // Later inserts land after every equal-priority entry.
        let at = list.partition_point(|s| s.priority >= options.priority);
        list.insert(at, subscription);

        tracing::trace!(
            topic,
            subscription = %id.short(),
            priority = options.priority,
            once = options.once,
            "subscribed"
        );
        Ok(id)
    }

    /// Remove one subscription or all of an owner's; returns how many went
    pub fn unsubscribe(&self, target: impl Into<Unsubscribe>) -> usize {
        let target = target.into();
        let mut state = self.lock();
        let mut removed = 0;
        for list in state.lists_mut() {
            let before = list.len();
            list.retain(|s| match target {
                Unsubscribe::Handle(id) => s.id != id,
                Unsubscribe::Owner(owner) => s.owner != Some(owner),
            });
            removed += before - list.len();
        }
        state.topics.retain(|_, list| !list.is_empty());

        tracing::trace!(unsubscribe = ?target, removed, "unsubscribed");
        removed
    }

    /// Publish without a source component
    pub fn emit(&self, topic: &str, payload: Value) -> Result<PublishReport, EventBusError> {
        self.publish(topic, payload, None)
    }

    /// Deliver an event to every matching handler, in dispatch order
    ///
    /// Handler errors and panics are contained, recorded in diagnostics,
    /// and returned in the report. The only error returned to the caller is
    /// an invalid topic or a publish cycle deeper than the configured bound.
    pub fn publish(
        &self,
        topic: &str,
        payload: Value,
        source: Option<ComponentId>,
    ) -> Result<PublishReport, EventBusError> {
        if topic.trim().is_empty() || topic == WILDCARD {
            return Err(EventBusError::InvalidTopic(topic.to_string()));
        }

        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = DepthGuard(&self.depth);
        if depth > self.max_depth {
            tracing::error!(topic, depth, "publish cycle detected");
            return Err(EventBusError::CycleDetected {
                topic: topic.to_string(),
                depth,
            });
        }

        let targets = self.dispatch_list(topic);
        let event = Event {
            topic: topic.to_string(),
            payload,
            source,
            timestamp: Utc::now(),
        };

        let mut report = PublishReport::default();
        for subscription in targets {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscription.handler)(&event)));
            let message = match outcome {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(err)) => err.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            self.diagnostics.record(
                FaultSource::Handler {
                    topic: topic.to_string(),
                    subscription: subscription.id,
                    owner: subscription.owner,
                },
                message.clone(),
            );
            report.faults.push(HandlerFault {
                topic: topic.to_string(),
                subscription: subscription.id,
                owner: subscription.owner,
                message,
            });
        }

        tracing::debug!(
            topic,
            depth,
            delivered = report.delivered,
            faults = report.faults.len(),
            "published"
        );
        Ok(report)
    }

    /// Number of subscriptions that would see a publish on `topic`,
    /// excluding wildcards (pass `"*"` to count wildcards)
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let state = self.lock();
        if topic == WILDCARD {
            state.wildcard.len()
        } else {
            state.topics.get(topic).map_or(0, Vec::len)
        }
    }

    /// Topics with at least one subscription
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<_> = self.lock().topics.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Drop every subscription on a topic
    pub fn clear_topic(&self, topic: &str) -> usize {
        let mut state = self.lock();
        if topic == WILDCARD {
            return std::mem::take(&mut state.wildcard).len();
        }
        state.topics.remove(topic).map_or(0, |list| list.len())
    }

    /// Snapshot handlers for one publish, removing one-shot entries first
    fn dispatch_list(&self, topic: &str) -> Vec<Subscription> {
        let mut state = self.lock();
        let mut targets: Vec<Subscription> = state
            .topics
            .get(topic)
            .into_iter()
            .flatten()
            .chain(state.wildcard.iter())
            .cloned()
            .collect();
        targets.sort_by_key(|s| (Reverse(s.priority), s.seq));

        if targets.iter().any(|s| s.once) {
            if let Some(list) = state.topics.get_mut(topic) {
                list.retain(|s| !s.once);
                if list.is_empty() {
                    state.topics.remove(topic);
                }
            }
            state.wildcard.retain(|s| !s.once);
        }
        targets
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
