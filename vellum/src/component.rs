//! Component trait and the lifecycle host that drives it.
//!
//! Concrete components implement [`Component`]; the runtime never calls those
//! hooks directly but goes through [`ComponentHost`], which owns the state
//! machine:
//!
//! ```text
//! Created ─mount─▶ Initializing ─▶ Mounted ⇄ Updating
//!    ▲                  │             │
//!    └── init failed ───┘          unmount
//!                                     ▼
//!                    Destroyed ◀── Unmounted
//! ```
//!
//! A destroyed instance may be mounted again; the router does this when it
//! restores a cached view. A hook that panics is reported as a failed hook,
//! so the host's state stays consistent either way.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::bus::{panic_message, EventBus};
use crate::document::{Container, Node};
use crate::error::{Error, LifecycleError, Result};
use crate::id::ComponentId;

/// Core trait that all mountable units implement
#[async_trait]
pub trait Component: Any + Send + Sync {
    /// Get the unique ID of this component
    fn id(&self) -> ComponentId;

    /// Registered name, used in logs and errors
    fn name(&self) -> &str;

    /// Acquire dependencies; runs at the start of every mount
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Produce markup. Must not have side effects.
    fn render(&self) -> Node;

    /// Bind interactivity once the subtree is in the document
    async fn after_render(&mut self, _root: &Node) -> Result<()> {
        Ok(())
    }

    /// Receive new data
    async fn update(&mut self, _data: Value) -> Result<()> {
        Ok(())
    }

    /// Release everything acquired since `initialize`
    async fn destroy(&mut self) -> Result<()> {
        Ok(())
    }

    /// Get component as Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Mutable counterpart of [`Component::as_any`]
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implements the `as_any` pair of [`Component`]
#[macro_export]
macro_rules! impl_component_any {
    () => {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

/// Lifecycle state of a hosted component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Constructed, never mounted
    Created,
    /// `initialize` is running
    Initializing,
    /// Subtree is in the document
    Mounted,
    /// `update` is running
    Updating,
    /// `destroy` is running
    Unmounted,
    /// Torn down; may be mounted again
    Destroyed,
}

impl LifecycleState {
    /// States in which the subtree is attached
    pub fn is_attached(self) -> bool {
        matches!(self, Self::Mounted | Self::Updating)
    }
}

/// Owns a component and enforces its lifecycle
pub struct ComponentHost {
    component: Box<dyn Component>,
    state: LifecycleState,
    container: Option<Container>,
    bus: Option<Arc<EventBus>>,
    render_count: usize,
    mount_count: usize,
}

impl fmt::Debug for ComponentHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHost")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state)
            .field("container", &self.container.as_ref().map(Container::id))
            .field("render_count", &self.render_count)
            .finish()
    }
}

impl ComponentHost {
    /// Wrap a freshly constructed component
    pub fn new(component: Box<dyn Component>) -> Self {
        Self {
            component,
            state: LifecycleState::Created,
            container: None,
            bus: None,
            render_count: 0,
            mount_count: 0,
        }
    }

    /// Release the component's bus subscriptions on teardown
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Component id
    pub fn id(&self) -> ComponentId {
        self.component.id()
    }

    /// Component name
    pub fn name(&self) -> &str {
        self.component.name()
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Check if the subtree is attached
    pub fn is_mounted(&self) -> bool {
        self.state.is_attached()
    }

    /// Id of the container the component is mounted in
    pub fn container_id(&self) -> Option<&str> {
        self.container.as_ref().map(Container::id)
    }

    /// How many times `render` ran
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    /// How many mounts succeeded
    pub fn mount_count(&self) -> usize {
        self.mount_count
    }

    /// Borrow the component
    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// Borrow the component mutably
    pub fn component_mut(&mut self) -> &mut dyn Component {
        self.component.as_mut()
    }

    /// Typed access to the concrete component
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.component.as_any().downcast_ref::<T>()
    }

    /// Typed mutable access to the concrete component
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.component.as_any_mut().downcast_mut::<T>()
    }

    /// Initialize, render, attach, and bind the component
    ///
    /// Atomic: if `initialize` fails the container is untouched; if
    /// attaching or `after_render` fails the subtree is removed again.
    /// Either way the previous state is restored and the error returned.
    pub async fn mount(&mut self, container: &Container) -> Result<()> {
        let id = self.id();
        if self.state.is_attached() || self.state == LifecycleState::Initializing {
            return Err(LifecycleError::AlreadyMounted {
                id,
                name: self.name().to_string(),
            }
            .into());
        }

        let name = self.name().to_string();
        let previous = self.state;
        self.state = LifecycleState::Initializing;
        if let Err(err) = contained(&name, "initialize", self.component.initialize()).await {
            self.release_subscriptions();
            self.state = previous;
            tracing::debug!(component = %self.name(), error = %err, "initialize failed, mount aborted");
            return Err(err);
        }

        let root = self.component.render();
        self.render_count += 1;

        if let Err(err) = container.insert(id, root.clone()) {
            self.abort_mount(previous).await;
            return Err(err);
        }

        if let Err(err) = contained(&name, "after_render", self.component.after_render(&root)).await {
            container.remove(id);
            self.abort_mount(previous).await;
            return Err(err);
        }

        self.container = Some(container.clone());
        self.state = LifecycleState::Mounted;
        self.mount_count += 1;
        tracing::debug!(
            component = %self.name(),
            id = %id.short(),
            container = container.id(),
            "mounted"
        );
        Ok(())
    }

    /// Pass new data to a mounted component
    pub async fn update(&mut self, data: Value) -> Result<()> {
        if self.state != LifecycleState::Mounted {
            return Err(self.not_mounted());
        }
        let name = self.name().to_string();
        self.state = LifecycleState::Updating;
        let result = contained(&name, "update", self.component.update(data)).await;
        self.state = LifecycleState::Mounted;
        result
    }

    /// Pass data to a detached instance that is about to be mounted again
    pub async fn reuse(&mut self, data: Value) -> Result<()> {
        if self.state.is_attached() {
            return Err(LifecycleError::AlreadyMounted {
                id: self.id(),
                name: self.name().to_string(),
            }
            .into());
        }
        let name = self.name().to_string();
        contained(&name, "update", self.component.update(data)).await
    }

    /// Re-render a mounted component in place
    pub fn refresh(&mut self) -> Result<()> {
        if self.state != LifecycleState::Mounted {
            return Err(self.not_mounted());
        }
        let root = self.component.render();
        self.render_count += 1;
        match &self.container {
            Some(container) => container.insert(self.id(), root),
            None => Err(self.not_mounted()),
        }
    }

    /// Destroy, release subscriptions, and detach
    ///
    /// Cleanup always completes; a `destroy` error is returned afterwards.
    /// On an instance that is not mounted this logs a warning and succeeds.
    pub async fn unmount(&mut self) -> Result<()> {
        if self.state != LifecycleState::Mounted {
            tracing::warn!(
                component = %self.name(),
                state = ?self.state,
                "unmount on a component that is not mounted"
            );
            return Ok(());
        }

        let name = self.name().to_string();
        self.state = LifecycleState::Unmounted;
        let destroyed = contained(&name, "destroy", self.component.destroy()).await;
        self.release_subscriptions();
        if let Some(container) = self.container.take() {
            container.remove(self.id());
        }
        self.state = LifecycleState::Destroyed;
        tracing::debug!(component = %self.name(), id = %self.id().short(), "unmounted");
        destroyed
    }

    async fn abort_mount(&mut self, previous: LifecycleState) {
        let name = self.name().to_string();
        if let Err(err) = contained(&name, "destroy", self.component.destroy()).await {
            tracing::warn!(component = %self.name(), error = %err, "destroy failed while aborting mount");
        }
        self.release_subscriptions();
        self.state = previous;
    }

    fn release_subscriptions(&self) {
        if let Some(bus) = &self.bus {
            let removed = bus.unsubscribe(self.id());
            if removed > 0 {
                tracing::debug!(component = %self.name(), removed, "released leftover subscriptions");
            }
        }
    }

    fn not_mounted(&self) -> crate::error::Error {
        LifecycleError::NotMounted {
            id: self.id(),
            name: self.name().to_string(),
            state: self.state,
        }
        .into()
    }
}

/// Run a hook, turning a panic into a component error
async fn contained<T>(component: &str, hook: &str, run: impl Future<Output = Result<T>>) -> Result<T> {
    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(Error::component(
            component,
            format!("{hook} {}", panic_message(panic.as_ref())),
        )),
    }
}
