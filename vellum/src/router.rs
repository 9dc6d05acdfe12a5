//! View router: mounts one view at a time and caches the rest.
//!
//! Navigating away unmounts the current view but keeps its instance in a
//! cache keyed by view name, so returning to it restores its in-memory
//! state instead of constructing a new one. Navigations are serialized
//! through a single-slot lock whose contention behavior is set by
//! [`NavigationPolicy`].

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::component::{Component, ComponentHost};
use crate::config::NavigationPolicy;
use crate::context::AppContext;
use crate::diagnostics::FaultSource;
use crate::error::{BoxError, EntryKind, Error, Result};
use crate::id::ComponentId;
use crate::registry::{ComponentFactory, ComponentRegistry};

/// Topics the router publishes on
pub mod topics {
    /// Published after every successful navigation with a [`super::ViewChange`]
    pub const NAVIGATED: &str = "router:navigated";
}

/// Shared handle to a cached view
pub type ViewHandle = Arc<tokio::sync::Mutex<ComponentHost>>;

/// What a navigation observer reports back
pub type ObserverResult = std::result::Result<(), BoxError>;

type Observer = Arc<dyn Fn(&ViewChange) -> ObserverResult + Send + Sync>;

/// Passed to observers after a navigation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewChange {
    /// View that was showing, if any
    pub from: Option<String>,
    /// View now showing
    pub to: String,
    /// Parameters it was given
    pub params: Value,
}

/// Navigation state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    /// Nothing mounted
    NoView,
    /// The named view is mounted
    Viewing(String),
}

struct Current {
    name: String,
    view: ViewHandle,
    params: Value,
}

#[derive(Default)]
struct RouterInner {
    current: Option<Current>,
    cache: HashMap<String, ViewHandle>,
    observers: Vec<Observer>,
}

/// Navigation state machine
pub struct Router {
    shared: Arc<Shared>,
    slot: Arc<tokio::sync::Mutex<()>>,
}

struct Shared {
    ctx: AppContext,
    views: ComponentRegistry,
    inner: Mutex<RouterInner>,
    in_flight: Mutex<Option<String>>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("state", &self.state())
            .field("views", &self.shared.views.names())
            .field("cached", &self.cached_views())
            .finish()
    }
}

/// Marks a navigation as in flight until dropped
struct InFlight(Arc<Shared>);

impl InFlight {
    fn set(shared: Arc<Shared>, name: &str) -> Self {
        *shared.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = Some(name.to_string());
        Self(shared)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        *self.0.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Router {
    /// Create a router over `ctx`
    pub fn new(ctx: AppContext) -> Self {
        Self {
            shared: Arc::new(Shared {
                ctx,
                views: ComponentRegistry::for_views(),
                inner: Mutex::new(RouterInner::default()),
                in_flight: Mutex::new(None),
            }),
            slot: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// The context views are constructed with
    pub fn context(&self) -> &AppContext {
        &self.shared.ctx
    }

    /// Register a view factory; overwrites an existing name with a warning
    pub fn register_view<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(ComponentId, Value, &AppContext) -> Result<Box<dyn Component>>
            + Send
            + Sync
            + 'static,
    {
        self.shared.views.register_component(name, factory)
    }

    /// Register a view factory object
    pub fn register_view_factory(&self, name: &str, factory: Arc<dyn ComponentFactory>) -> Result<()> {
        self.shared.views.register_factory(name, factory)
    }

    /// Check if a view name is registered
    pub fn is_registered(&self, name: &str) -> bool {
        self.shared.views.is_registered(name)
    }

    /// Registered view names, sorted
    pub fn registered_views(&self) -> Vec<String> {
        self.shared.views.names()
    }

    /// Switch the mounted view to `name`
    ///
    /// An unknown name fails before anything changes. Cleanup of the
    /// outgoing view is best effort; its faults are recorded, not returned.
    /// A missing root container is returned as a fatal error.
    ///
    /// Once the navigation slot is taken the switch runs on its own task,
    /// so dropping the returned future does not stop it halfway.
    pub async fn navigate_to(&self, name: &str, params: Value) -> Result<()> {
        let name = name.trim();
        if !self.shared.views.is_registered(name) {
            return Err(Error::NotRegistered {
                kind: EntryKind::View,
                name: name.to_string(),
            });
        }

        let slot = match self.shared.ctx.config.navigation_policy {
            NavigationPolicy::Queue => self.slot.clone().lock_owned().await,
            NavigationPolicy::Reject => match self.slot.clone().try_lock_owned() {
                Ok(guard) => guard,
                Err(_) => {
                    let active = self.shared.in_flight().unwrap_or_default();
                    tracing::warn!(requested = name, active = %active, "navigation rejected");
                    return Err(Error::NavigationInProgress {
                        requested: name.to_string(),
                        active,
                    });
                }
            },
        };
        let in_flight = InFlight::set(self.shared.clone(), name);

        let shared = self.shared.clone();
        let target = name.to_string();
        let switch = tokio::spawn(async move {
            let _slot = slot;
            let _in_flight = in_flight;
            shared.switch_to(&target, params).await
        });

        match switch.await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(view = name, error = %err, "navigation task failed");
                Err(Error::component(name, format!("navigation failed: {err}")))
            }
        }
    }

    /// Register a navigation observer
    pub fn on_view_change<F>(&self, observer: F)
    where
        F: Fn(&ViewChange) -> ObserverResult + Send + Sync + 'static,
    {
        self.shared.lock().observers.push(Arc::new(observer));
    }

    /// The mounted view
    pub fn current_view(&self) -> Option<ViewHandle> {
        self.shared.lock().current.as_ref().map(|c| c.view.clone())
    }

    /// Name of the mounted view
    pub fn current_view_name(&self) -> Option<String> {
        self.shared.lock().current.as_ref().map(|c| c.name.clone())
    }

    /// Parameters the mounted view was given
    pub fn current_params(&self) -> Option<Value> {
        self.shared.lock().current.as_ref().map(|c| c.params.clone())
    }

    /// Cached instance of a view, mounted or not
    pub fn view(&self, name: &str) -> Option<ViewHandle> {
        self.shared.lock().cache.get(name).cloned()
    }

    /// Names of cached views, sorted
    pub fn cached_views(&self) -> Vec<String> {
        let mut names: Vec<_> = self.shared.lock().cache.keys().cloned().collect();
        names.sort();
        names
    }

    /// Current navigation state
    pub fn state(&self) -> RouterState {
        match self.current_view_name() {
            Some(name) => RouterState::Viewing(name),
            None => RouterState::NoView,
        }
    }
}

impl Shared {
    async fn switch_to(&self, name: &str, params: Value) -> Result<()> {
        let outgoing = self.lock().current.take();
        let from = outgoing.as_ref().map(|c| c.name.clone());
        tracing::info!(from = ?from, to = name, "navigating");

        if let Some(current) = outgoing {
            let unmounted = current.view.lock().await.unmount().await;
            if let Err(err) = unmounted {
                self.ctx.diagnostics.record(
                    FaultSource::Cleanup {
                        view: current.name.clone(),
                    },
                    err.to_string(),
                );
            }
            self.lock().cache.insert(current.name, current.view);
        }

        let cached = self.lock().cache.get(name).cloned();
        let view = match cached {
            Some(view) => {
                tracing::debug!(view = name, "reusing cached view");
                view.lock().await.reuse(params.clone()).await?;
                view
            }
            None => {
                let host = self.views.create(&self.ctx, name, params.clone()).await?;
                let view = Arc::new(tokio::sync::Mutex::new(host));
                self.lock().cache.insert(name.to_string(), view.clone());
                view
            }
        };

        let container = self.ctx.root_container().inspect_err(|err| {
            tracing::error!(error = %err, "root container missing");
        })?;

        let mounted = view.lock().await.mount(&container).await;
        if let Err(err) = mounted {
            self.ctx.diagnostics.record(
                FaultSource::Mount {
                    view: name.to_string(),
                },
                err.to_string(),
            );
            return Err(err);
        }

        self.lock().current = Some(Current {
            name: name.to_string(),
            view,
            params: params.clone(),
        });

        let change = ViewChange {
            from,
            to: name.to_string(),
            params,
        };
        self.notify(&change);

        let payload = serde_json::to_value(&change)?;
        if let Err(err) = self.ctx.bus.emit(topics::NAVIGATED, payload) {
            tracing::warn!(error = %err, "could not publish navigation");
        }
        Ok(())
    }

    fn notify(&self, change: &ViewChange) {
        let observers = self.lock().observers.clone();
        for (index, observer) in observers.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer(change)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(_) => "observer panicked".to_string(),
            };
            self.ctx.diagnostics.record(
                FaultSource::Observer {
                    index,
                    view: change.to.clone(),
                },
                message,
            );
        }
    }

    fn in_flight(&self) -> Option<String> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock(&self) -> MutexGuard<'_, RouterInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
