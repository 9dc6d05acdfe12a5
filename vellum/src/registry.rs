//! Name → factory catalog for deferred component creation.
//!
//! Construction and mounting are separate: [`ComponentRegistry::create`]
//! returns an unmounted [`ComponentHost`] that the caller mounts wherever
//! it likes. The router keeps its own registry of view factories with the
//! same validation and overwrite rules.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::bus::WILDCARD;
use crate::component::{Component, ComponentHost};
use crate::context::AppContext;
use crate::error::{EntryKind, Error, Result};
use crate::id::ComponentId;
use crate::readiness::{signals, ReadinessBoard};

/// Builds a component from its id, configuration, and the app context
#[async_trait]
pub trait ComponentFactory: Send + Sync {
    /// Construct an unmounted component
    async fn create(
        &self,
        id: ComponentId,
        config: Value,
        ctx: &AppContext,
    ) -> Result<Box<dyn Component>>;
}

#[async_trait]
impl<F> ComponentFactory for F
where
    F: Fn(ComponentId, Value, &AppContext) -> Result<Box<dyn Component>> + Send + Sync,
{
    async fn create(
        &self,
        id: ComponentId,
        config: Value,
        ctx: &AppContext,
    ) -> Result<Box<dyn Component>> {
        (self)(id, config, ctx)
    }
}

/// Check a registration name
pub fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("name must not be empty".to_string()));
    }
    if trimmed == WILDCARD {
        return Err(Error::Validation("'*' is reserved".to_string()));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::Validation(format!(
            "name '{trimmed}' must not contain whitespace"
        )));
    }
    Ok(trimmed)
}

/// Registry for managing component factories
pub struct ComponentRegistry {
    kind: EntryKind,
    factories: RwLock<HashMap<String, Arc<dyn ComponentFactory>>>,
    preloaded: Mutex<Vec<(String, Arc<dyn ComponentFactory>)>>,
    initialized: AtomicBool,
    readiness: Option<Arc<ReadinessBoard>>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("kind", &self.kind)
            .field("names", &self.names())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// Create an empty component registry
    pub fn new() -> Self {
        Self::with_kind(EntryKind::Component)
    }

    /// Create an empty registry of view factories
    pub fn for_views() -> Self {
        Self::with_kind(EntryKind::View)
    }

    fn with_kind(kind: EntryKind) -> Self {
        Self {
            kind,
            factories: RwLock::new(HashMap::new()),
            preloaded: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
            readiness: None,
        }
    }

    /// Announce [`signals::REGISTRY`] on this board when `init` completes
    pub fn with_readiness(mut self, readiness: Arc<ReadinessBoard>) -> Self {
        self.readiness = Some(readiness);
        self
    }

    /// Register a closure factory
    pub fn register_component<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(ComponentId, Value, &AppContext) -> Result<Box<dyn Component>>
            + Send
            + Sync
            + 'static,
    {
        self.register_factory(name, Arc::new(factory))
    }

    /// Register a factory object; an existing name is overwritten
    pub fn register_factory(&self, name: &str, factory: Arc<dyn ComponentFactory>) -> Result<()> {
        let name = validate_name(name)?;
        let previous = self
            .factories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), factory);

        if previous.is_some() {
            tracing::warn!(kind = %self.kind, name, "overwriting existing registration");
        } else {
            tracing::debug!(kind = %self.kind, name, "registered");
        }
        Ok(())
    }

    /// Queue a known definition for [`ComponentRegistry::init`]
    pub fn preload(&self, name: &str, factory: Arc<dyn ComponentFactory>) -> Result<()> {
        let name = validate_name(name)?;
        self.preloaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name.to_string(), factory));
        Ok(())
    }

    /// One-time bootstrap: registers preloaded definitions
    ///
    /// Returns `false` without doing anything when already initialized.
    pub fn init(&self) -> Result<bool> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!(kind = %self.kind, "registry already initialized");
            return Ok(false);
        }

        let preloaded = std::mem::take(&mut *self.preloaded.lock().unwrap_or_else(|e| e.into_inner()));
        let count = preloaded.len();
        for (name, factory) in preloaded {
            self.register_factory(&name, factory)?;
        }

        if let Some(readiness) = &self.readiness {
            readiness.announce(signals::REGISTRY);
        }
        tracing::info!(kind = %self.kind, preloaded = count, total = self.len(), "registry initialized");
        Ok(true)
    }

    /// Check if `init` has run
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Check if a name is registered
    pub fn is_registered(&self, name: &str) -> bool {
        self.read().contains_key(name.trim())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Construct an unmounted instance of `name`
    pub async fn create(&self, ctx: &AppContext, name: &str, config: Value) -> Result<ComponentHost> {
        let factory = self
            .read()
            .get(name.trim())
            .cloned()
            .ok_or_else(|| Error::NotRegistered {
                kind: self.kind,
                name: name.to_string(),
            })?;

        let id = ComponentId::new();
        let component = factory.create(id, config, ctx).await?;
        tracing::debug!(kind = %self.kind, name, id = %id.short(), "created");
        Ok(ctx.host(component))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn ComponentFactory>>> {
        self.factories.read().unwrap_or_else(|e| e.into_inner())
    }
}
