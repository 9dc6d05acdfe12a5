//! The application context handed to every component factory.
//!
//! All runtime singletons live here and are reached through this value,
//! never through globals. Cloning is cheap; every field is shared.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::bus::EventBus;
use crate::component::{Component, ComponentHost};
use crate::config::RuntimeConfig;
use crate::diagnostics::Diagnostics;
use crate::document::{Container, Document};
use crate::error::{Error, Result};
use crate::readiness::ReadinessBoard;
use crate::registry::ComponentRegistry;
use crate::settings::{MemorySettings, SettingsStore};

/// Shared runtime services
#[derive(Clone)]
pub struct AppContext {
    /// Runtime configuration
    pub config: Arc<RuntimeConfig>,
    /// Event bus
    pub bus: Arc<EventBus>,
    /// Shared document
    pub document: Document,
    /// Readiness signals
    pub readiness: Arc<ReadinessBoard>,
    /// Fault sink
    pub diagnostics: Arc<Diagnostics>,
    /// Component factories
    pub registry: Arc<ComponentRegistry>,
    /// Settings collaborator
    pub settings: Arc<dyn SettingsStore>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("root_container", &self.config.root_container)
            .field("containers", &self.document.container_ids())
            .field("components", &self.registry.names())
            .field("faults", &self.diagnostics.len())
            .finish()
    }
}

impl AppContext {
    /// Build a context with an in-memory settings store and a document
    /// holding only the root container
    pub fn new(config: RuntimeConfig) -> Self {
        let diagnostics = Arc::new(Diagnostics::new(config.diagnostics_capacity));
        let readiness = Arc::new(ReadinessBoard::new(&config));
        let bus = Arc::new(EventBus::new(config.max_publish_depth, diagnostics.clone()));
        let registry = Arc::new(ComponentRegistry::new().with_readiness(readiness.clone()));
        let document = Document::new().with_container(config.root_container.clone());

        Self {
            config: Arc::new(config),
            bus,
            document,
            readiness,
            diagnostics,
            registry,
            settings: Arc::new(MemorySettings::new()),
        }
    }

    /// Replace the document
    pub fn with_document(mut self, document: Document) -> Self {
        self.document = document;
        self
    }

    /// Replace the settings store
    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = settings;
        self
    }

    /// Locate the container views mount into
    pub fn root_container(&self) -> Result<Container> {
        let id = &self.config.root_container;
        self.document
            .container(id)
            .ok_or_else(|| Error::ContainerNotFound(id.clone()))
    }

    /// Wrap a component in a host bound to this context's bus
    pub fn host(&self, component: Box<dyn Component>) -> ComponentHost {
        ComponentHost::new(component).with_bus(self.bus.clone())
    }

    /// Create an unmounted component by registered name
    pub async fn create_component(&self, name: &str, config: Value) -> Result<ComponentHost> {
        self.registry.create(self, name, config).await
    }
}
