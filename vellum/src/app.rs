//! Application bootstrap.
//!
//! # Example
//!
//! ```ignore
//! use vellum::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> vellum::Result<()> {
//!     let app = App::builder(RuntimeConfig::default())
//!         .view("roster", roster_factory)
//!         .view("sheet", sheet_factory)
//!         .start("roster", serde_json::json!({}))
//!         .await?;
//!
//!     app.router().navigate_to("sheet", serde_json::json!({"id": "mira"})).await?;
//!     println!("{}", app.context().document.to_markup());
//!     Ok(())
//! }
//! ```

use serde_json::Value;
use std::sync::Arc;

use crate::component::Component;
use crate::config::RuntimeConfig;
use crate::context::AppContext;
use crate::document::Document;
use crate::error::Result;
use crate::id::ComponentId;
use crate::readiness::{signals, ReadinessBoard};
use crate::registry::ComponentFactory;
use crate::router::Router;
use crate::settings::SettingsStore;

/// A started application
#[derive(Debug, Clone)]
pub struct App {
    ctx: AppContext,
    router: Arc<Router>,
}

impl App {
    /// Start configuring an application
    pub fn builder(config: RuntimeConfig) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// Shared services
    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// The router
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Shorthand for `router().navigate_to`
    pub async fn navigate_to(&self, name: &str, params: Value) -> Result<()> {
        self.router.navigate_to(name, params).await
    }
}

/// Collects registrations before the singletons exist
pub struct AppBuilder {
    ctx: AppContext,
    views: Vec<(String, Arc<dyn ComponentFactory>)>,
    components: Vec<(String, Arc<dyn ComponentFactory>)>,
}

impl AppBuilder {
    /// Create a builder; the context is constructed immediately so the host
    /// can reach its readiness board before `start`
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            ctx: AppContext::new(config),
            views: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Use a host-provided document
    pub fn with_document(mut self, document: Document) -> Self {
        self.ctx = self.ctx.with_document(document);
        self
    }

    /// Use a settings store
    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.ctx = self.ctx.with_settings(settings);
        self
    }

    /// Readiness board, for announcing the document from the host
    pub fn readiness(&self) -> Arc<ReadinessBoard> {
        self.ctx.readiness.clone()
    }

    /// Register a view factory
    pub fn view<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(ComponentId, Value, &AppContext) -> Result<Box<dyn Component>>
            + Send
            + Sync
            + 'static,
    {
        let factory: Arc<dyn ComponentFactory> = Arc::new(factory);
        self.views.push((name.to_string(), factory));
        self
    }

    /// Preload a component factory into the registry
    pub fn component<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(ComponentId, Value, &AppContext) -> Result<Box<dyn Component>>
            + Send
            + Sync
            + 'static,
    {
        let factory: Arc<dyn ComponentFactory> = Arc::new(factory);
        self.components.push((name.to_string(), factory));
        self
    }

    /// Wait for the document, initialize the registry, register views, and
    /// navigate to `initial`
    ///
    /// A document that already holds the root container counts as ready.
    /// Otherwise the host must announce [`signals::DOCUMENT`] within the
    /// configured dependency deadline.
    pub async fn start(self, initial: &str, params: Value) -> Result<App> {
        let ctx = self.ctx;

        if ctx.document.container(&ctx.config.root_container).is_some() {
            ctx.readiness.announce(signals::DOCUMENT);
        }
        ctx.readiness.wait(signals::DOCUMENT).await?;
        ctx.readiness.announce(signals::SETTINGS);

        for (name, factory) in self.components {
            ctx.registry.preload(&name, factory)?;
        }
        ctx.registry.init()?;

        let router = Arc::new(Router::new(ctx.clone()));
        for (name, factory) in self.views {
            router.register_view_factory(&name, factory)?;
        }

        tracing::info!(initial, views = router.registered_views().len(), "bootstrap complete");
        router.navigate_to(initial, params).await?;
        Ok(App { ctx, router })
    }
}
