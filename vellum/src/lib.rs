//! # Vellum
//!
//! The UI runtime behind a character-sheet tool: component lifecycle,
//! a process-wide event bus, and a view router that keeps navigated-away
//! views in memory.
//!
//! ## Core Concepts
//!
//! - **Component**: a mountable unit with an owned region of the document,
//!   driven through its lifecycle by a [`ComponentHost`]
//! - **EventBus**: synchronous publish/subscribe with priorities and `"*"`
//!   wildcard subscribers
//! - **ComponentRegistry**: name → factory catalog for deferred creation
//! - **Router**: mounts exactly one view at a time, caching the others
//! - **AppContext**: the services above, passed to every factory
//!
//! ## Example
//!
//! ```rust,ignore
//! use vellum::prelude::*;
//!
//! let ctx = AppContext::new(RuntimeConfig::default());
//! ctx.bus.subscribe(
//!     "trait:changed",
//!     |event| {
//!         println!("{} -> {}", event.topic, event.payload);
//!         Ok(())
//!     },
//!     SubscribeOptions::new().with_priority(10),
//! )?;
//! ctx.bus.emit("trait:changed", serde_json::json!({"trait": "wits", "dots": 3}))?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod app;
pub mod bus;
pub mod component;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod id;
pub mod readiness;
pub mod registry;
pub mod router;
pub mod settings;

pub use app::{App, AppBuilder};
pub use bus::{Event, EventBus, SubscribeOptions};
pub use component::{Component, ComponentHost, LifecycleState};
pub use config::{NavigationPolicy, RuntimeConfig};
pub use context::AppContext;
pub use error::{Error, Result};
pub use router::Router;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::app::{App, AppBuilder};
    pub use crate::bus::{Event, EventBus, HandlerResult, PublishReport, SubscribeOptions, WILDCARD};
    pub use crate::component::{Component, ComponentHost, LifecycleState};
    pub use crate::config::{NavigationPolicy, RuntimeConfig};
    pub use crate::context::AppContext;
    pub use crate::diagnostics::{Diagnostics, Fault, FaultSource};
    pub use crate::document::{Container, Document, Node};
    pub use crate::error::*;
    pub use crate::id::*;
    pub use crate::readiness::{signals, wait_for, ReadinessBoard};
    pub use crate::registry::{ComponentFactory, ComponentRegistry};
    pub use crate::router::{Router, RouterState, ViewChange, ViewHandle};
    pub use crate::settings::{MemorySettings, SettingsStore};
    pub use crate::impl_component_any;
}
