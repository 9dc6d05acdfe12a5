//! Character sheet application on the vellum runtime.
//!
//! Wires file-backed settings and character storage into an
//! [`vellum::App`] with three views: a roster, a character sheet, and
//! preferences.

pub mod character;
pub mod config;
pub mod error;
pub mod settings;
pub mod views;

pub use character::{Character, CharacterStore};
pub use config::SheetConfig;
pub use error::SheetError;
pub use settings::JsonFileSettings;

use std::sync::Arc;

use vellum::settings::SettingsStore;
use vellum::{App, AppBuilder};

/// Builder with the sheet's settings store and views registered.
pub fn app_builder(
    config: &SheetConfig,
    store: Arc<CharacterStore>,
    settings: Arc<dyn SettingsStore>,
) -> AppBuilder {
    views::register(App::builder(config.runtime.clone()).with_settings(settings), store)
}
