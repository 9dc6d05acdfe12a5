//! Environment configuration for the sheet binary.

use std::path::PathBuf;
use std::time::Duration;

use vellum::{NavigationPolicy, RuntimeConfig};

use crate::error::SheetError;
use crate::views;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    /// `tracing` filter directive.
    pub log_filter: String,

    /// JSON file backing the settings store.
    pub settings_path: PathBuf,

    /// Directory holding one JSON file per character.
    pub characters_dir: PathBuf,

    /// View shown after bootstrap.
    pub initial_view: String,

    /// Runtime knobs handed to `vellum`.
    pub runtime: RuntimeConfig,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            settings_path: PathBuf::from("sheet-settings.json"),
            characters_dir: PathBuf::from("characters"),
            initial_view: views::ROSTER.to_string(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl SheetConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, SheetError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// Recognized keys: `VELLUM_LOG` (falling back to `RUST_LOG`),
    /// `SHEET_SETTINGS_PATH`, `SHEET_CHARACTERS_DIR`, `SHEET_INITIAL_VIEW`,
    /// `SHEET_NAVIGATION` (`queue` or `reject`) and `SHEET_DEPENDENCY_WAIT_MS`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SheetError> {
        let mut config = Self::default();

        if let Some(filter) = lookup("VELLUM_LOG").or_else(|| lookup("RUST_LOG")) {
            config.log_filter = filter;
        }
        if let Some(path) = lookup("SHEET_SETTINGS_PATH") {
            config.settings_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("SHEET_CHARACTERS_DIR") {
            config.characters_dir = PathBuf::from(dir);
        }
        if let Some(view) = lookup("SHEET_INITIAL_VIEW") {
            config.initial_view = view;
        }
        if let Some(policy) = lookup("SHEET_NAVIGATION") {
            let policy = match policy.to_lowercase().as_str() {
                "queue" => NavigationPolicy::Queue,
                "reject" => NavigationPolicy::Reject,
                _ => return Err(invalid("SHEET_NAVIGATION", policy)),
            };
            config.runtime = config.runtime.with_navigation_policy(policy);
        }
        if let Some(ms) = lookup("SHEET_DEPENDENCY_WAIT_MS") {
            let interval = ms
                .parse::<u64>()
                .map_err(|_| invalid("SHEET_DEPENDENCY_WAIT_MS", ms.clone()))?;
            let attempts = config.runtime.dependency_max_attempts;
            config.runtime = config
                .runtime
                .with_dependency_wait(Duration::from_millis(interval), attempts);
        }

        Ok(config)
    }
}

fn invalid(key: &str, value: String) -> SheetError {
    SheetError::InvalidConfig {
        key: key.to_string(),
        value,
    }
}
