use async_trait::async_trait;
use serde_json::{json, Value};

use vellum::prelude::*;

use super::PREFERENCES;

const THEME_KEY: &str = "theme";
const DEFAULT_THEME: &str = "parchment";

/// Reads and writes display preferences through the settings store.
///
/// Params: `{"theme": String}` stores a new theme.
pub struct PreferencesView {
    id: ComponentId,
    ctx: AppContext,
    theme: String,
}

impl PreferencesView {
    pub fn new(id: ComponentId, ctx: &AppContext) -> Self {
        Self {
            id,
            ctx: ctx.clone(),
            theme: DEFAULT_THEME.to_string(),
        }
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }
}

#[async_trait]
impl Component for PreferencesView {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn name(&self) -> &str {
        PREFERENCES
    }

    async fn initialize(&mut self) -> Result<()> {
        let theme = self.ctx.settings.get_or(THEME_KEY, json!(DEFAULT_THEME)).await?;
        self.theme = theme.as_str().unwrap_or(DEFAULT_THEME).to_string();
        Ok(())
    }

    fn render(&self) -> Node {
        Node::element("section")
            .attr("data-view", PREFERENCES)
            .attr("data-theme", &self.theme)
            .child(Node::element("h1").child(Node::text("Preferences")))
            .child(Node::element("p").child(Node::text(format!("Theme: {}", self.theme))))
    }

    async fn update(&mut self, data: Value) -> Result<()> {
        if let Some(theme) = data.get(THEME_KEY).and_then(Value::as_str) {
            if theme.trim().is_empty() {
                return Err(Error::Validation("theme must not be empty".to_string()));
            }
            self.ctx.settings.set_setting(THEME_KEY, json!(theme)).await?;
            self.theme = theme.to_string();
        }
        Ok(())
    }

    impl_component_any!();
}
