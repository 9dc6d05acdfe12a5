use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vellum::prelude::*;

use super::{topics, ROSTER};
use crate::character::{CharacterMetadata, CharacterStore};

/// Lists saved characters.
///
/// Params: `{"highlight": String}` marks one entry.
pub struct RosterView {
    id: ComponentId,
    ctx: AppContext,
    store: Arc<CharacterStore>,
    entries: Vec<CharacterMetadata>,
    highlight: Option<String>,
    stale: Arc<AtomicBool>,
}

impl RosterView {
    pub fn new(id: ComponentId, params: Value, ctx: &AppContext, store: Arc<CharacterStore>) -> Self {
        Self {
            id,
            ctx: ctx.clone(),
            store,
            entries: Vec::new(),
            highlight: highlight_param(&params),
            stale: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn entries(&self) -> &[CharacterMetadata] {
        &self.entries
    }

    pub fn highlight(&self) -> Option<&str> {
        self.highlight.as_deref()
    }

    /// Whether a save was seen since the last reload.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    async fn reload(&mut self) -> Result<()> {
        self.entries = self.store.list().await?;
        self.stale.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn highlight_param(params: &Value) -> Option<String> {
    params.get("highlight").and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl Component for RosterView {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn name(&self) -> &str {
        ROSTER
    }

    async fn initialize(&mut self) -> Result<()> {
        self.reload().await?;

        let stale = self.stale.clone();
        self.ctx.bus.subscribe(
            topics::CHARACTER_SAVED,
            move |_| {
                stale.store(true, Ordering::SeqCst);
                Ok(())
            },
            SubscribeOptions::new().owned_by(self.id),
        )?;
        Ok(())
    }

    fn render(&self) -> Node {
        let body = if self.entries.is_empty() {
            Node::element("p").child(Node::text("No characters yet"))
        } else {
            Node::element("ul").children(self.entries.iter().map(|entry| {
                let mut item = Node::element("li")
                    .attr("data-character", &entry.name)
                    .child(Node::text(format!("{} ({})", entry.name, entry.concept)));
                if self.highlight.as_deref() == Some(entry.name.as_str()) {
                    item = item.attr("class", "highlight");
                }
                item
            }))
        };

        Node::element("section")
            .attr("data-view", ROSTER)
            .child(Node::element("h1").child(Node::text("Characters")))
            .child(body)
    }

    async fn update(&mut self, data: Value) -> Result<()> {
        self.highlight = highlight_param(&data);
        if self.is_stale() {
            self.reload().await?;
        }
        Ok(())
    }

    impl_component_any!();
}
