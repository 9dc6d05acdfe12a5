use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use vellum::prelude::*;

use super::{topics, RULES, SHEET};
use crate::character::{Character, CharacterStore, DOTS_RANGE};

/// Shows one character and applies trait adjustments from the bus.
///
/// Params: `{"character": String}`. The character is loaded on mount and
/// written back on unmount when it was changed.
pub struct CharacterSheetView {
    id: ComponentId,
    ctx: AppContext,
    store: Arc<CharacterStore>,
    selected: Option<String>,
    character: Arc<Mutex<Option<Character>>>,
    dirty: Arc<AtomicBool>,
}

impl CharacterSheetView {
    pub fn new(id: ComponentId, params: Value, ctx: &AppContext, store: Arc<CharacterStore>) -> Self {
        Self {
            id,
            ctx: ctx.clone(),
            store,
            selected: character_param(&params),
            character: Arc::new(Mutex::new(None)),
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Name of the character the next mount loads.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Copy of the loaded character, if mounted.
    pub fn character(&self) -> Option<Character> {
        self.loaded().clone()
    }

    /// Whether there are unsaved adjustments.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn loaded(&self) -> MutexGuard<'_, Option<Character>> {
        self.character.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn save_if_dirty(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(character) = self.character() else {
            return Ok(());
        };
        self.store.save(&character).await?;
        self.ctx
            .bus
            .emit(topics::CHARACTER_SAVED, json!({"character": character.name}))?;
        Ok(())
    }
}

fn character_param(params: &Value) -> Option<String> {
    params.get("character").and_then(Value::as_str).map(str::to_string)
}

fn adjust_handler(
    character: Arc<Mutex<Option<Character>>>,
    dirty: Arc<AtomicBool>,
    bus: std::sync::Weak<EventBus>,
) -> impl Fn(&Event) -> HandlerResult + Send + Sync + 'static {
    move |event| {
        let name = event
            .payload
            .get("trait")
            .and_then(Value::as_str)
            .ok_or("adjustment without a trait name")?;
        let requested = event
            .payload
            .get("dots")
            .and_then(Value::as_u64)
            .ok_or("adjustment without dots")?;
        let requested = u8::try_from(requested).unwrap_or(*DOTS_RANGE.end());

        let (owner, dots) = {
            let mut guard = character.lock().unwrap_or_else(|e| e.into_inner());
            let sheet = guard.as_mut().ok_or("no character loaded")?;
            (sheet.name.clone(), sheet.set_dots(name, requested))
        };
        dirty.store(true, Ordering::SeqCst);

        if let Some(bus) = bus.upgrade() {
            bus.emit(
                topics::CHARACTER_CHANGED,
                json!({"character": owner, "trait": name, "dots": dots}),
            )?;
        }
        Ok(())
    }
}

#[async_trait]
impl Component for CharacterSheetView {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn name(&self) -> &str {
        SHEET
    }

    async fn initialize(&mut self) -> Result<()> {
        self.ctx.readiness.wait(RULES).await?;

        let name = self
            .selected
            .clone()
            .ok_or_else(|| Error::component(SHEET, "no character selected"))?;
        let character = self.store.load(&name).await?;
        *self.loaded() = Some(character);
        self.dirty.store(false, Ordering::SeqCst);

        self.ctx.bus.subscribe(
            topics::ADJUST,
            adjust_handler(
                self.character.clone(),
                self.dirty.clone(),
                Arc::downgrade(&self.ctx.bus),
            ),
            SubscribeOptions::new().owned_by(self.id),
        )?;
        Ok(())
    }

    fn render(&self) -> Node {
        let loaded = self.loaded();
        let Some(character) = loaded.as_ref() else {
            return Node::element("section")
                .attr("data-view", SHEET)
                .child(Node::element("p").child(Node::text("No character")));
        };

        let max = *DOTS_RANGE.end() as usize;
        let traits = character.traits.iter().map(|(name, &dots)| {
            let dots = usize::from(dots).min(max);
            Node::element("li")
                .attr("data-trait", name)
                .attr("data-dots", dots)
                .child(Node::text(format!("{name} {}{}", "●".repeat(dots), "○".repeat(max - dots))))
        });

        Node::element("section")
            .attr("data-view", SHEET)
            .attr("data-character", &character.name)
            .child(Node::element("h1").child(Node::text(character.name.clone())))
            .child(Node::element("p").child(Node::text(character.concept.clone())))
            .child(Node::element("ul").children(traits))
    }

    /// Switch characters; the current one is saved first if it changed
    async fn update(&mut self, data: Value) -> Result<()> {
        let Some(next) = character_param(&data) else {
            return Ok(());
        };
        if self.selected.as_deref() == Some(next.as_str()) {
            return Ok(());
        }

        let mounted = self.loaded().is_some();
        if mounted {
            self.save_if_dirty().await?;
            let character = self.store.load(&next).await?;
            *self.loaded() = Some(character);
        }
        self.selected = Some(next);
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        let saved = self.save_if_dirty().await;
        *self.loaded() = None;
        saved
    }

    impl_component_any!();
}
