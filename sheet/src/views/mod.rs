//! Leaf views of the sheet application.

mod preferences;
mod roster;
mod sheet;

pub use preferences::PreferencesView;
pub use roster::RosterView;
pub use sheet::CharacterSheetView;

use std::sync::Arc;

use vellum::AppBuilder;

use crate::character::CharacterStore;

/// Character list.
pub const ROSTER: &str = "roster";
/// Single character sheet.
pub const SHEET: &str = "sheet";
/// Application preferences.
pub const PREFERENCES: &str = "preferences";

/// Readiness signal for the rules reference data the sheet view renders against.
pub const RULES: &str = "rules";

/// Bus topics published and consumed by the views.
pub mod topics {
    /// `{"trait": String, "dots": u8}`, applied to the open sheet.
    pub const ADJUST: &str = "sheet:adjust";
    /// `{"character": String, "trait": String, "dots": u8}` after an adjustment.
    pub const CHARACTER_CHANGED: &str = "character:changed";
    /// `{"character": String}` after a character file is written.
    pub const CHARACTER_SAVED: &str = "character:saved";
}

/// Register every view on `builder`.
pub fn register(builder: AppBuilder, store: Arc<CharacterStore>) -> AppBuilder {
    let roster_store = store.clone();
    builder
        .view(ROSTER, move |id, config, ctx| {
            Ok(Box::new(RosterView::new(id, config, ctx, roster_store.clone())))
        })
        .view(SHEET, move |id, config, ctx| {
            Ok(Box::new(CharacterSheetView::new(id, config, ctx, store.clone())))
        })
        .view(PREFERENCES, |id, _config, ctx| {
            Ok(Box::new(PreferencesView::new(id, ctx)))
        })
}
