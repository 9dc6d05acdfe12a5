//! Character sheet demo.
//!
//! Boots the runtime against a file-backed settings store, walks through
//! the roster, a character sheet, and the preferences view, and prints the
//! resulting document.
//!
//! ```bash
//! cargo run -p vellum-sheet -- --character "Mira Okonkwo" --theme night
//! ```

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;

use vellum_sheet::views::{self, topics};
use vellum_sheet::{app_builder, Character, CharacterStore, JsonFileSettings, SheetConfig};

struct Args {
    character: Option<String>,
    theme: Option<String>,
}

fn parse_args(args: &[String]) -> Args {
    let mut parsed = Args {
        character: None,
        theme: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--character" => {
                if let Some(name) = args.get(i + 1) {
                    parsed.character = Some(name.clone());
                    i += 1;
                }
            }
            "--theme" => {
                if let Some(theme) = args.get(i + 1) {
                    parsed.theme = Some(theme.clone());
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    parsed
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = SheetConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let args = parse_args(&args);

    let store = Arc::new(CharacterStore::new(&config.characters_dir));
    if store.list().await?.is_empty() {
        let sample = Character::new("Mira Okonkwo", "Disgraced archivist")
            .with_trait("Wits", 3)
            .with_trait("Occult", 4)
            .with_trait("Resolve", 2);
        store.save(&sample).await?;
        tracing::info!(dir = %store.dir().display(), "seeded sample character");
    }

    let settings = Arc::new(
        JsonFileSettings::load(&config.settings_path)
            .await
            .with_context(|| format!("loading settings from {}", config.settings_path.display()))?,
    );

    let builder = app_builder(&config, store.clone(), settings);
    let readiness = builder.readiness();
    tokio::spawn(async move {
        // Rules tables are compiled in; they are usable once the runtime is.
        readiness.announce(views::RULES);
    });

    let app = builder.start(&config.initial_view, json!({})).await?;

    let character = match args.character {
        Some(name) => name,
        None => store
            .list()
            .await?
            .first()
            .map(|m| m.name.clone())
            .context("no characters saved")?,
    };
    app.navigate_to(views::SHEET, json!({ "character": character })).await?;
    app.context()
        .bus
        .emit(topics::ADJUST, json!({ "trait": "Wits", "dots": 4 }))?;
    app.router()
        .current_view()
        .context("no view mounted")?
        .lock()
        .await
        .refresh()?;
    println!("{}", app.context().document.to_markup());

    let theme = args.theme.unwrap_or_else(|| "parchment".to_string());
    app.navigate_to(views::PREFERENCES, json!({ "theme": theme })).await?;
    app.navigate_to(views::ROSTER, json!({ "highlight": character })).await?;
    println!("{}", app.context().document.to_markup());

    let faults = app.context().diagnostics.faults();
    if !faults.is_empty() {
        eprintln!("{} contained fault(s):", faults.len());
        for fault in faults {
            eprintln!("  {:?}: {}", fault.source, fault.message);
        }
    }
    Ok(())
}

fn print_help() {
    println!("sheet - character sheet demo on the vellum runtime");
    println!();
    println!("USAGE:");
    println!("  sheet [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help              Show this help message");
    println!("  --character <NAME>      Character to open (default: first saved)");
    println!("  --theme <THEME>         Theme to store in preferences");
    println!();
    println!("ENVIRONMENT:");
    println!("  VELLUM_LOG / RUST_LOG   Log filter (default: info)");
    println!("  SHEET_SETTINGS_PATH     Settings file (default: sheet-settings.json)");
    println!("  SHEET_CHARACTERS_DIR    Character directory (default: characters)");
    println!("  SHEET_INITIAL_VIEW      First view (default: roster)");
    println!("  SHEET_NAVIGATION        queue or reject (default: queue)");
}
