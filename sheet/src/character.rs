//! Character records and their on-disk store.
//!
//! Each character is saved as one pretty-printed JSON file named after the
//! character, wrapped in a versioned envelope. File names escape every byte
//! outside `[A-Za-z0-9-]` as `_XX`, so distinct names never share a file.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::SheetError;

/// Current character file version.
const CHARACTER_SAVE_VERSION: u32 = 1;

/// Lowest and highest dot rating a trait can hold.
pub const DOTS_RANGE: std::ops::RangeInclusive<u8> = 0..=5;

/// A player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub concept: String,
    /// Trait name to dot rating.
    pub traits: BTreeMap<String, u8>,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub notes: String,
}

impl Character {
    pub fn new(name: impl Into<String>, concept: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concept: concept.into(),
            traits: BTreeMap::new(),
            experience: 0,
            notes: String::new(),
        }
    }

    pub fn with_trait(mut self, name: impl Into<String>, dots: u8) -> Self {
        self.traits.insert(name.into(), dots.min(*DOTS_RANGE.end()));
        self
    }

    /// Set a trait rating, clamped to [`DOTS_RANGE`]. Returns the stored value.
    pub fn set_dots(&mut self, name: &str, dots: u8) -> u8 {
        let dots = dots.min(*DOTS_RANGE.end());
        self.traits.insert(name.to_string(), dots);
        dots
    }

    pub fn dots(&self, name: &str) -> u8 {
        self.traits.get(name).copied().unwrap_or(0)
    }

    /// Clamp every stored rating into [`DOTS_RANGE`]. Returns how many changed.
    pub fn normalize(&mut self) -> usize {
        let max = *DOTS_RANGE.end();
        let mut clamped = 0;
        for dots in self.traits.values_mut().filter(|dots| **dots > max) {
            *dots = max;
            clamped += 1;
        }
        clamped
    }
}

/// Lightweight metadata for listing characters without loading them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterMetadata {
    pub name: String,
    pub concept: String,
    pub saved_at: DateTime<Utc>,
}

/// Versioned envelope written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCharacter {
    pub version: u32,
    pub metadata: CharacterMetadata,
    pub character: Character,
}

impl SavedCharacter {
    pub fn new(character: Character) -> Self {
        Self {
            version: CHARACTER_SAVE_VERSION,
            metadata: CharacterMetadata {
                name: character.name.clone(),
                concept: character.concept.clone(),
                saved_at: Utc::now(),
            },
            character,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SheetError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file. Out-of-range ratings are clamped.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, SheetError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let mut saved: Self = serde_json::from_str(&content)?;
        check_version(saved.version)?;
        let clamped = saved.character.normalize();
        if clamped > 0 {
            tracing::warn!(path = %path.display(), clamped, "trait ratings out of range");
        }
        Ok(saved)
    }

    /// Read only the metadata of a character file.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<CharacterMetadata, SheetError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: CharacterMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        check_version(partial.version)?;
        Ok(partial.metadata)
    }
}

fn check_version(found: u32) -> Result<(), SheetError> {
    if found != CHARACTER_SAVE_VERSION {
        return Err(SheetError::VersionMismatch {
            expected: CHARACTER_SAVE_VERSION,
            found,
        });
    }
    Ok(())
}

/// Generate the file path for a character.
pub fn character_save_path(dir: impl AsRef<Path>, name: &str) -> PathBuf {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("_{byte:02X}"));
        }
    }
    dir.as_ref().join(format!("{encoded}.json"))
}

/// A directory of character files.
#[derive(Debug, Clone)]
pub struct CharacterStore {
    dir: PathBuf,
}

impl CharacterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a character, creating the directory if needed.
    pub async fn save(&self, character: &Character) -> Result<PathBuf, SheetError> {
        fs::create_dir_all(&self.dir).await?;
        let path = character_save_path(&self.dir, &character.name);
        SavedCharacter::new(character.clone()).save_json(&path).await?;
        tracing::debug!(character = %character.name, path = %path.display(), "character saved");
        Ok(path)
    }

    /// Load a character by name.
    pub async fn load(&self, name: &str) -> Result<Character, SheetError> {
        let path = character_save_path(&self.dir, name);
        if !fs::try_exists(&path).await? {
            return Err(SheetError::CharacterNotFound(name.to_string()));
        }
        Ok(SavedCharacter::load_json(path).await?.character)
    }

    /// Metadata for every readable character file, sorted by name.
    ///
    /// Unreadable or foreign-version files are skipped. A missing directory
    /// lists as empty.
    pub async fn list(&self) -> Result<Vec<CharacterMetadata>, SheetError> {
        if !fs::try_exists(&self.dir).await? {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                paths.push(path);
            }
        }

        let peeked = join_all(paths.iter().map(SavedCharacter::peek_metadata)).await;
        let mut characters = Vec::with_capacity(peeked.len());
        for (path, result) in paths.iter().zip(peeked) {
            match result {
                Ok(metadata) => characters.push(metadata),
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "skipping character file"),
            }
        }

        characters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(characters)
    }
}
