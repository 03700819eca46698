//! Named prompt-template presets

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{KeyValueStore, PRESETS_STORAGE_KEY};
use crate::error::Result;

/// The three template strings a preset carries
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PresetFields {
    #[serde(default)]
    pub master_prompts: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub negative_prompts: String,
}

impl PresetFields {
    /// Copy with surrounding whitespace removed from every field
    pub fn trimmed(&self) -> Self {
        Self {
            master_prompts: self.master_prompts.trim().to_string(),
            suffix: self.suffix.trim().to_string(),
            negative_prompts: self.negative_prompts.trim().to_string(),
        }
    }
}

/// A stored preset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Preset {
    pub name: String,
    #[serde(flatten)]
    pub fields: PresetFields,
}

#[derive(Debug, Default, Serialize)]
struct PresetCollection {
    presets: Vec<Preset>,
}

/// Collection as read back; entries are decoded one at a time
#[derive(Debug, Default, Deserialize)]
struct StoredCollection {
    #[serde(default)]
    presets: Vec<Value>,
}

/// One stored entry. Null or non-string fields read as absent.
#[derive(Debug, Deserialize)]
struct StoredPreset {
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    master_prompts: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    suffix: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    negative_prompts: Option<String>,
}

impl StoredPreset {
    /// Entries without a usable name are dropped
    fn into_preset(self) -> Option<Preset> {
        let name = self.name.filter(|name| !name.trim().is_empty())?;
        Some(Preset {
            name,
            fields: PresetFields {
                master_prompts: self.master_prompts.unwrap_or_default(),
                suffix: self.suffix.unwrap_or_default(),
                negative_prompts: self.negative_prompts.unwrap_or_default(),
            },
        })
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Ordered preset collection in the local store.
///
/// Writes are whole-collection read-modify-write.
#[derive(Clone)]
pub struct PresetStore {
    store: Arc<dyn KeyValueStore>,
}

impl PresetStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All presets in insertion order. Missing or corrupt data reads as
    /// empty; a malformed entry is skipped without losing the others.
    pub fn list(&self) -> Vec<Preset> {
        let raw = match self.store.get(PRESETS_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read presets");
                return Vec::new();
            }
        };

        let collection = match serde_json::from_str::<StoredCollection>(&raw) {
            Ok(collection) => collection,
            Err(e) => {
                warn!(error = %e, "Preset storage is corrupt, ignoring");
                return Vec::new();
            }
        };

        collection
            .presets
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let preset = serde_json::from_value::<StoredPreset>(entry)
                    .ok()
                    .and_then(StoredPreset::into_preset);
                if preset.is_none() {
                    warn!(index, "Skipping malformed preset entry");
                }
                preset
            })
            .collect()
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> Option<Preset> {
        if name.is_empty() {
            return None;
        }
        self.list().into_iter().find(|p| p.name == name)
    }

    /// Insert or overwrite a preset by name.
    ///
    /// Returns `Ok(false)` when the trimmed name is empty.
    pub fn save(&self, name: &str, fields: &PresetFields) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }

        let preset = Preset {
            name: name.to_string(),
            fields: fields.trimmed(),
        };

        let mut presets = self.list();
        match presets.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = preset,
            None => presets.push(preset),
        }

        self.write(presets)?;
        debug!(name = %name, "Preset saved");
        Ok(true)
    }

    /// Remove a preset; missing names are a no-op
    pub fn delete(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Ok(());
        }

        let mut presets = self.list();
        let before = presets.len();
        presets.retain(|p| p.name != name);
        if presets.len() != before {
            self.write(presets)?;
            debug!(name = %name, "Preset deleted");
        }
        Ok(())
    }

    fn write(&self, presets: Vec<Preset>) -> Result<()> {
        let raw = serde_json::to_string(&PresetCollection { presets })?;
        self.store.set(PRESETS_STORAGE_KEY, &raw)
    }
}
