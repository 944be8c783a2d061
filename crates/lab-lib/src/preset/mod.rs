//! Preset store
//!
//! Presets are named bundles of defaults for agent configuration: sample
//! rate, filter mode, and per-key overrides. Built-in presets are compiled
//! into the binary; additional directories may be layered on top, with later
//! directories taking precedence per preset id (overlay semantics).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LabError, Result};
use crate::models::{sha256_hex, FilterMode};

/// Built-in presets shipped with the toolkit
const BUILTIN_PRESETS: &[(&str, &str)] = &[
    ("web_standard", include_str!("../../presets/web_standard.yaml")),
    ("jvm_large", include_str!("../../presets/jvm_large.yaml")),
    ("db_primary", include_str!("../../presets/db_primary.yaml")),
    ("minimal_cost", include_str!("../../presets/minimal_cost.yaml")),
];

/// Per-preset overrides merged onto global defaults at render time
///
/// Values are scalars or fully-replacing maps, last writer wins per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_command_line: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exclude_matching_metrics: BTreeMap<String, bool>,
}

/// A named configuration preset, immutable once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub description: String,
    pub sample_rate: i64,
    pub filter_mode: FilterMode,

    #[serde(default)]
    pub overrides: PresetOverrides,

    /// SHA-256 of the source YAML, filled in at load time
    #[serde(skip)]
    pub checksum: String,
}

impl Preset {
    /// Parse a preset from YAML text, recording the source checksum
    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut preset: Preset = serde_yaml::from_str(text)?;
        preset.checksum = sha256_hex(text);
        Ok(preset)
    }
}

/// One-line preset summary for listings
#[derive(Debug, Clone, Serialize)]
pub struct PresetSummary {
    pub id: String,
    pub description: String,
    pub sample_rate: i64,
    pub filter_mode: FilterMode,
}

impl From<&Preset> for PresetSummary {
    fn from(preset: &Preset) -> Self {
        Self {
            id: preset.id.clone(),
            description: preset.description.clone(),
            sample_rate: preset.sample_rate,
            filter_mode: preset.filter_mode,
        }
    }
}

/// Read-only preset lookup over built-ins plus overlay directories
pub struct PresetStore {
    dirs: Vec<PathBuf>,
}

impl Default for PresetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PresetStore {
    /// Store over built-in presets only
    pub fn new() -> Self {
        Self { dirs: Vec::new() }
    }

    /// Store with overlay directories, later directories win per preset id
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Load a preset by id
    ///
    /// Overlay directories are searched highest-precedence first, falling
    /// back to the built-in set.
    pub fn load(&self, id: &str) -> Result<Preset> {
        for dir in self.dirs.iter().rev() {
            let path = dir.join(format!("{id}.yaml"));
            if path.is_file() {
                let text = std::fs::read_to_string(&path)?;
                let preset = Preset::from_yaml(&text)?;
                debug!(id = %preset.id, path = %path.display(), checksum = %preset.checksum, "Loaded preset from overlay");
                return Ok(preset);
            }
        }

        for (builtin_id, text) in BUILTIN_PRESETS {
            if *builtin_id == id {
                let preset = Preset::from_yaml(text)?;
                debug!(id = %preset.id, checksum = %preset.checksum, "Loaded built-in preset");
                return Ok(preset);
            }
        }

        Err(LabError::NotFound {
            kind: "preset",
            id: id.to_string(),
        })
    }

    /// Summaries for every available preset, sorted by id
    pub fn list(&self) -> Vec<PresetSummary> {
        let mut ids: Vec<String> = BUILTIN_PRESETS
            .iter()
            .map(|(id, _)| id.to_string())
            .collect();

        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        ids.push(stem.to_string());
                    }
                }
            }
        }

        ids.sort();
        ids.dedup();

        ids.iter()
            .filter_map(|id| self.load(id).ok())
            .map(|preset| PresetSummary::from(&preset))
            .collect()
    }
}
