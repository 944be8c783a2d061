//! CLI command implementations

pub mod estimate;
pub mod lint;
pub mod presets;
pub mod render;
pub mod rollout;
pub mod validate;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use lab_lib::preset::PresetStore;
use lab_lib::render::{render, RenderOverrides};
use lab_lib::{FilterMode, RenderedConfig};

/// Where a command gets its configuration from: a preset plus overrides, or
/// a previously rendered file
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Preset id to start from
    #[arg(long, short)]
    pub preset: Option<String>,

    /// Path to a previously rendered configuration file
    #[arg(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Additional preset directories, later entries take precedence
    #[arg(long = "preset-dir", env = "ILAB_PRESET_DIRS", value_delimiter = ':')]
    pub preset_dirs: Vec<PathBuf>,

    /// Override the sample rate in seconds (20-300, or -1 to disable)
    #[arg(long)]
    pub sample_rate: Option<i64>,

    /// Override the filter mode (none, standard, aggressive, targeted)
    #[arg(long)]
    pub filter_mode: Option<FilterMode>,

    /// Enable command-line collection
    #[arg(long)]
    pub collect_command_line: bool,

    /// Override the agent log file path
    #[arg(long)]
    pub log_file: Option<String>,

    /// Extra exclusion pattern (repeatable)
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Keep-exception pattern overriding excludes (repeatable)
    #[arg(long = "keep")]
    pub keep: Vec<String>,
}

impl ConfigArgs {
    pub fn store(&self) -> PresetStore {
        if self.preset_dirs.is_empty() {
            PresetStore::new()
        } else {
            PresetStore::with_dirs(self.preset_dirs.clone())
        }
    }

    /// Resolve to a rendered configuration and its effective filter mode
    pub fn resolve(&self) -> Result<(RenderedConfig, FilterMode)> {
        if let Some(path) = &self.config {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config = RenderedConfig::from_yaml(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            return Ok((config, self.filter_mode.unwrap_or(FilterMode::None)));
        }

        let Some(id) = &self.preset else {
            bail!("either --preset or --config is required");
        };
        let preset = self.store().load(id)?;
        let mode = self.filter_mode.unwrap_or(preset.filter_mode);

        let mut exclude_matching_metrics = BTreeMap::new();
        for pattern in &self.exclude {
            exclude_matching_metrics.insert(pattern.clone(), true);
        }
        for pattern in &self.keep {
            exclude_matching_metrics.insert(pattern.clone(), false);
        }

        let overrides = RenderOverrides {
            sample_rate: self.sample_rate,
            filter_mode: self.filter_mode,
            collect_command_line: self.collect_command_line.then_some(true),
            log_file: self.log_file.clone(),
            exclude_matching_metrics,
        };

        let config = render(&preset, &overrides)?;
        Ok((config, mode))
    }
}
