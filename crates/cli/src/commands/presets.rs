//! Preset inspection commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use tabled::Tabled;

use lab_lib::preset::PresetStore;

use crate::output::{print_table, OutputFormat};

#[derive(Subcommand)]
pub enum PresetsCommands {
    /// List available presets
    List {
        /// Additional preset directories, later entries take precedence
        #[arg(long = "preset-dir", env = "ILAB_PRESET_DIRS", value_delimiter = ':')]
        preset_dirs: Vec<PathBuf>,
    },

    /// Show one preset in full
    Show {
        /// Preset id
        id: String,

        /// Additional preset directories, later entries take precedence
        #[arg(long = "preset-dir", env = "ILAB_PRESET_DIRS", value_delimiter = ':')]
        preset_dirs: Vec<PathBuf>,
    },
}

#[derive(Tabled, serde::Serialize)]
struct PresetRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Rate (s)")]
    sample_rate: i64,
    #[tabled(rename = "Filter")]
    filter_mode: String,
}

fn store_for(dirs: Vec<PathBuf>) -> PresetStore {
    if dirs.is_empty() {
        PresetStore::new()
    } else {
        PresetStore::with_dirs(dirs)
    }
}

pub fn run(command: PresetsCommands, format: OutputFormat) -> Result<()> {
    match command {
        PresetsCommands::List { preset_dirs } => {
            let rows: Vec<PresetRow> = store_for(preset_dirs)
                .list()
                .into_iter()
                .map(|p| PresetRow {
                    id: p.id,
                    description: p.description,
                    sample_rate: p.sample_rate,
                    filter_mode: p.filter_mode.to_string(),
                })
                .collect();
            print_table(&rows, format);
        }
        PresetsCommands::Show { id, preset_dirs } => {
            let preset = store_for(preset_dirs).load(&id)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&preset)?);
                }
                OutputFormat::Table => {
                    println!("ID:          {}", preset.id);
                    println!("Description: {}", preset.description);
                    println!("Sample rate: {}s", preset.sample_rate);
                    println!("Filter mode: {}", preset.filter_mode);
                    println!("Checksum:    {}", preset.checksum);
                    if let Some(cmdline) = preset.overrides.collect_command_line {
                        println!("Command line: {}", cmdline);
                    }
                    if let Some(log_file) = &preset.overrides.log_file {
                        println!("Log file:    {}", log_file);
                    }
                    if !preset.overrides.exclude_matching_metrics.is_empty() {
                        println!("Pattern overrides:");
                        for (pattern, excluded) in &preset.overrides.exclude_matching_metrics {
                            let kind = if *excluded { "exclude" } else { "keep" };
                            println!("  {kind:7} {pattern}");
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
