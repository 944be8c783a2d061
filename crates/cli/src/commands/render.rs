//! Render command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::commands::ConfigArgs;
use crate::output::{print_success, OutputFormat};

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub source: ConfigArgs,

    /// Write the rendered YAML to a file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub fn run(args: RenderArgs, format: OutputFormat) -> Result<()> {
    let (config, _mode) = args.source.resolve()?;
    let yaml = config.to_yaml()?;

    if let Some(path) = &args.output {
        std::fs::write(path, &yaml).with_context(|| format!("writing {}", path.display()))?;
        print_success(&format!(
            "Wrote {} (checksum {})",
            path.display(),
            &config.checksum()?[..12]
        ));
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Table => print!("{yaml}"),
    }
    Ok(())
}
