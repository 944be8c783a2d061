//! Validation command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::Tabled;

use lab_lib::nrdb::{NrdbClient, NrdbConfig};
use lab_lib::validate::{ValidationJob, Validator};

use crate::output::{print_error, print_success, print_table, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// Hostnames to validate
    #[arg(long, required = true, value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Expected per-host ingest in GiB/day
    #[arg(long)]
    pub expected: f64,

    /// Allowed relative deviation (0.1 = 10%)
    #[arg(long, default_value_t = lab_lib::validate::DEFAULT_THRESHOLD)]
    pub threshold: f64,

    /// Trailing observation window in hours
    #[arg(long, default_value_t = lab_lib::validate::DEFAULT_WINDOW_HOURS)]
    pub window_hours: u32,
}

#[derive(Tabled, serde::Serialize)]
struct ValidationRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Actual GiB/day")]
    actual: String,
    #[tabled(rename = "Deviation")]
    deviation: String,
    #[tabled(rename = "Result")]
    result: String,
}

pub async fn run(args: ValidateArgs, format: OutputFormat) -> Result<()> {
    let nrdb_config = NrdbConfig::load()
        .context("validation requires NEW_RELIC_API_KEY and NEW_RELIC_ACCOUNT_ID")?;
    let client = NrdbClient::new(&nrdb_config)?;

    let mut job = ValidationJob::new(args.hosts.clone(), args.expected);
    job.threshold = args.threshold;
    job.window_hours = args.window_hours;

    let result = Validator::validate(&job, &client).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => {
            let rows: Vec<ValidationRow> = result
                .host_results
                .iter()
                .map(|(host, v)| ValidationRow {
                    host: host.clone(),
                    actual: format!("{:.3}", v.actual_gib_per_day),
                    deviation: format!("{:+.1}%", v.deviation_percent),
                    result: if v.within_threshold {
                        "pass".green().to_string()
                    } else {
                        "fail".red().to_string()
                    },
                })
                .collect();
            print_table(&rows, format);
            let stamp = result.completed_at.format("%Y-%m-%d %H:%M UTC");
            if result.overall_pass {
                print_success(&format!("{} (checked {stamp})", result.summary));
            } else {
                print_error(&format!("{} (checked {stamp})", result.summary));
            }
        }
    }

    if !result.overall_pass {
        std::process::exit(1);
    }
    Ok(())
}
