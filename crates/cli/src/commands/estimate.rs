//! Cost estimation command

use anyhow::{Context, Result};
use clap::Args;
use tabled::Tabled;

use lab_lib::cost::{CostEstimator, CostRequest};
use lab_lib::nrdb::{NrdbClient, NrdbConfig, NrdbSource};

use crate::commands::ConfigArgs;
use crate::output::{color_confidence, format_gib, print_info, print_table, OutputFormat};

#[derive(Args)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub source: ConfigArgs,

    /// Number of hosts the configuration will run on
    #[arg(long, default_value_t = 1)]
    pub hosts: u32,

    /// Per-host process count (defaults to the fleet heuristic)
    #[arg(long)]
    pub process_count: Option<u32>,

    /// Query NRDB for the histogram layer (needs NEW_RELIC_API_KEY and
    /// NEW_RELIC_ACCOUNT_ID)
    #[arg(long)]
    pub nrdb: bool,

    /// Trailing histogram window in hours
    #[arg(long, default_value_t = lab_lib::cost::DEFAULT_HISTOGRAM_WINDOW_HOURS)]
    pub window_hours: u32,
}

#[derive(Tabled, serde::Serialize)]
struct BreakdownRow {
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "GiB/day")]
    gib_per_day: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

pub async fn run(args: EstimateArgs, format: OutputFormat) -> Result<()> {
    let (config, mode) = args.source.resolve()?;

    let mut request = CostRequest::from_config(&config, mode, args.hosts);
    if let Some(count) = args.process_count {
        request.process_count = count;
    }

    let client = if args.nrdb {
        let nrdb_config = NrdbConfig::load()
            .context("NRDB access requires NEW_RELIC_API_KEY and NEW_RELIC_ACCOUNT_ID")?;
        Some(NrdbClient::new(&nrdb_config)?)
    } else {
        None
    };

    let estimator = CostEstimator::new(args.window_hours);
    let estimate = estimator
        .estimate(&request, client.as_ref().map(|c| c as &dyn NrdbSource))
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&estimate)?),
        OutputFormat::Table => {
            let rows: Vec<BreakdownRow> = estimate
                .breakdown
                .iter()
                .map(|p| BreakdownRow {
                    method: p.method.to_string(),
                    gib_per_day: format_gib(p.gib_per_day),
                    confidence: color_confidence(p.confidence),
                })
                .collect();
            print_table(&rows, format);
            print_info(&format!(
                "Blended estimate: {} at {} confidence ({} hosts, rate {}s, filter {})",
                format_gib(estimate.blended_gib_per_day),
                color_confidence(estimate.confidence),
                args.hosts,
                config.metrics_process_sample_rate,
                mode
            ));
        }
    }
    Ok(())
}
