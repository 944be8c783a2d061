//! Rollout command

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use tabled::Tabled;

use lab_lib::lint::{default_tier1, lint, RISK_GATE};
use lab_lib::rollout::{
    AnsibleBackend, Orchestrator, PrintBackend, RolloutBackend, RolloutJob, SshBackend,
};

use crate::commands::ConfigArgs;
use crate::output::{
    color_risk, print_error, print_info, print_success, print_table, print_warning, OutputFormat,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendKind {
    /// Echo the commands a rollout would run
    Print,
    /// Push over scp and install via ssh
    Ssh,
    /// Emit an ansible inventory and playbook
    Ansible,
}

#[derive(Args)]
pub struct RolloutArgs {
    #[command(flatten)]
    pub source: ConfigArgs,

    /// Target hostnames
    #[arg(long, required = true, value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Rollout transport
    #[arg(long, default_value = "print")]
    pub backend: BackendKind,

    /// SSH user for the ssh backend
    #[arg(long, default_value = "root")]
    pub user: String,

    /// Use sudo for remote installation
    #[arg(long)]
    pub sudo: bool,

    /// Output directory for the ansible backend
    #[arg(long, default_value = "./ansible-rollout")]
    pub output_dir: PathBuf,

    /// Maximum hosts handled concurrently
    #[arg(long, default_value_t = lab_lib::rollout::DEFAULT_PARALLELISM)]
    pub parallelism: usize,

    /// Per-host timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Proceed even when the risk score gates the rollout
    #[arg(long)]
    pub force: bool,
}

#[derive(Tabled, serde::Serialize)]
struct HostRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub async fn run(args: RolloutArgs, format: OutputFormat) -> Result<()> {
    let (config, _mode) = args.source.resolve()?;

    // Lint gate: a risky configuration needs an explicit --force
    let report = lint(&config, &default_tier1());
    if report.blocks_rollout() {
        print_warning(&format!(
            "Risk score {} is at or above the rollout gate ({RISK_GATE})",
            color_risk(report.risk_score)
        ));
        for finding in &report.findings {
            print_warning(&format!("  [{}] {}", finding.rule_id, finding.message));
        }
        if !args.force {
            print_error("Refusing to roll out; pass --force to override");
            std::process::exit(1);
        }
        print_warning("Proceeding under --force");
    }

    let backend: Arc<dyn RolloutBackend> = match args.backend {
        BackendKind::Print => Arc::new(PrintBackend::new()),
        BackendKind::Ssh => Arc::new(SshBackend::new(&args.user, args.sudo)),
        BackendKind::Ansible => Arc::new(AnsibleBackend::new(args.output_dir.clone())),
    };

    let mut job = RolloutJob::from_hostnames(config, &args.hosts);
    job.parallelism = args.parallelism;
    job.host_timeout = Duration::from_secs(args.timeout_secs);

    let outcome = Orchestrator::execute(job, backend).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Table => {
            let rows: Vec<HostRow> = outcome
                .results
                .iter()
                .map(|(host, result)| HostRow {
                    host: host.clone(),
                    result: if result.success { "ok" } else { "failed" }.to_string(),
                    duration: format!("{}ms", result.duration_ms),
                    message: result.message.clone(),
                })
                .collect();
            print_table(&rows, format);
            if outcome.all_succeeded() {
                print_success(&format!("All {} hosts applied", outcome.succeeded));
            } else {
                print_info(&format!(
                    "{} succeeded, {} failed ({:.0}% success)",
                    outcome.succeeded,
                    outcome.failed,
                    outcome.success_rate() * 100.0
                ));
            }
        }
    }

    if outcome.failed > 0 {
        bail!("{} host(s) failed", outcome.failed);
    }
    Ok(())
}
