//! Rollout orchestration
//!
//! Pushes a rendered configuration to a set of hosts through a pluggable
//! backend, with bounded parallelism and a per-host timeout. Host failures
//! are isolated: one bad host never aborts the batch, and every host appears
//! exactly once in the report.

pub mod backends;

pub use backends::{AnsibleBackend, PrintBackend, SshBackend};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{LabError, Result};
use crate::models::RenderedConfig;

/// Default directory the agent watches for drop-in configuration
pub const DEFAULT_TARGET_DIR: &str = "/etc/newrelic-infra/integrations.d/";

/// File name for the rendered drop-in
pub const CONFIG_FILE_NAME: &str = "process-sampling.yml";

pub const DEFAULT_PARALLELISM: usize = 10;
pub const DEFAULT_HOST_TIMEOUT: Duration = Duration::from_secs(30);

/// One rollout target
#[derive(Debug, Clone, Serialize)]
pub struct RolloutHost {
    pub hostname: String,
    pub ssh_port: u16,
    pub target_dir: String,
}

impl RolloutHost {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            ssh_port: 22,
            target_dir: DEFAULT_TARGET_DIR.to_string(),
        }
    }

    /// Full path of the drop-in file on the host
    pub fn target_path(&self) -> String {
        format!("{}{CONFIG_FILE_NAME}", self.target_dir)
    }
}

/// A configuration push to a host batch
#[derive(Debug, Clone)]
pub struct RolloutJob {
    pub config: RenderedConfig,
    pub hosts: Vec<RolloutHost>,
    pub parallelism: usize,
    pub host_timeout: Duration,
}

impl RolloutJob {
    pub fn new(config: RenderedConfig, hosts: Vec<RolloutHost>) -> Self {
        Self {
            config,
            hosts,
            parallelism: DEFAULT_PARALLELISM,
            host_timeout: DEFAULT_HOST_TIMEOUT,
        }
    }

    pub fn from_hostnames(config: RenderedConfig, hostnames: &[String]) -> Self {
        let hosts = hostnames.iter().map(|h| RolloutHost::new(h)).collect();
        Self::new(config, hosts)
    }
}

/// Outcome for a single host
#[derive(Debug, Clone, Serialize)]
pub struct HostResult {
    pub success: bool,
    pub message: String,
    pub duration_ms: u64,
}

/// Batch report, hosts in stable name order
#[derive(Debug, Clone, Default, Serialize)]
pub struct RolloutReport {
    pub results: BTreeMap<String, HostResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

impl RolloutReport {
    fn record(&mut self, hostname: String, result: HostResult) {
        if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.insert(hostname, result);
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.succeeded + self.failed;
        if total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / total as f64
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.succeeded > 0
    }
}

/// Transport that applies a configuration to one host
#[async_trait]
pub trait RolloutBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Apply the job's configuration to one host
    ///
    /// `Ok` carries a short status line, `Err` a stage-identifying failure
    /// message. Implementations must not panic on unreachable hosts.
    async fn apply(
        &self,
        host: &RolloutHost,
        job: &RolloutJob,
    ) -> std::result::Result<String, String>;
}

/// Runs a job against a backend with bounded parallelism
pub struct Orchestrator;

impl Orchestrator {
    pub async fn execute(
        job: RolloutJob,
        backend: Arc<dyn RolloutBackend>,
    ) -> Result<RolloutReport> {
        if job.hosts.is_empty() {
            return Err(LabError::invalid("hosts", "rollout requires at least one host"));
        }

        info!(
            backend = backend.name(),
            hosts = job.hosts.len(),
            parallelism = job.parallelism,
            "Starting rollout"
        );

        let batch_started = Instant::now();
        let job = Arc::new(job);
        let semaphore = Arc::new(Semaphore::new(job.parallelism.max(1)));
        let mut tasks = JoinSet::new();

        for host in job.hosts.clone() {
            let backend = Arc::clone(&backend);
            let job = Arc::clone(&job);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let started = Instant::now();
                let outcome =
                    tokio::time::timeout(job.host_timeout, backend.apply(&host, &job)).await;
                let duration_ms = started.elapsed().as_millis() as u64;

                let result = match outcome {
                    Ok(Ok(message)) => HostResult {
                        success: true,
                        message,
                        duration_ms,
                    },
                    Ok(Err(message)) => HostResult {
                        success: false,
                        message,
                        duration_ms,
                    },
                    Err(_) => HostResult {
                        success: false,
                        message: format!("timed out after {:?}", job.host_timeout),
                        duration_ms,
                    },
                };
                (host.hostname, result)
            });
        }

        let mut report = RolloutReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((hostname, result)) => {
                    if !result.success {
                        warn!(host = %hostname, message = %result.message, "Host rollout failed");
                    }
                    report.record(hostname, result);
                }
                Err(e) => {
                    // A panicked task loses its hostname; surface the batch-level fault
                    return Err(LabError::Rollout(format!("rollout task failed: {e}")));
                }
            }
        }

        report.total_duration_ms = batch_started.elapsed().as_millis() as u64;
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.total_duration_ms,
            "Rollout finished"
        );
        Ok(report)
    }
}
