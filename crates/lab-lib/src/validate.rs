//! Post-rollout validation
//!
//! Compares each host's observed ingest against the estimate the rollout was
//! justified with. One NrConsumption query covers the whole batch; per-host
//! deviation is signed so over- and under-shoot read directly from reports.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{LabError, Result};
use crate::nrdb::NrdbSource;

pub const DEFAULT_THRESHOLD: f64 = 0.1;
pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// A validation request for a rolled-out host batch
#[derive(Debug, Clone)]
pub struct ValidationJob {
    pub hosts: Vec<String>,
    /// Per-host estimate the rollout promised
    pub expected_gib_per_day: f64,
    /// Allowed relative deviation, in [0, 1]
    pub threshold: f64,
    pub window_hours: u32,
}

impl ValidationJob {
    pub fn new(hosts: Vec<String>, expected_gib_per_day: f64) -> Self {
        Self {
            hosts,
            expected_gib_per_day,
            threshold: DEFAULT_THRESHOLD,
            window_hours: DEFAULT_WINDOW_HOURS,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(LabError::invalid("hosts", "validation requires at least one host"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(LabError::invalid(
                "threshold",
                format!("{} is outside [0, 1]", self.threshold),
            ));
        }
        if !self.expected_gib_per_day.is_finite() || self.expected_gib_per_day < 0.0 {
            return Err(LabError::invalid(
                "expected_gib_per_day",
                format!("{} must be a non-negative finite number", self.expected_gib_per_day),
            ));
        }
        if self.window_hours == 0 {
            return Err(LabError::invalid("window_hours", "window must be at least one hour"));
        }
        Ok(())
    }
}

/// One host's comparison against the expected ingest
#[derive(Debug, Clone, Serialize)]
pub struct HostValidation {
    pub actual_gib_per_day: f64,
    /// Signed: positive means over the estimate
    pub deviation_percent: f64,
    pub within_threshold: bool,
    pub message: String,
}

/// Batch validation outcome
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub overall_pass: bool,
    pub pass_rate: f64,
    pub summary: String,
    pub completed_at: DateTime<Utc>,
    pub query_duration_ms: u64,
    pub host_results: BTreeMap<String, HostValidation>,
}

pub struct Validator;

impl Validator {
    /// Validate observed ingest for every host in the job
    ///
    /// NRDB failure does not abort: every host is recorded as failed so the
    /// caller still gets a complete report.
    pub async fn validate(job: &ValidationJob, nrdb: &dyn NrdbSource) -> Result<ValidationResult> {
        job.validate()?;

        let started = Instant::now();
        let ingest = nrdb.host_ingest(&job.hosts, job.window_hours).await;
        let query_duration_ms = started.elapsed().as_millis() as u64;

        let mut host_results = BTreeMap::new();
        match ingest {
            Ok(observed) => {
                // Scale the observed window to a daily figure
                let day_scale = 24.0 / job.window_hours as f64;
                for host in &job.hosts {
                    let actual = observed.get(host).copied().unwrap_or(0.0) * day_scale;
                    host_results.insert(host.clone(), compare(actual, job));
                }
            }
            Err(e) => {
                warn!(error = %e, "Validation query failed, marking all hosts failed");
                for host in &job.hosts {
                    host_results.insert(
                        host.clone(),
                        HostValidation {
                            actual_gib_per_day: 0.0,
                            deviation_percent: 100.0,
                            within_threshold: false,
                            message: format!("ingest data unavailable: {e}"),
                        },
                    );
                }
            }
        }

        let passed = host_results.values().filter(|r| r.within_threshold).count();
        let pass_rate = passed as f64 / host_results.len() as f64;
        let overall_pass = pass_rate == 1.0;
        let summary = format!(
            "{passed}/{} hosts within {:.0}% of {:.2} GiB/day",
            host_results.len(),
            job.threshold * 100.0,
            job.expected_gib_per_day
        );

        info!(%summary, overall_pass, query_duration_ms, "Validation finished");

        Ok(ValidationResult {
            overall_pass,
            pass_rate,
            summary,
            completed_at: Utc::now(),
            query_duration_ms,
            host_results,
        })
    }
}

fn compare(actual: f64, job: &ValidationJob) -> HostValidation {
    let expected = job.expected_gib_per_day;

    // A zero estimate allows exactly zero ingest
    if expected == 0.0 {
        let pass = actual == 0.0;
        return HostValidation {
            actual_gib_per_day: actual,
            deviation_percent: if pass { 0.0 } else { 100.0 },
            within_threshold: pass,
            message: if pass {
                "no ingest, as expected".to_string()
            } else {
                format!("expected no ingest but observed {actual:.3} GiB/day")
            },
        };
    }

    let deviation_percent = (actual - expected) / expected * 100.0;
    let within_threshold = deviation_percent.abs() <= job.threshold * 100.0;
    let message = if within_threshold {
        format!("{actual:.3} GiB/day, {deviation_percent:+.1}% of estimate")
    } else {
        format!(
            "{actual:.3} GiB/day deviates {deviation_percent:+.1}% from {expected:.3} GiB/day"
        )
    };

    HostValidation {
        actual_gib_per_day: actual,
        deviation_percent,
        within_threshold,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::HistogramWindow;
    use crate::error::NrdbError;
    use crate::lint::Tier1Process;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedIngest(HashMap<String, f64>);

    #[async_trait]
    impl NrdbSource for FixedIngest {
        async fn byte_histogram(
            &self,
            _window_hours: u32,
        ) -> std::result::Result<HistogramWindow, NrdbError> {
            Err(NrdbError::RateLimit)
        }

        async fn host_ingest(
            &self,
            _hosts: &[String],
            _window_hours: u32,
        ) -> std::result::Result<HashMap<String, f64>, NrdbError> {
            Ok(self.0.clone())
        }

        async fn tier1_processes(
            &self,
            _window_days: u32,
        ) -> std::result::Result<Vec<Tier1Process>, NrdbError> {
            Ok(Vec::new())
        }
    }

    struct UnavailableNrdb;

    #[async_trait]
    impl NrdbSource for UnavailableNrdb {
        async fn byte_histogram(
            &self,
            _window_hours: u32,
        ) -> std::result::Result<HistogramWindow, NrdbError> {
            Err(NrdbError::RateLimit)
        }

        async fn host_ingest(
            &self,
            _hosts: &[String],
            _window_hours: u32,
        ) -> std::result::Result<HashMap<String, f64>, NrdbError> {
            Err(NrdbError::Timeout(std::time::Duration::from_secs(30)))
        }

        async fn tier1_processes(
            &self,
            _window_days: u32,
        ) -> std::result::Result<Vec<Tier1Process>, NrdbError> {
            Ok(Vec::new())
        }
    }

    fn ingest(pairs: &[(&str, f64)]) -> FixedIngest {
        FixedIngest(pairs.iter().map(|(h, v)| (h.to_string(), *v)).collect())
    }

    #[tokio::test]
    async fn test_overshoot_beyond_threshold_fails() {
        let job = ValidationJob {
            hosts: vec!["web-01".to_string()],
            expected_gib_per_day: 10.0,
            threshold: 0.2,
            window_hours: 24,
        };
        let result = Validator::validate(&job, &ingest(&[("web-01", 12.5)])).await.unwrap();

        let host = &result.host_results["web-01"];
        assert!((host.deviation_percent - 25.0).abs() < 1e-9);
        assert!(!host.within_threshold);
        assert!(!result.overall_pass);
    }

    #[tokio::test]
    async fn test_within_threshold_passes() {
        let job = ValidationJob {
            hosts: vec!["web-01".to_string(), "web-02".to_string()],
            expected_gib_per_day: 10.0,
            threshold: 0.3,
            window_hours: 24,
        };
        let result = Validator::validate(&job, &ingest(&[("web-01", 12.5), ("web-02", 9.0)]))
            .await
            .unwrap();
        assert!(result.overall_pass);
        assert_eq!(result.pass_rate, 1.0);
    }

    #[tokio::test]
    async fn test_missing_host_counts_as_zero_ingest() {
        let job = ValidationJob::new(vec!["web-01".to_string()], 10.0);
        let result = Validator::validate(&job, &ingest(&[])).await.unwrap();
        let host = &result.host_results["web-01"];
        assert_eq!(host.actual_gib_per_day, 0.0);
        assert!((host.deviation_percent + 100.0).abs() < 1e-9);
        assert!(!host.within_threshold);
    }

    #[tokio::test]
    async fn test_window_scaled_to_daily_rate() {
        let job = ValidationJob {
            hosts: vec!["web-01".to_string()],
            expected_gib_per_day: 10.0,
            threshold: 0.1,
            window_hours: 6,
        };
        // 2.5 GiB in 6 hours is exactly 10 GiB/day
        let result = Validator::validate(&job, &ingest(&[("web-01", 2.5)])).await.unwrap();
        assert!(result.overall_pass);
    }

    #[tokio::test]
    async fn test_zero_expected_requires_zero_actual() {
        let job = ValidationJob::new(vec!["a".to_string(), "b".to_string()], 0.0);
        let result = Validator::validate(&job, &ingest(&[("b", 0.4)])).await.unwrap();
        assert!(result.host_results["a"].within_threshold);
        assert!(!result.host_results["b"].within_threshold);
    }

    #[tokio::test]
    async fn test_nrdb_failure_marks_every_host_failed() {
        let job = ValidationJob::new(vec!["a".to_string(), "b".to_string()], 5.0);
        let result = Validator::validate(&job, &UnavailableNrdb).await.unwrap();
        assert!(!result.overall_pass);
        assert_eq!(result.pass_rate, 0.0);
        assert_eq!(result.host_results.len(), 2);
        assert!(result.host_results["a"].message.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_invalid_jobs_rejected() {
        let empty = ValidationJob::new(vec![], 5.0);
        assert!(Validator::validate(&empty, &ingest(&[])).await.is_err());

        let mut bad_threshold = ValidationJob::new(vec!["a".to_string()], 5.0);
        bad_threshold.threshold = 1.5;
        assert!(Validator::validate(&bad_threshold, &ingest(&[])).await.is_err());

        let negative = ValidationJob::new(vec!["a".to_string()], -1.0);
        assert!(Validator::validate(&negative, &ingest(&[])).await.is_err());
    }
}
