//! Cost estimation
//!
//! Two closed estimation layers: a static heuristic that is always computed,
//! and a histogram layer available only when NRDB access is supplied and the
//! query succeeds. When the histogram layer is available with confidence c,
//! the blended figure is `c * hist + (1 - c) * static` and the reported
//! confidence is c. NRDB unavailability is an expected condition: the
//! estimator degrades to the static layer and never propagates it.

pub mod histogram;
pub mod static_model;

pub use histogram::{ByteBucket, HistogramWindow};
pub use static_model::{
    keep_ratio, DEFAULT_AVG_BYTES_PER_EVENT, DEFAULT_PROCESS_COUNT, STATIC_CONFIDENCE,
};

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{LabError, Result};
use crate::lint::keep_ratio_from_census;
use crate::models::{FilterMode, RenderedConfig};
use crate::nrdb::NrdbSource;
use crate::render;

/// Estimation method names as they appear in breakdowns
pub const METHOD_STATIC: &str = "static";
pub const METHOD_HISTOGRAM: &str = "histogram";

/// Default trailing window for the histogram layer
pub const DEFAULT_HISTOGRAM_WINDOW_HOURS: u32 = 6;

/// Trailing window for the process census behind the measured keep ratio
pub const CENSUS_WINDOW_DAYS: u32 = 1;

/// Parameters for one estimation request
#[derive(Debug, Clone)]
pub struct CostRequest {
    pub sample_rate: i64,
    pub filter_mode: FilterMode,
    /// User-supplied exclusion patterns beyond the filter mode's built-ins
    pub extra_exclusion_patterns: usize,
    /// Full pattern set, for the census-measured keep ratio
    pub exclusion_patterns: BTreeMap<String, bool>,
    pub host_count: u32,
    pub process_count: u32,
    pub avg_bytes_per_event: f64,
}

impl CostRequest {
    /// Build a request from a rendered configuration
    pub fn from_config(config: &RenderedConfig, filter_mode: FilterMode, host_count: u32) -> Self {
        Self {
            sample_rate: config.metrics_process_sample_rate,
            filter_mode,
            extra_exclusion_patterns: render::extra_pattern_count(config, filter_mode),
            exclusion_patterns: config.exclude_matching_metrics.clone(),
            host_count,
            process_count: DEFAULT_PROCESS_COUNT,
            avg_bytes_per_event: DEFAULT_AVG_BYTES_PER_EVENT,
        }
    }

    fn validate(&self) -> Result<()> {
        render::validate_sample_rate(self.sample_rate)?;
        if !self.avg_bytes_per_event.is_finite() || self.avg_bytes_per_event < 0.0 {
            return Err(LabError::invalid(
                "avg_bytes_per_event",
                format!("{} must be a non-negative finite number", self.avg_bytes_per_event),
            ));
        }
        Ok(())
    }

    fn keep_ratio(&self) -> f64 {
        keep_ratio(self.filter_mode, self.extra_exclusion_patterns)
    }
}

/// Estimate from a single method
#[derive(Debug, Clone, Serialize)]
pub struct PluginEstimate {
    pub method: &'static str,
    pub gib_per_day: f64,
    pub confidence: f64,
}

/// Blended cost estimate with per-method breakdown
#[derive(Debug, Clone, Serialize)]
pub struct CostEstimate {
    pub blended_gib_per_day: f64,
    pub confidence: f64,
    pub breakdown: Vec<PluginEstimate>,
}

/// Blends the static and histogram layers into one estimate
#[derive(Debug, Clone)]
pub struct CostEstimator {
    pub window_hours: u32,
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_HISTOGRAM_WINDOW_HOURS,
        }
    }
}

impl CostEstimator {
    pub fn new(window_hours: u32) -> Self {
        Self { window_hours }
    }

    /// Produce a blended estimate for the request
    ///
    /// Fails only on invalid parameters. NRDB errors degrade to the static
    /// layer with its fixed confidence.
    pub async fn estimate(
        &self,
        req: &CostRequest,
        nrdb: Option<&dyn NrdbSource>,
    ) -> Result<CostEstimate> {
        req.validate()?;

        // Disabled collection ingests nothing, with certainty.
        if req.sample_rate == crate::models::SAMPLE_RATE_DISABLED {
            return Ok(CostEstimate {
                blended_gib_per_day: 0.0,
                confidence: 1.0,
                breakdown: vec![PluginEstimate {
                    method: METHOD_STATIC,
                    gib_per_day: 0.0,
                    confidence: 1.0,
                }],
            });
        }

        let keep = req.keep_ratio();
        let gib_static = static_model::estimate_gib_per_day(
            req.sample_rate,
            keep,
            req.host_count,
            req.process_count,
            req.avg_bytes_per_event,
        );

        let hist = match nrdb {
            None => None,
            Some(source) => {
                // Prefer the keep ratio measured against the live census
                let keep_hist = match source.tier1_processes(CENSUS_WINDOW_DAYS).await {
                    Ok(census) => {
                        keep_ratio_from_census(&req.exclusion_patterns, &census).unwrap_or(keep)
                    }
                    Err(e) => {
                        debug!(error = %e, "Census unavailable, keeping heuristic keep ratio");
                        keep
                    }
                };
                match source.byte_histogram(self.window_hours).await {
                    Ok(window) => histogram::estimate(req.sample_rate, keep_hist, &window),
                    Err(e) => {
                        warn!(error = %e, "Histogram layer unavailable, falling back to static estimate");
                        None
                    }
                }
            }
        };

        let estimate = match hist {
            Some((gib_hist, c)) => CostEstimate {
                blended_gib_per_day: c * gib_hist + (1.0 - c) * gib_static,
                confidence: c,
                breakdown: vec![
                    PluginEstimate {
                        method: METHOD_STATIC,
                        gib_per_day: gib_static,
                        confidence: STATIC_CONFIDENCE,
                    },
                    PluginEstimate {
                        method: METHOD_HISTOGRAM,
                        gib_per_day: gib_hist,
                        confidence: c,
                    },
                ],
            },
            None => CostEstimate {
                blended_gib_per_day: gib_static,
                confidence: STATIC_CONFIDENCE,
                breakdown: vec![
                    PluginEstimate {
                        method: METHOD_STATIC,
                        gib_per_day: gib_static,
                        confidence: STATIC_CONFIDENCE,
                    },
                    // Unavailable layer reported at the fallback value, zero weight
                    PluginEstimate {
                        method: METHOD_HISTOGRAM,
                        gib_per_day: gib_static,
                        confidence: 0.0,
                    },
                ],
            },
        };

        info!(
            blended_gib_per_day = estimate.blended_gib_per_day,
            confidence = estimate.confidence,
            sample_rate = req.sample_rate,
            filter_mode = %req.filter_mode,
            "Cost estimate produced"
        );

        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NrdbError;
    use crate::lint::Tier1Process;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedHistogram(HistogramWindow);

    impl FixedHistogram {
        fn with_census(self, census: Vec<Tier1Process>) -> CensusHistogram {
            CensusHistogram {
                window: self.0,
                census,
            }
        }
    }

    #[async_trait]
    impl NrdbSource for FixedHistogram {
        async fn byte_histogram(
            &self,
            _window_hours: u32,
        ) -> std::result::Result<HistogramWindow, NrdbError> {
            Ok(self.0.clone())
        }

        async fn host_ingest(
            &self,
            _hosts: &[String],
            _window_hours: u32,
        ) -> std::result::Result<HashMap<String, f64>, NrdbError> {
            Ok(HashMap::new())
        }

        async fn tier1_processes(
            &self,
            _window_days: u32,
        ) -> std::result::Result<Vec<Tier1Process>, NrdbError> {
            Ok(Vec::new())
        }
    }

    struct CensusHistogram {
        window: HistogramWindow,
        census: Vec<Tier1Process>,
    }

    #[async_trait]
    impl NrdbSource for CensusHistogram {
        async fn byte_histogram(
            &self,
            _window_hours: u32,
        ) -> std::result::Result<HistogramWindow, NrdbError> {
            Ok(self.window.clone())
        }

        async fn host_ingest(
            &self,
            _hosts: &[String],
            _window_hours: u32,
        ) -> std::result::Result<HashMap<String, f64>, NrdbError> {
            Ok(HashMap::new())
        }

        async fn tier1_processes(
            &self,
            _window_days: u32,
        ) -> std::result::Result<Vec<Tier1Process>, NrdbError> {
            Ok(self.census.clone())
        }
    }

    struct FailingNrdb;

    #[async_trait]
    impl NrdbSource for FailingNrdb {
        async fn byte_histogram(
            &self,
            _window_hours: u32,
        ) -> std::result::Result<HistogramWindow, NrdbError> {
            Err(NrdbError::Timeout(std::time::Duration::from_secs(30)))
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
            Err(NrdbError::Timeout(std::time::Duration::from_secs(30)))
        }
    }

    fn web_standard_request() -> CostRequest {
        CostRequest {
            sample_rate: 90,
            filter_mode: FilterMode::Aggressive,
            extra_exclusion_patterns: 0,
            exclusion_patterns: BTreeMap::new(),
            host_count: 10,
            process_count: DEFAULT_PROCESS_COUNT,
            avg_bytes_per_event: DEFAULT_AVG_BYTES_PER_EVENT,
        }
    }

    #[tokio::test]
    async fn test_static_only_uses_fixed_confidence() {
        let estimator = CostEstimator::default();
        let estimate = estimator.estimate(&web_standard_request(), None).await.unwrap();

        assert_eq!(estimate.confidence, STATIC_CONFIDENCE);
        let expected = static_model::estimate_gib_per_day(
            90,
            keep_ratio(FilterMode::Aggressive, 0),
            10,
            DEFAULT_PROCESS_COUNT,
            DEFAULT_AVG_BYTES_PER_EVENT,
        );
        assert!((estimate.blended_gib_per_day - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_disabled_rate_is_zero_with_full_confidence() {
        let mut req = web_standard_request();
        req.sample_rate = -1;
        let estimate = CostEstimator::default().estimate(&req, None).await.unwrap();
        assert_eq!(estimate.blended_gib_per_day, 0.0);
        assert_eq!(estimate.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_nrdb_failure_degrades_without_error() {
        let estimator = CostEstimator::default();
        let estimate = estimator
            .estimate(&web_standard_request(), Some(&FailingNrdb))
            .await
            .unwrap();

        assert_eq!(estimate.confidence, STATIC_CONFIDENCE);
        // Both layers listed; histogram carries the fallback value at zero weight
        assert_eq!(estimate.breakdown.len(), 2);
        let hist = estimate
            .breakdown
            .iter()
            .find(|p| p.method == METHOD_HISTOGRAM)
            .unwrap();
        assert_eq!(hist.confidence, 0.0);
        assert_eq!(hist.gib_per_day, estimate.blended_gib_per_day);
    }

    #[tokio::test]
    async fn test_blend_weights_by_histogram_confidence() {
        let window = HistogramWindow {
            buckets: vec![
                ByteBucket { midpoint_bytes: 440.0, count: 100 },
                ByteBucket { midpoint_bytes: 450.0, count: 800 },
                ByteBucket { midpoint_bytes: 460.0, count: 100 },
            ],
            process_count: 1500,
            window_hours: 6,
        };
        let source = FixedHistogram(window);
        let estimate = CostEstimator::default()
            .estimate(&web_standard_request(), Some(&source))
            .await
            .unwrap();

        let static_part = estimate
            .breakdown
            .iter()
            .find(|p| p.method == METHOD_STATIC)
            .unwrap();
        let hist_part = estimate
            .breakdown
            .iter()
            .find(|p| p.method == METHOD_HISTOGRAM)
            .unwrap();
        let c = hist_part.confidence;
        assert_eq!(estimate.confidence, c);
        let expected = c * hist_part.gib_per_day + (1.0 - c) * static_part.gib_per_day;
        assert!((estimate.blended_gib_per_day - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_census_refines_histogram_keep_ratio() {
        let window = HistogramWindow {
            buckets: vec![ByteBucket { midpoint_bytes: 450.0, count: 1000 }],
            process_count: 1500,
            window_hours: 6,
        };
        let mut req = web_standard_request();
        req.exclusion_patterns.insert("process.chrome.*".to_string(), true);

        // Census says the patterns keep half the fleet's process instances
        let with_census = FixedHistogram(window.clone()).with_census(vec![
            Tier1Process::new("nginx", 50),
            Tier1Process::new("chrome", 50),
        ]);
        let without_census = FixedHistogram(window);

        let estimator = CostEstimator::default();
        let refined = estimator.estimate(&req, Some(&with_census)).await.unwrap();
        let heuristic = estimator.estimate(&req, Some(&without_census)).await.unwrap();

        let hist = |e: &CostEstimate| {
            e.breakdown
                .iter()
                .find(|p| p.method == METHOD_HISTOGRAM)
                .map(|p| p.gib_per_day)
                .unwrap()
        };
        // keep 0.5 from the census vs the aggressive-mode heuristic
        let heuristic_keep = keep_ratio(FilterMode::Aggressive, 0);
        let ratio = hist(&refined) / hist(&heuristic);
        assert!((ratio - 0.5 / heuristic_keep).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_estimate_bounds_hold() {
        let estimate = CostEstimator::default()
            .estimate(&web_standard_request(), None)
            .await
            .unwrap();
        assert!(estimate.blended_gib_per_day >= 0.0);
        assert!((0.0..=1.0).contains(&estimate.confidence));
    }

    #[tokio::test]
    async fn test_non_finite_bytes_rejected() {
        let mut req = web_standard_request();
        req.avg_bytes_per_event = f64::NAN;
        let err = CostEstimator::default().estimate(&req, None).await.unwrap_err();
        assert!(matches!(
            err,
            LabError::InvalidParameter { field: "avg_bytes_per_event", .. }
        ));
    }
}
