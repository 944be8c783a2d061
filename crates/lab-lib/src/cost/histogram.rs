//! Histogram cost layer
//!
//! Turns an NRDB-observed distribution of per-event byte sizes into a
//! GiB/day estimate for a requested configuration. The observed window is
//! reduced to one (intensity, bytes/day) point per process and fitted with a
//! through-origin least-squares line: zero sampling intensity ingests zero
//! bytes, so the intercept is pinned. Confidence comes from the spread of
//! the byte distribution: c = 1 - 0.5 * IQR / median, clamped to [0, 1].

use serde::{Deserialize, Serialize};

use crate::cost::static_model::{BYTES_PER_GIB, SECONDS_PER_DAY};

/// One bucket of the observed per-event byte size distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByteBucket {
    pub midpoint_bytes: f64,
    pub count: u64,
}

/// Observed ProcessSample statistics over a trailing window
///
/// `process_count` is the fleet-wide process cardinality seen in the window,
/// so extrapolated estimates already cover every reporting host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramWindow {
    pub buckets: Vec<ByteBucket>,
    pub process_count: u32,
    pub window_hours: u32,
}

impl HistogramWindow {
    pub fn total_events(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn total_bytes(&self) -> f64 {
        self.buckets
            .iter()
            .map(|b| b.midpoint_bytes * b.count as f64)
            .sum()
    }
}

/// Histogram-layer estimate for the requested parameters
///
/// Returns `(gib_per_day, confidence)` or `None` when the window is too
/// degenerate to fit (no events, no processes, non-positive median).
pub fn estimate(
    sample_rate: i64,
    keep_ratio: f64,
    window: &HistogramWindow,
) -> Option<(f64, f64)> {
    if sample_rate <= 0 || window.window_hours == 0 || window.process_count == 0 {
        return None;
    }
    let total_events = window.total_events();
    if total_events == 0 {
        return None;
    }

    let median = weighted_percentile(&window.buckets, 0.5)?;
    let q1 = weighted_percentile(&window.buckets, 0.25)?;
    let q3 = weighted_percentile(&window.buckets, 0.75)?;
    if median <= 0.0 {
        return None;
    }
    let confidence = (1.0 - 0.5 * (q3 - q1) / median).clamp(0.0, 1.0);

    // Observed per-process daily point: x = events/day, y = bytes/day
    let day_scale = 24.0 / window.window_hours as f64;
    let procs = window.process_count as f64;
    let x_obs = total_events as f64 * day_scale / procs;
    let y_obs = window.total_bytes() * day_scale / procs;
    let slope = fit_through_origin(&[(x_obs, y_obs)]);
    if !slope.is_finite() || slope <= 0.0 {
        return None;
    }

    // Extrapolate to the requested sampling intensity
    let x_req = SECONDS_PER_DAY / sample_rate as f64 * keep_ratio;
    let gib_per_day = slope * x_req * procs / BYTES_PER_GIB;

    Some((gib_per_day.max(0.0), confidence))
}

/// Through-origin least-squares slope: beta = sum(x*y) / sum(x^2)
pub fn fit_through_origin(points: &[(f64, f64)]) -> f64 {
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_x2: f64 = points.iter().map(|(x, _)| x * x).sum();
    if sum_x2 < f64::EPSILON {
        return 0.0;
    }
    sum_xy / sum_x2
}

/// Percentile of the bucketed distribution, by cumulative count
fn weighted_percentile(buckets: &[ByteBucket], p: f64) -> Option<f64> {
    let total: u64 = buckets.iter().map(|b| b.count).sum();
    if total == 0 {
        return None;
    }

    let mut sorted: Vec<&ByteBucket> = buckets.iter().filter(|b| b.count > 0).collect();
    sorted.sort_by(|a, b| {
        a.midpoint_bytes
            .partial_cmp(&b.midpoint_bytes)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let target = (p * total as f64).max(1.0);
    let mut cumulative = 0u64;
    for bucket in &sorted {
        cumulative += bucket.count;
        if cumulative as f64 >= target {
            return Some(bucket.midpoint_bytes);
        }
    }
    sorted.last().map(|b| b.midpoint_bytes)
}
