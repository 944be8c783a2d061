//! Static heuristic cost layer
//!
//! Always computable with no external dependency: a closed-form events/day
//! formula over sample rate, fleet size, and a keep-ratio derived from the
//! filter configuration. Carries a fixed low confidence since it has no
//! empirical grounding.

use crate::models::{FilterMode, SAMPLE_RATE_DISABLED};

/// Fixed confidence of the static layer
pub const STATIC_CONFIDENCE: f64 = 0.4;

/// Default per-host process cardinality when not supplied
pub const DEFAULT_PROCESS_COUNT: u32 = 150;

/// Default ProcessSample event size in bytes when not supplied
pub const DEFAULT_AVG_BYTES_PER_EVENT: f64 = 450.0;

pub const BYTES_PER_GIB: f64 = 1_073_741_824.0;
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Fraction of process-sample events retained after exclusion filters
///
/// Base ratio per filter mode (0.92 for the standard set is the measured
/// fleet default), reduced by 0.01 per user-supplied exclusion pattern,
/// clamped to [0, 1].
pub fn keep_ratio(mode: FilterMode, extra_exclusion_patterns: usize) -> f64 {
    let base = match mode {
        FilterMode::None => 1.0,
        FilterMode::Standard => 0.92,
        FilterMode::Targeted => 0.85,
        FilterMode::Aggressive => 0.70,
    };
    (base - 0.01 * extra_exclusion_patterns as f64).clamp(0.0, 1.0)
}

/// Static GiB/day estimate
///
/// events/day = 86400 / rate, scaled by fleet process count, event size,
/// and keep ratio. A disabled rate contributes zero.
pub fn estimate_gib_per_day(
    sample_rate: i64,
    keep_ratio: f64,
    host_count: u32,
    process_count: u32,
    avg_bytes_per_event: f64,
) -> f64 {
    if sample_rate == SAMPLE_RATE_DISABLED || sample_rate <= 0 {
        return 0.0;
    }

    let events_per_day = SECONDS_PER_DAY / sample_rate as f64;
    events_per_day
        * host_count as f64
        * process_count as f64
        * avg_bytes_per_event
        * keep_ratio
        / BYTES_PER_GIB
}
