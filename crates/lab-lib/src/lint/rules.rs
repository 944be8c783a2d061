//! Risk rule catalog
//!
//! Each rule inspects one aspect of a rendered configuration and contributes
//! a fixed weight to the risk score when triggered. A rule fires at most one
//! finding per run.

use crate::lint::coverage::{self, Tier1Process};
use crate::lint::{Finding, Severity};
use crate::models::RenderedConfig;

/// Tier-1 coverage loss beyond this ratio is treated as a monitoring outage
pub const COVERAGE_DROP_LIMIT: f64 = 0.10;

/// Sample-rate band outside which alert latency or cost becomes a concern
pub const RATE_SLOW_LIMIT: i64 = 180;
pub const RATE_FAST_LIMIT: i64 = 30;

/// Command-line collection below this rate multiplies attribute volume
pub const CMDLINE_RATE_LIMIT: i64 = 60;

/// Static rule metadata
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub weight: u32,
    pub description: &'static str,
}

pub const RULES: [Rule; 5] = [
    Rule {
        id: "R1",
        weight: 4,
        description: "filters drop more than 10% of Tier-1 process coverage",
    },
    Rule {
        id: "R2",
        weight: 2,
        description: "sample rate outside the recommended [30, 180] band",
    },
    Rule {
        id: "R3",
        weight: 2,
        description: "command-line collection enabled at a fast sample rate",
    },
    Rule {
        id: "R4",
        weight: 1,
        description: "redundant exclusion patterns (one is subsumed by another)",
    },
    Rule {
        id: "R5",
        weight: 1,
        description: "no agent log file configured",
    },
];

pub fn rule(id: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.id == id)
}

/// Severity implied by a rule's weight
pub fn severity_for(weight: u32) -> Severity {
    match weight {
        w if w >= 3 => Severity::Error,
        2 => Severity::Warning,
        _ => Severity::Info,
    }
}

fn finding(id: &'static str, message: String, context: Option<String>) -> Option<Finding> {
    let rule = rule(id)?;
    Some(Finding {
        rule_id: rule.id,
        severity: severity_for(rule.weight),
        message,
        context,
    })
}

/// R1: host-weighted Tier-1 coverage drop above the limit
pub fn check_tier1_coverage(
    config: &RenderedConfig,
    tier1: &[Tier1Process],
) -> Option<Finding> {
    let estimate = coverage::coverage_estimate(&config.exclude_matching_metrics, tier1);
    if estimate.tier1_drop_ratio <= COVERAGE_DROP_LIMIT {
        return None;
    }
    finding(
        "R1",
        format!(
            "exclusion filters drop {:.1}% of Tier-1 host coverage (limit {:.0}%)",
            estimate.tier1_drop_ratio * 100.0,
            COVERAGE_DROP_LIMIT * 100.0
        ),
        Some(format!("excluded: {}", estimate.excluded.join(", "))),
    )
}

/// R2: sample rate outside the recommended band (the disable sentinel is
/// a deliberate choice, not a lint)
pub fn check_sample_rate_band(config: &RenderedConfig) -> Option<Finding> {
    let rate = config.metrics_process_sample_rate;
    if config.is_disabled() || (RATE_FAST_LIMIT..=RATE_SLOW_LIMIT).contains(&rate) {
        return None;
    }
    let concern = if rate < RATE_FAST_LIMIT {
        "ingest cost climbs sharply"
    } else {
        "alert latency degrades"
    };
    finding(
        "R2",
        format!(
            "sample rate {rate}s is outside [{RATE_FAST_LIMIT}, {RATE_SLOW_LIMIT}]; {concern}"
        ),
        None,
    )
}

/// R3: command-line collection at a fast rate inflates per-event bytes
pub fn check_command_line_rate(config: &RenderedConfig) -> Option<Finding> {
    let rate = config.metrics_process_sample_rate;
    if !config.collect_command_line || config.is_disabled() || rate >= CMDLINE_RATE_LIMIT {
        return None;
    }
    finding(
        "R3",
        format!(
            "collect_command_line with a {rate}s sample rate multiplies attribute volume; \
             raise the rate to {CMDLINE_RATE_LIMIT}s or disable command lines"
        ),
        None,
    )
}

/// R4: an active exclusion subsumed by a broader active exclusion
///
/// Pattern `a` is redundant under `b` when `b` ends in a wildcard and `a`
/// extends `b`'s literal prefix. Identical keys cannot occur in the map.
pub fn check_redundant_patterns(config: &RenderedConfig) -> Option<Finding> {
    let active: Vec<&str> = config.active_exclusions().collect();
    for narrow in &active {
        for broad in &active {
            if narrow == broad {
                continue;
            }
            let Some(prefix) = broad.strip_suffix('*') else {
                continue;
            };
            if narrow.starts_with(prefix) {
                return finding(
                    "R4",
                    format!("exclusion `{narrow}` is already covered by `{broad}`"),
                    None,
                );
            }
        }
    }
    None
}

/// R5: missing log file leaves rollout regressions undiagnosable
pub fn check_log_file(config: &RenderedConfig) -> Option<Finding> {
    match config.log_file.as_deref() {
        Some(path) if !path.trim().is_empty() => None,
        _ => finding(
            "R5",
            "no agent log file configured; set log_file before changing sampling".to_string(),
            None,
        ),
    }
}
