//! Configuration linter and risk scoring
//!
//! Runs the fixed rule catalog over a rendered configuration and sums the
//! weights of triggered rules into a risk score capped at 10. Scores at or
//! above [`RISK_GATE`] should block unforced rollouts; the gate is enforced
//! by callers, not here, so reports stay advisory.

pub mod coverage;
pub mod rules;

pub use coverage::{
    coverage_estimate, default_tier1, keep_ratio_from_census, CoverageEstimate, Tier1Process,
};
pub use rules::{severity_for, Rule, RULES};

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::models::RenderedConfig;

/// Risk score at or above which rollouts should be blocked without --force
pub const RISK_GATE: u32 = 7;

/// Upper bound on the summed risk score
pub const RISK_CAP: u32 = 10;

/// Finding severity, derived from the triggering rule's weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single rule violation
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub rule_id: &'static str,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Lint report: findings in rule order plus the aggregate risk score
#[derive(Debug, Clone, Default, Serialize)]
pub struct LintResult {
    pub findings: Vec<Finding>,
    pub risk_score: u32,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

impl LintResult {
    fn push(&mut self, finding: Finding, weight: u32) {
        match finding.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Info => self.info_count += 1,
        }
        self.findings.push(finding);
        self.risk_score = (self.risk_score + weight).min(RISK_CAP);
    }

    /// Whether the score gates an unforced rollout
    pub fn blocks_rollout(&self) -> bool {
        self.risk_score >= RISK_GATE
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}

/// Run every rule against the configuration
///
/// `tier1` is the process census used for coverage weighting; pass
/// [`default_tier1`] when no live census is available. Findings are emitted
/// in rule order so output is deterministic.
pub fn lint(config: &RenderedConfig, tier1: &[Tier1Process]) -> LintResult {
    let mut result = LintResult::default();

    let checks: [(&str, Option<Finding>); 5] = [
        ("R1", rules::check_tier1_coverage(config, tier1)),
        ("R2", rules::check_sample_rate_band(config)),
        ("R3", rules::check_command_line_rate(config)),
        ("R4", rules::check_redundant_patterns(config)),
        ("R5", rules::check_log_file(config)),
    ];

    for (id, finding) in checks {
        if let (Some(finding), Some(rule)) = (finding, rules::rule(id)) {
            result.push(finding, rule.weight);
        }
    }

    debug!(
        risk_score = result.risk_score,
        findings = result.findings.len(),
        "Lint completed"
    );
    result
}
