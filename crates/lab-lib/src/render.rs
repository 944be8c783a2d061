//! Template renderer
//!
//! Produces a [`RenderedConfig`] from a preset plus explicit overrides.
//! Precedence: explicit overrides > preset defaults > global defaults
//! (sample rate 60s, no filtering, command-line collection off). Rendering
//! is pure and deterministic: identical inputs yield byte-identical YAML.

use std::collections::BTreeMap;

use crate::error::{LabError, Result};
use crate::models::{
    FilterMode, RenderedConfig, SAMPLE_RATE_DISABLED, SAMPLE_RATE_MAX, SAMPLE_RATE_MIN,
};
use crate::preset::Preset;

/// Global default sample rate applied when neither preset nor overrides set one
pub const DEFAULT_SAMPLE_RATE: i64 = 60;

/// Explicit per-render overrides, highest precedence
#[derive(Debug, Clone, Default)]
pub struct RenderOverrides {
    pub sample_rate: Option<i64>,
    pub filter_mode: Option<FilterMode>,
    pub collect_command_line: Option<bool>,
    pub log_file: Option<String>,
    /// Extra exclusion entries merged last (replace per key)
    pub exclude_matching_metrics: BTreeMap<String, bool>,
}

/// Render a configuration from a preset and overrides
pub fn render(preset: &Preset, overrides: &RenderOverrides) -> Result<RenderedConfig> {
    let sample_rate = overrides.sample_rate.unwrap_or(preset.sample_rate);
    validate_sample_rate(sample_rate)?;

    let filter_mode = overrides.filter_mode.unwrap_or(preset.filter_mode);

    let mut exclude = builtin_patterns(filter_mode);
    for (pattern, excluded) in &preset.overrides.exclude_matching_metrics {
        exclude.insert(pattern.clone(), *excluded);
    }
    for (pattern, excluded) in &overrides.exclude_matching_metrics {
        exclude.insert(pattern.clone(), *excluded);
    }

    let collect_command_line = overrides
        .collect_command_line
        .or(preset.overrides.collect_command_line)
        .unwrap_or(false);

    let log_file = overrides
        .log_file
        .clone()
        .or_else(|| preset.overrides.log_file.clone());

    Ok(RenderedConfig {
        metrics_process_sample_rate: sample_rate,
        collect_command_line,
        exclude_matching_metrics: exclude,
        log_file,
    })
}

/// Reject sample rates outside [20, 300] that are not the -1 disable sentinel
pub fn validate_sample_rate(rate: i64) -> Result<()> {
    if rate == SAMPLE_RATE_DISABLED || (SAMPLE_RATE_MIN..=SAMPLE_RATE_MAX).contains(&rate) {
        Ok(())
    } else {
        Err(LabError::invalid(
            "sample_rate",
            format!(
                "{rate} is outside [{SAMPLE_RATE_MIN}, {SAMPLE_RATE_MAX}] and is not the {SAMPLE_RATE_DISABLED} disable sentinel"
            ),
        ))
    }
}

/// Built-in exclusion pattern set for a filter mode
///
/// `true` excludes matching metrics, `false` is a keep exception. The
/// aggressive set excludes wildcard noise classes but pins Tier-1 server
/// processes as exceptions.
pub fn builtin_patterns(mode: FilterMode) -> BTreeMap<String, bool> {
    let entries: &[(&str, bool)] = match mode {
        FilterMode::None => &[],
        FilterMode::Standard => &[
            ("process.chrome.*", true),
            ("process.firefox.*", true),
            ("process.edge.*", true),
            ("process.safari.*", true),
            ("process.slack.*", true),
            ("process.teams.*", true),
            ("process.zoom.*", true),
            ("process.vscode.*", true),
            ("process.code.*", true),
            ("process.spotify.*", true),
        ],
        FilterMode::Aggressive => &[
            ("process.chrome.*", true),
            ("process.firefox.*", true),
            ("process.edge.*", true),
            ("process.safari.*", true),
            ("process.slack.*", true),
            ("process.teams.*", true),
            ("process.zoom.*", true),
            ("process.vscode.*", true),
            ("process.code.*", true),
            ("process.spotify.*", true),
            ("process.*tmp*", true),
            ("process.*cache*", true),
            ("process.*daemon*", true),
            ("process.*helper*", true),
            ("process.*notifier*", true),
            ("process.*updater*", true),
            ("process.*background*", true),
            // Tier-1 exceptions
            ("process.nginx.*", false),
            ("process.java.*", false),
            ("process.node.*", false),
            ("process.python*", false),
            ("process.ruby*", false),
            ("process.php*", false),
            ("process.mysqld*", false),
            ("process.postgres*", false),
            ("process.redis*", false),
            ("process.mongo*", false),
        ],
        FilterMode::Targeted => &[
            ("process.chrome.*", true),
            ("process.firefox.*", true),
            ("process.slack.*", true),
            ("process.teams.*", true),
            ("process.zoom.*", true),
        ],
    };

    entries
        .iter()
        .map(|(pattern, excluded)| (pattern.to_string(), *excluded))
        .collect()
}

/// Count of user-supplied exclusion patterns beyond the built-in set
///
/// Used by the cost estimator's keep-ratio derivation.
pub fn extra_pattern_count(config: &RenderedConfig, mode: FilterMode) -> usize {
    let builtin = builtin_patterns(mode);
    config
        .exclude_matching_metrics
        .iter()
        .filter(|(pattern, excluded)| **excluded && !builtin.contains_key(*pattern))
        .count()
}
