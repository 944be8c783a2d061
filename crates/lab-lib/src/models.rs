//! Core data models shared across the toolkit

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LabError, Result};

/// Sentinel sample rate meaning ProcessSample collection is disabled
pub const SAMPLE_RATE_DISABLED: i64 = -1;

/// Valid sample rate range in seconds (inclusive)
pub const SAMPLE_RATE_MIN: i64 = 20;
pub const SAMPLE_RATE_MAX: i64 = 300;

/// Process filter aggressiveness applied to a rendered configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// No exclusion filtering, every sampled process is kept
    None,
    /// Common desktop/background noise excluded
    Standard,
    /// Maximum filtering with Tier-1 exceptions kept
    Aggressive,
    /// Small hand-picked set of known-noisy processes excluded
    Targeted,
}

impl FilterMode {
    pub const ALL: [FilterMode; 4] = [
        FilterMode::None,
        FilterMode::Standard,
        FilterMode::Aggressive,
        FilterMode::Targeted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::None => "none",
            FilterMode::Standard => "standard",
            FilterMode::Aggressive => "aggressive",
            FilterMode::Targeted => "targeted",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(FilterMode::None),
            "standard" => Ok(FilterMode::Standard),
            "aggressive" => Ok(FilterMode::Aggressive),
            "targeted" => Ok(FilterMode::Targeted),
            other => Err(LabError::invalid(
                "filter_mode",
                format!("unrecognized value `{other}`, expected one of: none, standard, aggressive, targeted"),
            )),
        }
    }
}

/// A rendered Infrastructure Agent configuration document
///
/// Field names follow the agent's YAML keys. The exclusion map is ordered so
/// serialization is byte-deterministic for identical inputs. A pattern mapped
/// to `true` excludes matching process metrics; `false` marks an explicit
/// keep exception that overrides broader excludes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedConfig {
    pub metrics_process_sample_rate: i64,

    #[serde(default)]
    pub collect_command_line: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exclude_matching_metrics: BTreeMap<String, bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl RenderedConfig {
    /// Serialize to the YAML document consumed by the agent
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse a previously rendered YAML document
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// SHA-256 hex digest of the serialized document
    pub fn checksum(&self) -> Result<String> {
        Ok(sha256_hex(&self.to_yaml()?))
    }

    /// Whether ProcessSample collection is disabled
    pub fn is_disabled(&self) -> bool {
        self.metrics_process_sample_rate == SAMPLE_RATE_DISABLED
    }

    /// Exclusion patterns mapped to `true` (actual excludes, not exceptions)
    pub fn active_exclusions(&self) -> impl Iterator<Item = &str> {
        self.exclude_matching_metrics
            .iter()
            .filter(|(_, excluded)| **excluded)
            .map(|(pattern, _)| pattern.as_str())
    }
}

/// SHA-256 hex digest of arbitrary text
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> RenderedConfig {
        let mut exclude = BTreeMap::new();
        exclude.insert("process.chrome.*".to_string(), true);
        exclude.insert("process.nginx.*".to_string(), false);
        RenderedConfig {
            metrics_process_sample_rate: 90,
            collect_command_line: false,
            exclude_matching_metrics: exclude,
            log_file: Some("/var/log/newrelic-infra/newrelic-infra.log".to_string()),
        }
    }

    #[test]
    fn test_filter_mode_round_trip() {
        for mode in FilterMode::ALL {
            assert_eq!(mode.as_str().parse::<FilterMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_filter_mode_rejects_unknown() {
        let err = "maximal".parse::<FilterMode>().unwrap_err();
        assert!(err.to_string().contains("filter_mode"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = sample_config();
        let yaml = config.to_yaml().unwrap();
        let parsed = RenderedConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let config = sample_config();
        assert_eq!(config.to_yaml().unwrap(), config.to_yaml().unwrap());
        assert_eq!(config.checksum().unwrap(), config.checksum().unwrap());
    }

    #[test]
    fn test_active_exclusions_skip_exceptions() {
        let config = sample_config();
        let active: Vec<_> = config.active_exclusions().collect();
        assert_eq!(active, vec!["process.chrome.*"]);
    }

    #[test]
    fn test_disabled_sentinel() {
        let mut config = sample_config();
        assert!(!config.is_disabled());
        config.metrics_process_sample_rate = SAMPLE_RATE_DISABLED;
        assert!(config.is_disabled());
    }
}
