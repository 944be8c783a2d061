//! Tier-1 process coverage
//!
//! Tier-1 processes are the server workloads fleets actually alert on. A
//! filter set that excludes them saves ingest but blinds monitoring, so the
//! linter weights coverage loss by how many hosts run each process.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A monitored server process and the number of fleet hosts running it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier1Process {
    pub name: String,
    pub host_count: u32,
}

impl Tier1Process {
    pub fn new(name: &str, host_count: u32) -> Self {
        Self {
            name: name.to_string(),
            host_count,
        }
    }
}

/// Fleet-default Tier-1 census used when NRDB is unavailable
pub fn default_tier1() -> Vec<Tier1Process> {
    [
        ("nginx", 350),
        ("java", 320),
        ("node", 280),
        ("python", 250),
        ("apache2", 200),
        ("httpd", 190),
        ("mysqld", 180),
        ("postgres", 150),
        ("ruby", 120),
        ("php-fpm", 110),
        ("redis-server", 90),
        ("elasticsearch", 80),
        ("mongod", 70),
        ("memcached", 65),
        ("cassandra", 40),
    ]
    .into_iter()
    .map(|(name, hosts)| Tier1Process::new(name, hosts))
    .collect()
}

/// Host-weighted coverage impact of an exclusion pattern set
#[derive(Debug, Clone, Serialize)]
pub struct CoverageEstimate {
    /// Fraction of Tier-1 host-coverage dropped by the filters, in [0, 1]
    pub tier1_drop_ratio: f64,
    /// Names of Tier-1 processes the filters exclude
    pub excluded: Vec<String>,
}

/// Whether a pattern set excludes metrics for a process
///
/// A pattern mapped to `true` drops the process unless a keep exception
/// (`false`) also matches; exceptions always win.
pub fn is_excluded(patterns: &BTreeMap<String, bool>, process_name: &str) -> bool {
    let mut excluded = false;
    for (pattern, is_exclude) in patterns {
        if matches_process(pattern, process_name) {
            if *is_exclude {
                excluded = true;
            } else {
                return false;
            }
        }
    }
    excluded
}

/// Host-weighted Tier-1 coverage drop for a pattern set
pub fn coverage_estimate(
    patterns: &BTreeMap<String, bool>,
    tier1: &[Tier1Process],
) -> CoverageEstimate {
    let total_hosts: u64 = tier1.iter().map(|p| p.host_count as u64).sum();

    let mut excluded = Vec::new();
    let mut dropped_hosts = 0u64;
    for process in tier1 {
        if is_excluded(patterns, &process.name) {
            dropped_hosts += process.host_count as u64;
            excluded.push(process.name.clone());
        }
    }

    let tier1_drop_ratio = if total_hosts == 0 {
        0.0
    } else {
        dropped_hosts as f64 / total_hosts as f64
    };

    CoverageEstimate {
        tier1_drop_ratio,
        excluded,
    }
}

/// Keep ratio measured against an observed process census
///
/// Fraction of host-weighted process instances the pattern set retains.
/// `None` when the census is empty; the heuristic per-mode ratio applies.
pub fn keep_ratio_from_census(
    patterns: &BTreeMap<String, bool>,
    census: &[Tier1Process],
) -> Option<f64> {
    let total: u64 = census.iter().map(|p| p.host_count as u64).sum();
    if total == 0 {
        return None;
    }
    let kept: u64 = census
        .iter()
        .filter(|p| !is_excluded(patterns, &p.name))
        .map(|p| p.host_count as u64)
        .sum();
    Some(kept as f64 / total as f64)
}

/// Glob-match an exclusion pattern against a process's metric namespace
fn matches_process(pattern: &str, process_name: &str) -> bool {
    let metric = format!("process.{process_name}.cpu_percent");
    match glob::Pattern::new(pattern) {
        Ok(compiled) => compiled.matches(&metric),
        // Malformed patterns never match; the agent rejects them too
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(entries: &[(&str, bool)]) -> BTreeMap<String, bool> {
        entries
            .iter()
            .map(|(p, e)| (p.to_string(), *e))
            .collect()
    }

    #[test]
    fn test_exclusion_pattern_matches_process() {
        let set = patterns(&[("process.nginx.*", true)]);
        assert!(is_excluded(&set, "nginx"));
        assert!(!is_excluded(&set, "postgres"));
    }

    #[test]
    fn test_keep_exception_overrides_wildcard_exclude() {
        let set = patterns(&[("process.*", true), ("process.nginx.*", false)]);
        assert!(!is_excluded(&set, "nginx"));
        assert!(is_excluded(&set, "chrome"));
    }

    #[test]
    fn test_coverage_is_host_weighted() {
        // nginx is 350 of the census hosts
        let set = patterns(&[("process.nginx.*", true)]);
        let estimate = coverage_estimate(&set, &default_tier1());
        let total: u64 = default_tier1().iter().map(|p| p.host_count as u64).sum();
        assert!((estimate.tier1_drop_ratio - 350.0 / total as f64).abs() < 1e-12);
        assert_eq!(estimate.excluded, vec!["nginx"]);
    }

    #[test]
    fn test_empty_filters_drop_nothing() {
        let estimate = coverage_estimate(&patterns(&[]), &default_tier1());
        assert_eq!(estimate.tier1_drop_ratio, 0.0);
        assert!(estimate.excluded.is_empty());
    }

    #[test]
    fn test_empty_census_has_zero_ratio() {
        let set = patterns(&[("process.*", true)]);
        let estimate = coverage_estimate(&set, &[]);
        assert_eq!(estimate.tier1_drop_ratio, 0.0);
    }

    #[test]
    fn test_keep_ratio_from_census() {
        let census = vec![
            Tier1Process::new("nginx", 60),
            Tier1Process::new("chrome", 40),
        ];
        let set = patterns(&[("process.chrome.*", true)]);
        let keep = keep_ratio_from_census(&set, &census).unwrap();
        assert!((keep - 0.6).abs() < 1e-12);
        assert_eq!(keep_ratio_from_census(&set, &[]), None);
    }

    #[test]
    fn test_malformed_pattern_never_matches() {
        let set = patterns(&[("process.[nginx", true)]);
        assert!(!is_excluded(&set, "nginx"));
    }
}
