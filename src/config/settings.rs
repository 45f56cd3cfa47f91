//! Settings configuration types

use serde::{Deserialize, Serialize};

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum scanners running concurrently in the parallel phase
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Per-scanner wall-clock timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Grace period after termination before a scanner task is abandoned,
    /// in seconds
    #[serde(default = "default_grace_seconds")]
    pub grace_seconds: u64,

    /// Freshness thresholds (hours fresh, days stale, days very stale)
    #[serde(default)]
    pub freshness: FreshnessSettings,

    /// Maximum scans retained in history before the oldest are pruned
    #[serde(default = "default_max_scans")]
    pub max_scans: usize,
}

/// Staleness boundaries; see the freshness tracker for level derivation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FreshnessSettings {
    #[serde(default = "default_fresh_max_hours")]
    pub fresh_max_hours: i64,

    #[serde(default = "default_stale_max_days")]
    pub stale_max_days: i64,

    #[serde(default = "default_very_stale_max_days")]
    pub very_stale_max_days: i64,
}

fn default_parallel() -> usize {
    4
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_grace_seconds() -> u64 {
    2
}

fn default_max_scans() -> usize {
    50
}

fn default_fresh_max_hours() -> i64 {
    24
}

fn default_stale_max_days() -> i64 {
    7
}

fn default_very_stale_max_days() -> i64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            timeout_seconds: default_timeout_seconds(),
            grace_seconds: default_grace_seconds(),
            freshness: FreshnessSettings::default(),
            max_scans: default_max_scans(),
        }
    }
}

impl Default for FreshnessSettings {
    fn default() -> Self {
        Self {
            fresh_max_hours: default_fresh_max_hours(),
            stale_max_days: default_stale_max_days(),
            very_stale_max_days: default_very_stale_max_days(),
        }
    }
}
