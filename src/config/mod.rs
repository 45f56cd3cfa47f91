//! Configuration loading and management

mod settings;

pub use settings::{FreshnessSettings, Settings};

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::VigilError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Profile configurations: profile name -> ordered scanner names
    #[serde(default)]
    pub profile: HashMap<String, ProfileConfig>,

    /// Scanner configurations for command-backed scanners
    #[serde(default)]
    pub scanner: HashMap<String, ScannerConfig>,

    /// General settings
    #[serde(default)]
    pub settings: Settings,
}

/// A named profile as written in config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Ordered scanner names; duplicates are dropped at resolution
    #[serde(default)]
    pub scanners: Vec<String>,
}

/// A command-backed scanner as written in config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub description: String,

    /// Binary to execute
    pub command: String,

    /// Arguments; `{repo}`, `{output}` and `{sbom}` are substituted
    #[serde(default)]
    pub args: Vec<String>,

    /// This scanner produces the SBOM artifact others consume
    #[serde(default)]
    pub provides_sbom: bool,

    /// This scanner reads the SBOM artifact when available
    #[serde(default)]
    pub depends_on_sbom: bool,

    /// Skipped by `scan --skip-slow`
    #[serde(default)]
    pub slow: bool,
}

/// A resolved profile: ordered, de-duplicated scanner names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub scanners: Vec<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from a directory.
    /// Looks for `.vigil/config.toml`, then the global `~/.vigil/config.toml`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let local_path = dir.join(".vigil/config.toml");
        if local_path.exists() {
            return Self::from_file(&local_path);
        }

        let global_path = Self::global_config_path();
        if global_path.exists() {
            return Self::from_file(&global_path);
        }

        Ok(Self::default())
    }

    /// Global config file path (`~/.vigil/config.toml`)
    pub fn global_config_path() -> std::path::PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(".vigil")
            .join("config.toml")
    }

    /// Expand a profile name into an ordered, de-duplicated scanner list.
    ///
    /// Unknown profile or an empty resolution is a configuration error,
    /// raised before anything runs.
    pub fn resolve_profile(&self, name: &str) -> std::result::Result<Profile, VigilError> {
        let profile = self.profile.get(name).ok_or_else(|| {
            let mut known: Vec<_> = self.profile.keys().cloned().collect();
            known.sort();
            VigilError::Config(format!(
                "unknown profile '{}' (available: {})",
                name,
                known.join(", ")
            ))
        })?;

        let mut seen = std::collections::HashSet::new();
        let scanners: Vec<String> = profile
            .scanners
            .iter()
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect();

        if scanners.is_empty() {
            return Err(VigilError::Config(format!(
                "profile '{}' resolves to no scanners",
                name
            )));
        }

        Ok(Profile {
            name: name.to_string(),
            scanners,
        })
    }
}

/// Default configuration content for `vigil init`
pub const DEFAULT_CONFIG: &str = r#"# Vigil Configuration
# ===================
#
# Profiles group scanners that run together. Scanners are external tools
# wrapped by vigil's command adapter; each writes a JSON artifact that the
# history store archives and the diff command compares across scans.

[settings]
# Scanners running concurrently in the parallel phase
parallel = 4
# Per-scanner wall-clock timeout (seconds)
timeout_seconds = 300
# Scans retained in history before the oldest are pruned
max_scans = 50

[settings.freshness]
fresh_max_hours = 24
stale_max_days = 7
very_stale_max_days = 30

# ============================================================================
# PROFILES - named scanner sets
# ============================================================================

[profile.default]
scanners = ["sbom", "vulns", "secrets", "licenses"]

[profile.quick]
scanners = ["secrets"]

[profile.full]
scanners = ["sbom", "vulns", "secrets", "licenses", "iac", "ownership"]

# ============================================================================
# SCANNERS - external tools behind the command adapter
# ============================================================================
#
# Each scanner's stdout (or {output} file) must be JSON with at least a
# "summary" field; diffable scanners also emit a "findings" array of
# {rule_id, severity, file, line_start, line_end, message, fingerprint}.
#
# Substitutions: {repo} = repository path, {output} = artifact directory,
# {sbom} = SBOM artifact path (empty when unavailable).

[scanner.sbom]
description = "Generate a CycloneDX SBOM for the repository"
command = "syft"
args = ["scan", "{repo}", "-o", "cyclonedx-json"]
provides_sbom = true

[scanner.vulns]
description = "Match SBOM packages against vulnerability feeds"
command = "grype"
args = ["sbom:{sbom}", "-o", "json"]
depends_on_sbom = true
slow = true

[scanner.secrets]
description = "Detect committed credentials and tokens"
command = "gitleaks"
args = ["detect", "--source", "{repo}", "--report-format", "json"]

[scanner.licenses]
description = "License inventory from the SBOM"
command = "licensee"
args = ["{repo}"]
depends_on_sbom = true

[scanner.iac]
description = "Infrastructure-as-code misconfigurations"
command = "checkov"
args = ["-d", "{repo}", "-o", "json"]
slow = true

[scanner.ownership]
description = "Code ownership and bus-factor analysis"
command = "vigil-ownership"
args = ["{repo}"]
"#;
