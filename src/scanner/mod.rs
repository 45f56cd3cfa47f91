//! Scanner contract
//!
//! Scanners are black boxes behind one capability interface: they receive a
//! [`ScanContext`], do their work, and return a [`ScanOutput`]. The
//! orchestrator owns timeouts, artifact persistence and manifest
//! bookkeeping; a scanner implementation never touches those.

mod command;
mod registry;

pub use command::CommandScanner;
pub use registry::ScannerRegistry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::domain::Finding;
use crate::error::Result;

/// Inputs for a scanner run
#[derive(Debug, Clone)]
pub struct ScanContext {
    /// Path to the already-cloned repository
    pub repo_path: PathBuf,

    /// Directory the scanner's artifact will be written to
    pub output_dir: PathBuf,

    /// Pre-generated SBOM artifact, when the dependency phase produced one.
    /// Set once before the parallel phase starts; read-only afterward.
    pub sbom_path: Option<PathBuf>,

    /// Wall-clock budget for this run
    pub timeout: Duration,

    /// Cancelled when the run is being terminated (timeout or ctrl-c).
    /// Scanners spawning subprocesses must kill them when this fires.
    pub cancel: CancellationToken,
}

/// What a scanner returns on success
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    /// One-line human-readable outcome (e.g., "2 critical, 5 high")
    pub summary: String,

    /// Diffable findings; empty for scanners that only produce metadata
    pub findings: Vec<Finding>,

    /// Scanner-specific payload carried into the artifact verbatim
    pub metadata: serde_json::Value,
}

/// Capability interface implemented by every scanner plugin
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scanner identifier (e.g., "secrets"); doubles as the artifact name
    fn name(&self) -> &str;

    /// Human-readable description for listings
    fn description(&self) -> &str;

    /// True for the designated SBOM/dependency scanner that runs in the
    /// dependency phase before everything else
    fn provides_sbom(&self) -> bool {
        false
    }

    /// True if this scanner consumes the SBOM artifact when available
    fn depends_on_sbom(&self) -> bool {
        false
    }

    /// Skipped by `scan --skip-slow`
    fn is_slow(&self) -> bool {
        false
    }

    /// Execute the scanner and return results
    async fn run(&self, ctx: &ScanContext) -> Result<ScanOutput>;
}

/// Immutable description of a registered scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerDescriptor {
    pub name: String,
    pub description: String,
    pub provides_sbom: bool,
    pub depends_on_sbom: bool,
    pub slow: bool,
}

/// Persisted form of a scanner's output (`analysis/<name>.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanArtifact {
    pub scanner: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: u64,
    pub summary: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl ScanArtifact {
    pub fn new(scanner: &str, output: ScanOutput, duration: Duration) -> Self {
        let mut findings = output.findings;
        for f in &mut findings {
            f.ensure_fingerprint();
        }
        Self {
            scanner: scanner.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            duration_seconds: duration.as_secs(),
            summary: output.summary,
            findings,
            metadata: output.metadata,
        }
    }
}
