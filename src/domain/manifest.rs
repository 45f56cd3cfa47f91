//! Scan manifest - per-run record of each scanner's execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Execution status of a single scanner within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Timeout,
    Skipped,
}

impl ScannerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScannerStatus::Pending => "pending",
            ScannerStatus::Running => "running",
            ScannerStatus::Complete => "complete",
            ScannerStatus::Failed => "failed",
            ScannerStatus::Timeout => "timeout",
            ScannerStatus::Skipped => "skipped",
        }
    }

    /// Terminal states settle a manifest entry; running/pending do not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScannerStatus::Pending | ScannerStatus::Running)
    }
}

/// One scanner's entry in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerEntry {
    pub status: ScannerStatus,

    /// Wall-clock duration, set when the entry settles
    #[serde(default)]
    pub duration_ms: u64,

    /// Human-readable outcome line (e.g., "3 critical, 1 high")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Path of the JSON artifact this scanner wrote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

impl ScannerEntry {
    pub fn pending() -> Self {
        Self {
            status: ScannerStatus::Pending,
            duration_ms: 0,
            summary: None,
            error: None,
            artifact: None,
        }
    }
}

/// Per-run record of each scanner's execution status and summary.
///
/// Created with every resolved scanner keyed as `pending`, mutated
/// incrementally as scanners settle, finalized with `completed_at` and the
/// aggregate `success` flag. The key set is always exactly the resolved
/// profile's scanner names for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanManifest {
    pub project_id: String,
    pub commit: String,
    pub branch: String,
    pub profile: String,
    pub scan_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub scanners: BTreeMap<String, ScannerEntry>,
    #[serde(default)]
    pub success: bool,
}

impl ScanManifest {
    /// Create a manifest with one pending entry per resolved scanner name.
    pub fn new(
        project_id: impl Into<String>,
        commit: impl Into<String>,
        branch: impl Into<String>,
        profile: impl Into<String>,
        scan_id: impl Into<String>,
        scanner_names: &[String],
    ) -> Self {
        let scanners = scanner_names
            .iter()
            .map(|name| (name.clone(), ScannerEntry::pending()))
            .collect();

        Self {
            project_id: project_id.into(),
            commit: commit.into(),
            branch: branch.into(),
            profile: profile.into(),
            scan_id: scan_id.into(),
            started_at: Utc::now(),
            completed_at: None,
            scanners,
            success: false,
        }
    }

    /// Finalize the manifest: stamp completion and compute the aggregate
    /// success flag. Success is true iff no entry failed or timed out.
    ///
    /// Entries still pending or running here were never given a chance to
    /// finish (the run was cancelled); they settle as `skipped` and also
    /// fail the run.
    pub fn finalize(&mut self) {
        self.completed_at = Some(Utc::now());
        let mut interrupted = false;
        for entry in self.scanners.values_mut() {
            if !entry.status.is_terminal() {
                entry.status = ScannerStatus::Skipped;
                interrupted = true;
            }
        }
        self.success = !interrupted
            && !self
                .scanners
                .values()
                .any(|e| matches!(e.status, ScannerStatus::Failed | ScannerStatus::Timeout));
    }

    /// Count of entries in a terminal state
    pub fn settled_count(&self) -> usize {
        self.scanners.values().filter(|e| e.status.is_terminal()).count()
    }

    pub fn duration_seconds(&self) -> i64 {
        match self.completed_at {
            Some(done) => (done - self.started_at).num_seconds(),
            None => 0,
        }
    }

    /// Names of scanners that reached `complete`
    pub fn completed_scanners(&self) -> Vec<String> {
        self.scanners
            .iter()
            .filter(|(_, e)| e.status == ScannerStatus::Complete)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_keys_match_resolved_names() {
        let names = vec!["sbom".to_string(), "secrets".to_string()];
        let manifest = ScanManifest::new("proj", "abc", "main", "default", "s1", &names);
        let keys: Vec<_> = manifest.scanners.keys().cloned().collect();
        assert_eq!(keys, vec!["sbom", "secrets"]);
        assert!(manifest
            .scanners
            .values()
            .all(|e| e.status == ScannerStatus::Pending));
    }

    #[test]
    fn finalize_fails_on_any_timeout() {
        let names = vec!["a".to_string(), "b".to_string()];
        let mut manifest = ScanManifest::new("proj", "abc", "main", "default", "s1", &names);
        manifest.scanners.get_mut("a").unwrap().status = ScannerStatus::Complete;
        manifest.scanners.get_mut("b").unwrap().status = ScannerStatus::Timeout;
        manifest.finalize();
        assert!(!manifest.success);
        assert!(manifest.completed_at.is_some());
    }

    #[test]
    fn finalize_succeeds_when_all_complete() {
        let names = vec!["a".to_string()];
        let mut manifest = ScanManifest::new("proj", "abc", "main", "default", "s1", &names);
        manifest.scanners.get_mut("a").unwrap().status = ScannerStatus::Complete;
        manifest.finalize();
        assert!(manifest.success);
    }
}
