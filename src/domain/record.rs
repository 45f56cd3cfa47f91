//! Scan history records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{FindingsSummary, ScanManifest};

/// Overall outcome of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Complete,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Complete => "complete",
            ScanStatus::Failed => "failed",
        }
    }
}

/// One completed run, immutable once appended to history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: String,
    pub commit_hash: String,
    pub commit_short: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub profile: String,
    pub scanners_run: Vec<String>,
    pub status: ScanStatus,
    pub findings_summary: FindingsSummary,
}

impl ScanRecord {
    /// Build the record for a finalized manifest.
    pub fn from_manifest(manifest: &ScanManifest, findings_summary: FindingsSummary) -> Self {
        Self {
            scan_id: manifest.scan_id.clone(),
            commit_hash: manifest.commit.clone(),
            commit_short: manifest.commit.chars().take(8).collect(),
            branch: manifest.branch.clone(),
            started_at: manifest.started_at,
            completed_at: manifest.completed_at.unwrap_or(manifest.started_at),
            duration_seconds: manifest.duration_seconds(),
            profile: manifest.profile.clone(),
            scanners_run: manifest.scanners.keys().cloned().collect(),
            status: if manifest.success {
                ScanStatus::Complete
            } else {
                ScanStatus::Failed
            },
            findings_summary,
        }
    }
}

/// Append-only per-repository scan log.
///
/// `scans` is ordered oldest to newest; that ordering defines `latest~N`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    pub repository: String,
    #[serde(default)]
    pub total_scans: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_scan_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scans: Vec<ScanRecord>,
    /// commit hash -> scan ids, most recent last
    #[serde(default)]
    pub by_commit: BTreeMap<String, Vec<String>>,
}

impl History {
    pub fn empty(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            total_scans: 0,
            first_scan_at: None,
            last_scan_at: None,
            scans: Vec::new(),
            by_commit: BTreeMap::new(),
        }
    }

    /// Append a record and update the derived fields. The only mutation
    /// history supports.
    pub fn push(&mut self, record: ScanRecord) {
        if self.first_scan_at.is_none() {
            self.first_scan_at = Some(record.completed_at);
        }
        self.last_scan_at = Some(record.completed_at);
        self.by_commit
            .entry(record.commit_hash.clone())
            .or_default()
            .push(record.scan_id.clone());
        self.scans.push(record);
        self.total_scans = self.scans.len();
    }

    pub fn latest(&self) -> Option<&ScanRecord> {
        self.scans.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScanManifest;

    fn record(id: &str, commit: &str) -> ScanRecord {
        let mut manifest =
            ScanManifest::new("proj", commit, "main", "default", id, &["a".to_string()]);
        manifest.scanners.get_mut("a").unwrap().status = crate::domain::ScannerStatus::Complete;
        manifest.finalize();
        ScanRecord::from_manifest(&manifest, FindingsSummary::default())
    }

    #[test]
    fn push_keeps_chronological_order_and_commit_index() {
        let mut history = History::empty("proj");
        history.push(record("s1", "aaa"));
        history.push(record("s2", "bbb"));
        history.push(record("s3", "aaa"));

        assert_eq!(history.total_scans, 3);
        assert_eq!(history.latest().unwrap().scan_id, "s3");
        assert_eq!(history.by_commit["aaa"], vec!["s1", "s3"]);
        assert_eq!(
            history.first_scan_at.unwrap(),
            history.scans[0].completed_at
        );
    }

    #[test]
    fn record_reflects_manifest_outcome() {
        let mut manifest =
            ScanManifest::new("proj", "deadbeefcafe", "main", "default", "s1", &["a".into()]);
        manifest.scanners.get_mut("a").unwrap().status = crate::domain::ScannerStatus::Failed;
        manifest.finalize();
        let record = ScanRecord::from_manifest(&manifest, FindingsSummary::default());
        assert_eq!(record.status, ScanStatus::Failed);
        assert_eq!(record.commit_short, "deadbeef");
        assert_eq!(record.scanners_run, vec!["a"]);
    }
}
