//! Scan history - append-only per-repository log with ref resolution
//!
//! Every completed run appends one [`ScanRecord`] and archives its
//! per-scanner artifacts under `history/scans/<scan-id>/`, which is what
//! lets the delta computer compare any two historical scans.

use std::path::Path;
use tracing::{debug, warn};

use crate::domain::{Finding, History, ScanRecord};
use crate::error::{Result, VigilError};
use crate::scanner::ScanArtifact;
use crate::storage::{copy_json_artifacts, read_json, write_json, StorePaths};

pub struct HistoryStore {
    store: StorePaths,
    /// Scans retained before the oldest are pruned
    max_scans: usize,
}

impl HistoryStore {
    pub fn new(store: StorePaths, max_scans: usize) -> Self {
        Self { store, max_scans }
    }

    /// Load a repository's history. A missing log is an empty history
    /// (zero scans), not an error.
    pub fn load(&self, project_id: &str) -> Result<History> {
        let path = self.store.history_path(project_id);
        Ok(read_json(&path)?.unwrap_or_else(|| History::empty(project_id)))
    }

    /// Append a completed scan's record. The only mutation; records are
    /// immutable once appended and stay in chronological order.
    pub fn append(&self, project_id: &str, record: ScanRecord) -> Result<()> {
        let mut history = self.load(project_id)?;
        history.push(record);
        self.prune(project_id, &mut history);
        write_json(&self.store.history_path(project_id), &history)
    }

    /// Copy the current analysis artifacts into the archive for `scan_id`.
    pub fn archive_scan(&self, project_id: &str, scan_id: &str) -> Result<()> {
        let src = self.store.analysis_dir(project_id);
        let dst = self.store.scan_dir(project_id, scan_id);
        let copied = copy_json_artifacts(&src, &dst)?;
        debug!(project_id, scan_id, copied, "archived scan artifacts");
        Ok(())
    }

    /// Resolve a symbolic scan reference.
    ///
    /// Accepts `latest`, `latest~N` (1-indexed back from the latest scan),
    /// a literal scan id, or a commit-hash prefix (the most recent matching
    /// scan wins on ambiguity).
    pub fn resolve_ref(&self, project_id: &str, reference: &str) -> Result<ScanRecord> {
        let history = self.load(project_id)?;

        if reference.is_empty() || reference == "latest" {
            return history
                .latest()
                .cloned()
                .ok_or_else(|| VigilError::HistoryNotFound(format!("no scans for {}", project_id)));
        }

        if let Some(offset) = reference.strip_prefix("latest~") {
            let n: usize = offset.parse().map_err(|_| {
                VigilError::HistoryNotFound(format!("invalid scan reference: {}", reference))
            })?;
            if n == 0 || n >= history.scans.len() {
                return Err(VigilError::HistoryNotFound(format!(
                    "{} out of range (have {} scans)",
                    reference,
                    history.scans.len()
                )));
            }
            return Ok(history.scans[history.scans.len() - 1 - n].clone());
        }

        // Literal scan id first
        if let Some(record) = history.scans.iter().rev().find(|s| s.scan_id == reference) {
            return Ok(record.clone());
        }

        // Then commit-hash prefix, most recent match wins
        if let Some(record) = history.scans.iter().rev().find(|s| {
            s.commit_hash.starts_with(reference) || s.commit_short.starts_with(reference)
        }) {
            return Ok(record.clone());
        }

        Err(VigilError::HistoryNotFound(format!(
            "no scan matches '{}' for {}",
            reference, project_id
        )))
    }

    /// Load every archived finding for a scan, across all its scanners.
    pub fn load_findings(&self, project_id: &str, scan_id: &str) -> Result<Vec<Finding>> {
        let dir = self.store.scan_dir(project_id, scan_id);
        self.read_artifact_findings(&dir, scan_id)
    }

    fn read_artifact_findings(&self, dir: &Path, scan_id: &str) -> Result<Vec<Finding>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VigilError::HistoryNotFound(format!(
                    "no archived artifacts for scan {}",
                    scan_id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut findings = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            match read_json::<ScanArtifact>(&path)? {
                Some(artifact) => findings.extend(artifact.findings),
                None => continue,
            }
        }
        Ok(findings)
    }

    /// Keep only the most recent `max_scans` records, removing evicted
    /// scans' archived artifacts and commit-index entries.
    fn prune(&self, project_id: &str, history: &mut History) {
        if self.max_scans == 0 || history.scans.len() <= self.max_scans {
            return;
        }

        let evict = history.scans.len() - self.max_scans;
        let evicted: Vec<ScanRecord> = history.scans.drain(..evict).collect();
        history.total_scans = history.scans.len();
        history.first_scan_at = history.scans.first().map(|s| s.completed_at);

        for record in &evicted {
            let dir = self.store.scan_dir(project_id, &record.scan_id);
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(scan_id = %record.scan_id, error = %e, "failed to remove archived scan");
                }
            }

            if let Some(ids) = history.by_commit.get_mut(&record.commit_hash) {
                ids.retain(|id| id != &record.scan_id);
                if ids.is_empty() {
                    history.by_commit.remove(&record.commit_hash);
                }
            }
        }
    }
}
