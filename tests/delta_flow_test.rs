//! End-to-end diff flow: archived scans in, classified delta out

mod common;

use chrono::Utc;
use std::time::Duration as StdDuration;
use tempfile::TempDir;

use vigil::delta::{diff_scans, DeltaOptions};
use vigil::domain::{Finding, FindingsSummary, ScanRecord, ScanStatus};
use vigil::error::VigilError;
use vigil::history::HistoryStore;
use vigil::scanner::{ScanArtifact, ScanOutput};
use vigil::storage::{write_json, StorePaths};

use common::finding;

fn record(id: &str, commit: &str) -> ScanRecord {
    ScanRecord {
        scan_id: id.to_string(),
        commit_hash: commit.to_string(),
        commit_short: commit.chars().take(8).collect(),
        branch: "main".to_string(),
        started_at: Utc::now(),
        completed_at: Utc::now(),
        duration_seconds: 1,
        profile: "default".to_string(),
        scanners_run: vec!["secrets".to_string()],
        status: ScanStatus::Complete,
        findings_summary: FindingsSummary::default(),
    }
}

/// Append a scan whose archive holds the given findings
fn seed_scan(store: &StorePaths, history: &HistoryStore, id: &str, findings: Vec<Finding>) {
    history.append("repo", record(id, &format!("c-{}", id))).unwrap();

    let artifact = ScanArtifact::new(
        "secrets",
        ScanOutput {
            summary: format!("{} findings", findings.len()),
            findings,
            metadata: serde_json::Value::Null,
        },
        StdDuration::from_millis(25),
    );
    write_json(&store.scan_dir("repo", id).join("secrets.json"), &artifact).unwrap();
}

#[test]
fn diff_classifies_across_archived_scans() {
    let temp = TempDir::new().unwrap();
    let store = StorePaths::new(temp.path());
    let history = HistoryStore::new(store.clone(), 50);

    seed_scan(
        &store,
        &history,
        "scan-1",
        vec![
            finding("secrets", "api-key", "src/config.rs", 10, "api key in config"),
            finding("secrets", "api-key", "src/auth.rs", 44, "another key"),
        ],
    );
    seed_scan(
        &store,
        &history,
        "scan-2",
        vec![
            // Same finding, shifted 3 lines with edited text: moved
            finding("secrets", "api-key", "src/config.rs", 13, "api key in config block"),
            // Brand new finding
            finding("secrets", "token", "src/main.rs", 7, "hardcoded token"),
        ],
    );

    let delta = diff_scans(
        &history,
        "repo",
        "latest~1",
        "latest",
        &DeltaOptions::default(),
    )
    .unwrap();

    assert_eq!(delta.baseline_scan_id, "scan-1");
    assert_eq!(delta.compare_scan_id, "scan-2");
    assert_eq!(delta.moved.len(), 1);
    assert_eq!(delta.moved[0].line_shift, 3);
    assert_eq!(delta.new.len(), 1);
    assert_eq!(delta.new[0].rule_id, "token");
    assert_eq!(delta.fixed.len(), 1, "the auth.rs finding was fixed");
    assert_eq!(delta.unchanged, 0);
}

#[test]
fn self_diff_short_circuits_to_empty() {
    let temp = TempDir::new().unwrap();
    let store = StorePaths::new(temp.path());
    let history = HistoryStore::new(store.clone(), 50);

    seed_scan(
        &store,
        &history,
        "scan-1",
        vec![finding("secrets", "api-key", "a.rs", 1, "x")],
    );
    seed_scan(
        &store,
        &history,
        "scan-2",
        vec![finding("secrets", "api-key", "a.rs", 1, "x")],
    );

    // Both refs resolve to the same scan
    let delta = diff_scans(
        &history,
        "repo",
        "scan-2",
        "latest",
        &DeltaOptions::default(),
    )
    .unwrap();

    assert!(delta.new.is_empty());
    assert!(delta.fixed.is_empty());
    assert!(delta.moved.is_empty());
    assert_eq!(delta.unchanged, 1);
}

#[test]
fn diff_requires_two_scans() {
    let temp = TempDir::new().unwrap();
    let store = StorePaths::new(temp.path());
    let history = HistoryStore::new(store.clone(), 50);

    seed_scan(
        &store,
        &history,
        "scan-1",
        vec![finding("secrets", "api-key", "a.rs", 1, "x")],
    );

    let err = diff_scans(
        &history,
        "repo",
        "latest~1",
        "latest",
        &DeltaOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, VigilError::HistoryNotFound(_)));
}

#[test]
fn unresolvable_ref_is_history_not_found() {
    let temp = TempDir::new().unwrap();
    let store = StorePaths::new(temp.path());
    let history = HistoryStore::new(store.clone(), 50);

    seed_scan(&store, &history, "scan-1", vec![]);
    seed_scan(&store, &history, "scan-2", vec![]);

    let err = diff_scans(
        &history,
        "repo",
        "deadbeef",
        "latest",
        &DeltaOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, VigilError::HistoryNotFound(_)));
}

#[test]
fn severity_filter_trims_output_not_classification() {
    let temp = TempDir::new().unwrap();
    let store = StorePaths::new(temp.path());
    let history = HistoryStore::new(store.clone(), 50);

    let mut low = finding("secrets", "weak-hash", "b.rs", 5, "weak hash");
    low.severity = vigil::domain::Severity::Low;
    low.fingerprint = low.compute_fingerprint();

    seed_scan(&store, &history, "scan-1", vec![]);
    seed_scan(
        &store,
        &history,
        "scan-2",
        vec![finding("secrets", "api-key", "a.rs", 1, "high sev"), low],
    );

    let options = DeltaOptions {
        severity: Some(vigil::domain::Severity::High),
        ..Default::default()
    };
    let delta = diff_scans(&history, "repo", "latest~1", "latest", &options).unwrap();
    assert_eq!(delta.new.len(), 1);
    assert_eq!(delta.new[0].rule_id, "api-key");
}
