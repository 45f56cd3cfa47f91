//! Integration tests for the freshness tracker

mod common;

use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use tempfile::TempDir;

use vigil::config::FreshnessSettings;
use vigil::freshness::{FreshnessMetadata, FreshnessTracker, Level, ScannerFreshness};
use vigil::storage::{write_json, StorePaths};

use common::profile;

fn tracker(store: &TempDir) -> FreshnessTracker {
    FreshnessTracker::new(StorePaths::new(store.path()), FreshnessSettings::default())
}

/// Write metadata with a last scan `hours_ago` and the given scanner flags
fn seed_metadata(store: &TempDir, repo: &str, hours_ago: i64, scanners: &[(&str, bool)]) {
    let mut meta = FreshnessMetadata::empty(repo);
    meta.last_scan = Some(Utc::now() - Duration::hours(hours_ago));
    meta.profile = "default".to_string();
    meta.scanners = scanners
        .iter()
        .map(|(name, success)| {
            (
                name.to_string(),
                ScannerFreshness {
                    success: *success,
                    last_run: Utc::now() - Duration::hours(hours_ago),
                    duration_ms: 100,
                    last_error: if *success {
                        None
                    } else {
                        Some("boom".to_string())
                    },
                },
            )
        })
        .collect::<BTreeMap<_, _>>();

    let paths = StorePaths::new(store.path());
    write_json(&paths.freshness_path(repo), &meta).unwrap();
}

#[test]
fn fresh_and_fully_successful_skips_the_scan() {
    let store = TempDir::new().unwrap();
    seed_metadata(&store, "repo", 2, &[("secrets", true), ("licenses", true)]);

    let (run, reason) = tracker(&store)
        .should_scan("repo", &profile("default", &["secrets", "licenses"]), false)
        .unwrap();
    assert!(!run, "2h-old fully-successful data must not re-scan");
    assert!(reason.contains("fresh"), "reason was: {}", reason);
}

#[test]
fn stale_data_rescans_citing_the_level() {
    let store = TempDir::new().unwrap();
    seed_metadata(&store, "repo", 40, &[("secrets", true)]);

    let (run, reason) = tracker(&store)
        .should_scan("repo", &profile("default", &["secrets"]), false)
        .unwrap();
    assert!(run, "40h-old data must re-scan");
    assert!(reason.contains("stale"), "reason must cite staleness: {}", reason);
}

#[test]
fn previously_failed_scanner_forces_rescan_even_when_fresh() {
    let store = TempDir::new().unwrap();
    seed_metadata(&store, "repo", 2, &[("secrets", true), ("licenses", false)]);

    let (run, reason) = tracker(&store)
        .should_scan("repo", &profile("default", &["secrets", "licenses"]), false)
        .unwrap();
    assert!(run);
    assert!(
        reason.contains("licenses"),
        "reason must name the failed scanner: {}",
        reason
    );
}

#[test]
fn scanner_never_run_forces_rescan() {
    let store = TempDir::new().unwrap();
    seed_metadata(&store, "repo", 2, &[("secrets", true)]);

    let (run, reason) = tracker(&store)
        .should_scan("repo", &profile("wide", &["secrets", "iac"]), false)
        .unwrap();
    assert!(run);
    assert!(reason.contains("iac"), "reason was: {}", reason);
}

#[test]
fn never_scanned_repo_always_runs() {
    let store = TempDir::new().unwrap();
    let (run, reason) = tracker(&store)
        .should_scan("repo", &profile("default", &["secrets"]), false)
        .unwrap();
    assert!(run);
    assert_eq!(reason, "never scanned");
}

#[test]
fn manual_force_bypasses_everything() {
    let store = TempDir::new().unwrap();
    seed_metadata(&store, "repo", 1, &[("secrets", true)]);

    let (run, reason) = tracker(&store)
        .should_scan("repo", &profile("default", &["secrets"]), true)
        .unwrap();
    assert!(run);
    assert_eq!(reason, "forced");
}

#[test]
fn list_all_skips_malformed_metadata() {
    let store = TempDir::new().unwrap();
    seed_metadata(&store, "good", 2, &[("secrets", true)]);

    // A broken repository entry alongside the good one
    let paths = StorePaths::new(store.path());
    let broken_path = paths.freshness_path("broken");
    std::fs::create_dir_all(broken_path.parent().unwrap()).unwrap();
    std::fs::write(&broken_path, "{ not json").unwrap();

    let reports = tracker(&store).list_all().unwrap();
    assert_eq!(
        reports.len(),
        1,
        "broken metadata must be skipped, not abort the listing"
    );
    assert_eq!(reports[0].repository, "good");
    assert_eq!(reports[0].level, Level::Fresh);
}

#[test]
fn record_scan_merges_absent_scanners() {
    let store = TempDir::new().unwrap();
    seed_metadata(&store, "repo", 30, &[("secrets", false), ("licenses", true)]);

    // A new run that only ran "secrets", successfully this time
    let mut manifest = vigil::domain::ScanManifest::new(
        "repo",
        "abc123",
        "main",
        "quick",
        "scan-1",
        &["secrets".to_string()],
    );
    manifest.scanners.get_mut("secrets").unwrap().status =
        vigil::domain::ScannerStatus::Complete;
    manifest.finalize();

    let target = vigil::orchestrator::RepoTarget {
        project_id: "repo".to_string(),
        path: store.path().to_path_buf(),
        commit: "abc123".to_string(),
        commit_short: "abc123".to_string(),
        branch: "main".to_string(),
    };
    tracker(&store).record_scan(&target, &manifest).unwrap();

    let meta = tracker(&store).load("repo").unwrap();
    assert!(
        meta.scanners["secrets"].success,
        "re-run scanner must be overwritten"
    );
    assert!(
        meta.scanners["licenses"].success,
        "scanner absent from the new run keeps its prior status"
    );
    assert_eq!(meta.profile, "quick");
    let age = Utc::now() - meta.last_scan.unwrap();
    assert!(age < Duration::minutes(1), "last_scan must be overwritten");
}

#[test]
fn list_stale_filters_fresh_repositories() {
    let store = TempDir::new().unwrap();
    seed_metadata(&store, "fresh-repo", 2, &[("secrets", true)]);
    seed_metadata(&store, "stale-repo", 26, &[("secrets", true)]);
    seed_metadata(&store, "old-repo", 24 * 40, &[("secrets", true)]);

    let stale = tracker(&store).list_stale().unwrap();
    let names: Vec<_> = stale.iter().map(|r| r.repository.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"stale-repo"));
    assert!(names.contains(&"old-repo"));

    let old = stale.iter().find(|r| r.repository == "old-repo").unwrap();
    assert_eq!(old.level, Level::Expired);
}
