//! Refresh command - batch re-scan of stale repositories

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use vigil::config::Config;
use vigil::freshness::{FreshnessReport, FreshnessTracker};
use vigil::orchestrator::{Orchestrator, RepoTarget};
use vigil::output::render_freshness_reports;
use vigil::scanner::ScannerRegistry;
use vigil::storage::StorePaths;

/// Re-scan tracked repositories whose data is no longer fresh.
///
/// Continues past individual failures; prints a refreshed/failed/skipped
/// tally at the end. Concurrent orchestration of different repositories is
/// the expected mode here - state files are per-repository, so parallel
/// runs never contend.
pub async fn refresh_command(
    work_dir: &Path,
    repo: Option<String>,
    force: bool,
    all: bool,
    parallel: usize,
) -> Result<i32> {
    let config = Config::from_dir(work_dir)?;
    let store = StorePaths::default_home()?;
    let registry = Arc::new(ScannerRegistry::from_config(&config));
    let tracker = FreshnessTracker::new(store.clone(), config.settings.freshness);

    let reports: Vec<FreshnessReport> = match &repo {
        Some(name) => {
            let all_reports = tracker.list_all()?;
            let report = all_reports
                .into_iter()
                .find(|r| r.repository == *name)
                .ok_or_else(|| anyhow::anyhow!("repository '{}' is not tracked", name))?;
            vec![report]
        }
        None if all => tracker.list_all()?,
        None => tracker.list_stale()?,
    };

    if reports.is_empty() {
        println!("Nothing to refresh.");
        return Ok(0);
    }
    println!("Refreshing {} repositories:\n", reports.len());
    print!("{}", render_freshness_reports(&reports));
    println!();

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let semaphore = Arc::new(Semaphore::new(parallel.max(1)));
    let mut handles = Vec::new();

    for report in reports {
        let config = config.clone();
        let registry = Arc::clone(&registry);
        let store = store.clone();
        let tracker = FreshnessTracker::new(store.clone(), config.settings.freshness);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            if cancel.is_cancelled() {
                return RefreshResult::Skipped;
            }

            let profile_name = if report.profile.is_empty() {
                "default".to_string()
            } else {
                report.profile.clone()
            };
            let profile = match config.resolve_profile(&profile_name) {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(repo = %report.repository, error = %e, "cannot resolve profile");
                    return RefreshResult::Failed;
                }
            };

            match tracker.should_scan(&report.repository, &profile, force) {
                Ok((false, reason)) => {
                    println!("  {} skipped: {}", report.repository, reason);
                    return RefreshResult::Skipped;
                }
                Ok((true, _)) => {}
                Err(e) => {
                    warn!(repo = %report.repository, error = %e, "freshness check failed");
                }
            }

            let repo = RepoTarget::detect(report.repository.clone(), &report.path);
            if !repo.path.is_dir() {
                warn!(repo = %report.repository, path = %report.path.display(), "checkout missing");
                return RefreshResult::Failed;
            }

            let orchestrator = Orchestrator::new(registry, store, config.settings.clone());
            match orchestrator.run(&repo, &profile, None, cancel).await {
                Ok(outcome) if outcome.manifest.success && outcome.persist_error.is_none() => {
                    println!("  {} refreshed ({})", report.repository, outcome.manifest.scan_id);
                    RefreshResult::Refreshed
                }
                Ok(outcome) => {
                    println!(
                        "  {} completed with failures ({})",
                        report.repository, outcome.manifest.scan_id
                    );
                    RefreshResult::Failed
                }
                Err(e) => {
                    warn!(repo = %report.repository, error = %e, "refresh failed");
                    RefreshResult::Failed
                }
            }
        }));
    }

    let mut refreshed = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;
    for handle in handles {
        match handle.await {
            Ok(RefreshResult::Refreshed) => refreshed += 1,
            Ok(RefreshResult::Failed) => failed += 1,
            Ok(RefreshResult::Skipped) => skipped += 1,
            Err(e) => {
                warn!(error = %e, "refresh task aborted");
                failed += 1;
            }
        }
    }

    println!(
        "\nRefresh complete: {} refreshed, {} failed, {} skipped",
        refreshed, failed, skipped
    );

    if repo.is_some() && refreshed == 0 && failed > 0 {
        bail!("refresh failed");
    }
    Ok(if failed > 0 { 1 } else { 0 })
}

enum RefreshResult {
    Refreshed,
    Failed,
    Skipped,
}
