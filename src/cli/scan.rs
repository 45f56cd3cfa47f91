//! Scan command implementation

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use vigil::config::Config;
use vigil::freshness::FreshnessTracker;
use vigil::orchestrator::{Orchestrator, ProgressEvent, ProgressSink, RepoTarget};
use vigil::output::render_manifest;
use vigil::scanner::ScannerRegistry;
use vigil::storage::StorePaths;

/// Run a profile's scanners against a cloned repository.
///
/// Exit code 0 on full success, 1 when any scanner failed or timed out.
pub async fn scan_command(
    work_dir: &Path,
    target: &str,
    profile_name: &str,
    force: bool,
    skip_slow: bool,
) -> Result<i32> {
    let config = Config::from_dir(work_dir)?;
    let store = StorePaths::default_home()?;
    let registry = Arc::new(ScannerRegistry::from_config(&config));

    let mut profile = config.resolve_profile(profile_name)?;
    if skip_slow {
        let slow: Vec<String> = registry
            .descriptors()
            .into_iter()
            .filter(|d| d.slow)
            .map(|d| d.name)
            .collect();
        profile.scanners.retain(|name| !slow.contains(name));
        if profile.scanners.is_empty() {
            bail!("profile '{}' has only slow scanners; nothing to run", profile_name);
        }
    }

    let repo_path = work_dir.join(target);
    let repo_path = repo_path
        .canonicalize()
        .with_context(|| format!("repository not found at {}", repo_path.display()))?;
    let project_id = repo_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| target.to_string());
    let repo = RepoTarget::detect(project_id, &repo_path);

    // Freshness gate: skip the run when the data is fresh and complete.
    let tracker = FreshnessTracker::new(store.clone(), config.settings.freshness);
    let (run, reason) = tracker.should_scan(&repo.project_id, &profile, force)?;
    if !run {
        println!("Skipping {}: {}", repo.project_id, reason);
        return Ok(0);
    }
    println!(
        "Scanning {} with profile '{}' ({})",
        repo.project_id, profile.name, reason
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted; terminating in-flight scanners...");
            signal_cancel.cancel();
        }
    });

    let progress: ProgressSink = Arc::new(|event: &ProgressEvent| {
        println!(
            "  [{}/{}] {:<20} {} ({:.1}s)",
            event.settled,
            event.total,
            event.scanner,
            event.status.as_str(),
            event.elapsed.as_secs_f64()
        );
    });

    let orchestrator = Orchestrator::new(registry, store, config.settings.clone());
    let outcome = orchestrator
        .run(&repo, &profile, Some(progress), cancel)
        .await?;

    println!();
    print!("{}", render_manifest(&outcome.manifest));

    if let Some(error) = &outcome.persist_error {
        eprintln!("Warning: scan state was not fully persisted: {}", error);
        return Ok(1);
    }

    Ok(if outcome.manifest.success { 0 } else { 1 })
}
