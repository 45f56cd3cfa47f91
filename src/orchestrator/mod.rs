//! Scan orchestrator
//!
//! Executes a resolved scanner set against a cloned repository in two
//! phases: the designated SBOM/dependency scanner first (synchronously, so
//! its artifact is available to the rest), then the remaining scanners on a
//! bounded worker pool sharing one queue. Each scanner gets a wall-clock
//! timeout; a failure, timeout or panic settles only that scanner's
//! manifest entry and never disturbs its siblings.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Profile, Settings};
use crate::domain::{
    FindingsSummary, ScanManifest, ScanRecord, ScannerEntry, ScannerStatus,
};
use crate::error::{Result, VigilError};
use crate::freshness::FreshnessTracker;
use crate::git::RepoInfo;
use crate::history::HistoryStore;
use crate::scanner::{ScanArtifact, ScanContext, ScanOutput, Scanner, ScannerRegistry};
use crate::storage::{write_json, StorePaths};

/// Progress callback invoked on every scanner status transition.
/// A side effect for live display; not part of the run result.
pub type ProgressSink = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub scanner: String,
    pub status: ScannerStatus,
    /// Scanners settled so far
    pub settled: usize,
    pub total: usize,
    /// Elapsed since the run started
    pub elapsed: Duration,
}

/// The repository a run targets. Must already be cloned.
#[derive(Debug, Clone)]
pub struct RepoTarget {
    pub project_id: String,
    pub path: PathBuf,
    pub commit: String,
    pub commit_short: String,
    pub branch: String,
}

impl RepoTarget {
    /// Build a target from a cloned checkout, detecting commit metadata.
    pub fn detect(project_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let info = RepoInfo::detect(&path);
        Self {
            project_id: project_id.into(),
            path,
            commit: info.commit,
            commit_short: info.commit_short,
            branch: info.branch,
        }
    }
}

/// What a completed (or interrupted) run hands back.
///
/// `persist_error` carries an I/O failure from the completion hook; the
/// in-memory manifest and record are still returned so the caller can
/// retry persistence.
#[derive(Debug)]
pub struct ScanOutcome {
    pub manifest: ScanManifest,
    pub record: ScanRecord,
    pub persist_error: Option<String>,
}

pub struct Orchestrator {
    registry: Arc<ScannerRegistry>,
    store: StorePaths,
    settings: Settings,
}

/// State shared between pool workers for one run
struct RunShared {
    manifest: Mutex<ScanManifest>,
    summary: Mutex<FindingsSummary>,
    settled: AtomicUsize,
    total: usize,
    started: Instant,
    output_dir: PathBuf,
    repo_path: PathBuf,
    sbom_path: Mutex<Option<PathBuf>>,
    timeout: Duration,
    grace: Duration,
    progress: Option<ProgressSink>,
    cancel: CancellationToken,
}

impl RunShared {
    fn update_entry(&self, name: &str, apply: impl FnOnce(&mut ScannerEntry)) {
        let mut manifest = self.manifest.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = manifest.scanners.get_mut(name) {
            apply(entry);
        }
    }

    fn emit(&self, name: &str, status: ScannerStatus) {
        if status.is_terminal() {
            self.settled.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(progress) = &self.progress {
            progress(&ProgressEvent {
                scanner: name.to_string(),
                status,
                settled: self.settled.load(Ordering::SeqCst),
                total: self.total,
                elapsed: self.started.elapsed(),
            });
        }
    }
}

impl Orchestrator {
    pub fn new(registry: Arc<ScannerRegistry>, store: StorePaths, settings: Settings) -> Self {
        Self {
            registry,
            store,
            settings,
        }
    }

    /// Run every scanner in `profile` against `repo`.
    ///
    /// Returns the outcome even when scanners failed or the run was
    /// cancelled; only pre-flight problems (missing repo, unknown scanner)
    /// are errors. On cancellation the partial manifest is finalized and
    /// persisted, never corrupted.
    pub async fn run(
        &self,
        repo: &RepoTarget,
        profile: &Profile,
        progress: Option<ProgressSink>,
        cancel: CancellationToken,
    ) -> Result<ScanOutcome> {
        if !repo.path.is_dir() {
            return Err(VigilError::RepoNotFound(repo.path.clone()));
        }
        let scanners = self.registry.resolve(&profile.scanners)?;

        let started_at = Utc::now();
        let scan_id = generate_scan_id(started_at, &repo.commit_short);
        let output_dir = self.store.analysis_dir(&repo.project_id);
        clear_artifacts(&output_dir)?;

        info!(
            project = %repo.project_id,
            profile = %profile.name,
            scan_id = %scan_id,
            scanners = scanners.len(),
            "starting scan"
        );

        let manifest = ScanManifest::new(
            &repo.project_id,
            &repo.commit,
            &repo.branch,
            &profile.name,
            &scan_id,
            &profile.scanners,
        );

        let shared = Arc::new(RunShared {
            manifest: Mutex::new(manifest),
            summary: Mutex::new(FindingsSummary::default()),
            settled: AtomicUsize::new(0),
            total: scanners.len(),
            started: Instant::now(),
            output_dir,
            repo_path: repo.path.clone(),
            sbom_path: Mutex::new(None),
            timeout: Duration::from_secs(self.settings.timeout_seconds),
            grace: Duration::from_secs(self.settings.grace_seconds),
            progress,
            cancel: cancel.clone(),
        });

        // Dependency phase: the SBOM provider runs alone, before the pool,
        // so its artifact path is fixed before any dependent starts. Its
        // failure is non-fatal; dependents fall back to their own inputs.
        let (sbom_scanners, parallel_scanners): (Vec<_>, Vec<_>) = scanners
            .into_iter()
            .partition(|s| s.provides_sbom());

        for scanner in sbom_scanners {
            if cancel.is_cancelled() {
                break;
            }
            run_one(scanner, Arc::clone(&shared)).await;
        }

        // Parallel phase: bounded worker pool over one shared FIFO queue.
        let queue: Arc<Mutex<VecDeque<Arc<dyn Scanner>>>> =
            Arc::new(Mutex::new(parallel_scanners.into_iter().collect()));
        let worker_count = {
            let len = queue.lock().unwrap_or_else(|e| e.into_inner()).len();
            len.min(self.settings.parallel.max(1))
        };

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let shared = Arc::clone(&shared);
            workers.push(tokio::spawn(async move {
                loop {
                    if shared.cancel.is_cancelled() {
                        debug!(worker_id, "cancelled; draining stopped");
                        break;
                    }
                    let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
                    let Some(scanner) = next else { break };
                    run_one(scanner, Arc::clone(&shared)).await;
                }
            }));
        }
        futures::future::join_all(workers).await;

        let mut manifest = shared
            .manifest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let summary = *shared.summary.lock().unwrap_or_else(|e| e.into_inner());
        manifest.finalize();

        info!(
            scan_id = %manifest.scan_id,
            success = manifest.success,
            settled = manifest.settled_count(),
            "scan finished"
        );

        // Completion hook: the single writer of manifest/history/freshness
        // for this repository. A cancelled run persists only the partial
        // manifest; it is not a completed scan, so history and freshness
        // stay untouched.
        let record = ScanRecord::from_manifest(&manifest, summary);
        let persist_result = if cancel.is_cancelled() {
            write_json(&self.store.manifest_path(&repo.project_id), &manifest)
        } else {
            self.persist(repo, &manifest, &record)
        };
        let persist_error = persist_result.err().map(|e| {
            warn!(error = %e, "failed to persist scan state");
            e.to_string()
        });

        Ok(ScanOutcome {
            manifest,
            record,
            persist_error,
        })
    }

    fn persist(
        &self,
        repo: &RepoTarget,
        manifest: &ScanManifest,
        record: &ScanRecord,
    ) -> Result<()> {
        write_json(&self.store.manifest_path(&repo.project_id), manifest)?;

        let history = HistoryStore::new(self.store.clone(), self.settings.max_scans);
        history.append(&repo.project_id, record.clone())?;
        history.archive_scan(&repo.project_id, &manifest.scan_id)?;

        let tracker = FreshnessTracker::new(self.store.clone(), self.settings.freshness);
        tracker.record_scan(repo, manifest)?;
        Ok(())
    }
}

/// Run a single scanner to a terminal manifest entry. Never returns an
/// error: every outcome, including panics and timeouts, is recorded on the
/// entry so the pool keeps draining.
async fn run_one(scanner: Arc<dyn Scanner>, shared: Arc<RunShared>) {
    let name = scanner.name().to_string();

    shared.update_entry(&name, |entry| entry.status = ScannerStatus::Running);
    shared.emit(&name, ScannerStatus::Running);

    let started = Instant::now();
    let ctx = ScanContext {
        repo_path: shared.repo_path.clone(),
        output_dir: shared.output_dir.clone(),
        sbom_path: shared
            .sbom_path
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone(),
        timeout: shared.timeout,
        cancel: shared.cancel.child_token(),
    };

    // The scanner runs in its own task so a panicking implementation is
    // isolated from the worker.
    let task_ctx = ctx.clone();
    let task_scanner = Arc::clone(&scanner);
    let mut task = tokio::spawn(async move { task_scanner.run(&task_ctx).await });

    let settled = tokio::select! {
        result = &mut task => Settled::from_join(result),
        _ = tokio::time::sleep(shared.timeout) => {
            // Timeout path: cancel the scanner's token (kills subprocess
            // groups), allow the grace period, then abandon the task. The
            // cancellation path below goes through the same termination.
            ctx.cancel.cancel();
            if tokio::time::timeout(shared.grace, &mut task).await.is_err() {
                task.abort();
            }
            Settled::Timeout
        }
        _ = shared.cancel.cancelled() => {
            if tokio::time::timeout(shared.grace, &mut task).await.is_err() {
                task.abort();
            }
            Settled::Cancelled
        }
    };
    let elapsed = started.elapsed();

    let status = match settled {
        Settled::Output(output) => {
            let artifact = ScanArtifact::new(&name, output, elapsed);
            let artifact_path = shared.output_dir.join(format!("{}.json", name));
            match write_json(&artifact_path, &artifact) {
                Ok(()) => {
                    shared
                        .summary
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .merge(&FindingsSummary::from_findings(&artifact.findings));
                    shared.update_entry(&name, |entry| {
                        entry.status = ScannerStatus::Complete;
                        entry.duration_ms = elapsed.as_millis() as u64;
                        entry.summary = Some(artifact.summary.clone());
                        entry.artifact = Some(artifact_path.clone());
                    });
                    ScannerStatus::Complete
                }
                Err(e) => {
                    warn!(scanner = %name, error = %e, "artifact write failed");
                    shared.update_entry(&name, |entry| {
                        entry.status = ScannerStatus::Failed;
                        entry.duration_ms = elapsed.as_millis() as u64;
                        entry.error = Some(format!("failed to write artifact: {}", e));
                    });
                    ScannerStatus::Failed
                }
            }
        }
        Settled::Timeout => {
            let seconds = shared.timeout.as_secs();
            warn!(scanner = %name, seconds, "scanner timed out");
            shared.update_entry(&name, |entry| {
                entry.status = ScannerStatus::Timeout;
                entry.duration_ms = elapsed.as_millis() as u64;
                entry.error = Some(format!("timed out after {}s", seconds));
            });
            ScannerStatus::Timeout
        }
        Settled::Cancelled => {
            shared.update_entry(&name, |entry| {
                entry.status = ScannerStatus::Failed;
                entry.duration_ms = elapsed.as_millis() as u64;
                entry.error = Some("cancelled".to_string());
            });
            ScannerStatus::Failed
        }
        Settled::Error(message) => {
            shared.update_entry(&name, |entry| {
                entry.status = ScannerStatus::Failed;
                entry.duration_ms = elapsed.as_millis() as u64;
                entry.error = Some(message);
            });
            ScannerStatus::Failed
        }
    };

    // First successful SBOM provider fixes the shared artifact path.
    if status == ScannerStatus::Complete && scanner.provides_sbom() {
        let artifact_path = shared.output_dir.join(format!("{}.json", name));
        let mut sbom = shared.sbom_path.lock().unwrap_or_else(|e| e.into_inner());
        if sbom.is_none() {
            *sbom = Some(artifact_path);
        }
    }

    shared.emit(&name, status);
}

/// How a scanner task settled
enum Settled {
    Output(ScanOutput),
    Error(String),
    Timeout,
    Cancelled,
}

impl Settled {
    fn from_join(
        result: std::result::Result<Result<ScanOutput>, tokio::task::JoinError>,
    ) -> Self {
        match result {
            Ok(Ok(output)) => Settled::Output(output),
            Ok(Err(VigilError::ScannerTimeout { .. })) => Settled::Timeout,
            Ok(Err(e)) => Settled::Error(e.to_string()),
            Err(join) if join.is_panic() => Settled::Error(format!("scanner panicked: {}", join)),
            Err(_) => Settled::Cancelled,
        }
    }
}

/// Scan ids are sortable by start time; the commit suffix makes them
/// recognizable, a uuid stands in when no commit is known.
fn generate_scan_id(started_at: DateTime<Utc>, commit_short: &str) -> String {
    let suffix = if commit_short.is_empty() || commit_short == "unknown" {
        uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
    } else {
        commit_short.to_string()
    };
    format!("{}-{}", started_at.format("%Y%m%d-%H%M%S"), suffix)
}

/// Drop stale `*.json` artifacts from a previous run so the archive of this
/// run never mixes scanner generations.
fn clear_artifacts(dir: &Path) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "json") {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}
