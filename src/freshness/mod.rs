//! Freshness tracking - decides when a repository needs re-scanning
//!
//! Staleness is derived from the age of the last completed scan and the
//! per-scanner success flags recorded with it. The tracker is the gate in
//! front of the orchestrator: fresh data with a fully-successful profile
//! skips the run, anything else re-scans.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

use crate::config::{FreshnessSettings, Profile};
use crate::domain::{ScanManifest, ScannerStatus};
use crate::error::Result;
use crate::orchestrator::RepoTarget;
use crate::storage::{read_json, write_json, StorePaths};

/// Staleness level, ordered: data only ever gets staler with time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    Fresh,
    Stale,
    VeryStale,
    Expired,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Fresh => "fresh",
            Level::Stale => "stale",
            Level::VeryStale => "very-stale",
            Level::Expired => "expired",
        }
    }

    pub fn needs_refresh(&self) -> bool {
        *self != Level::Fresh
    }
}

/// Recorded outcome of one scanner's last run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerFreshness {
    pub success: bool,
    pub last_run: DateTime<Utc>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Per-repository freshness metadata (`freshness.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessMetadata {
    pub repository: String,
    /// Checkout path recorded so batch refresh can re-scan
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_commit: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub scanners: BTreeMap<String, ScannerFreshness>,
}

impl FreshnessMetadata {
    pub fn empty(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            path: PathBuf::new(),
            last_scan: None,
            last_commit: String::new(),
            profile: String::new(),
            scanners: BTreeMap::new(),
        }
    }

    /// Human-readable age of the last scan
    pub fn age_string(&self, now: DateTime<Utc>) -> String {
        let Some(last) = self.last_scan else {
            return "never".to_string();
        };
        let age = now - last;
        let hours = age.num_hours();
        if hours < 1 {
            return "less than an hour ago".to_string();
        }
        if hours < 24 {
            return pluralize(hours, "hour");
        }
        let days = age.num_days();
        if days < 7 {
            return pluralize(days, "day");
        }
        if days < 30 {
            return pluralize(days / 7, "week");
        }
        pluralize(days / 30, "month")
    }
}

fn pluralize(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// One repository's row in `list_all`/`list_stale`
#[derive(Debug, Clone, Serialize)]
pub struct FreshnessReport {
    pub repository: String,
    pub path: PathBuf,
    pub level: Level,
    pub last_scan: Option<DateTime<Utc>>,
    pub age: String,
    pub profile: String,
    pub scanners: usize,
    pub failed_scanners: Vec<String>,
}

pub struct FreshnessTracker {
    store: StorePaths,
    thresholds: FreshnessSettings,
}

impl FreshnessTracker {
    pub fn new(store: StorePaths, thresholds: FreshnessSettings) -> Self {
        Self { store, thresholds }
    }

    /// Staleness level for a last-scan timestamp at a given instant.
    /// No record at all is `Expired`.
    pub fn level_at(&self, last_scan: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Level {
        let Some(last) = last_scan else {
            return Level::Expired;
        };
        let age = now - last;
        if age < Duration::hours(self.thresholds.fresh_max_hours) {
            Level::Fresh
        } else if age < Duration::days(self.thresholds.stale_max_days) {
            Level::Stale
        } else if age < Duration::days(self.thresholds.very_stale_max_days) {
            Level::VeryStale
        } else {
            Level::Expired
        }
    }

    /// Load metadata for a repository; missing file means never scanned.
    pub fn load(&self, project_id: &str) -> Result<FreshnessMetadata> {
        let path = self.store.freshness_path(project_id);
        Ok(read_json(&path)?.unwrap_or_else(|| FreshnessMetadata::empty(project_id)))
    }

    /// Gate decision: `(run, reason)`.
    ///
    /// False only when the data is fresh AND every scanner in the requested
    /// profile was previously recorded successful. A forced trigger always
    /// runs.
    pub fn should_scan(
        &self,
        project_id: &str,
        profile: &Profile,
        force: bool,
    ) -> Result<(bool, String)> {
        if force {
            return Ok((true, "forced".to_string()));
        }

        let meta = self.load(project_id)?;
        let now = Utc::now();
        let level = self.level_at(meta.last_scan, now);

        if meta.last_scan.is_none() {
            return Ok((true, "never scanned".to_string()));
        }
        if level.needs_refresh() {
            return Ok((
                true,
                format!("data is {} ({})", level.as_str(), meta.age_string(now)),
            ));
        }

        for name in &profile.scanners {
            match meta.scanners.get(name) {
                Some(status) if status.success => {}
                Some(_) => {
                    return Ok((true, format!("scanner '{}' failed last run", name)));
                }
                None => {
                    return Ok((true, format!("scanner '{}' has never run", name)));
                }
            }
        }

        Ok((false, format!("data is fresh ({})", meta.age_string(now))))
    }

    /// Record a completed orchestrator run. The sole writer of
    /// `freshness.json`: overwrites `last_scan`, merges per-scanner flags
    /// (a scanner absent from this run keeps its prior recorded status).
    pub fn record_scan(&self, repo: &RepoTarget, manifest: &ScanManifest) -> Result<()> {
        let mut meta = self.load(&repo.project_id)?;
        meta.repository = repo.project_id.clone();
        meta.path = repo.path.clone();
        meta.last_scan = Some(manifest.completed_at.unwrap_or_else(Utc::now));
        meta.last_commit = repo.commit.clone();
        meta.profile = manifest.profile.clone();

        for (name, entry) in &manifest.scanners {
            let success = entry.status == ScannerStatus::Complete;
            meta.scanners.insert(
                name.clone(),
                ScannerFreshness {
                    success,
                    last_run: manifest.completed_at.unwrap_or_else(Utc::now),
                    duration_ms: entry.duration_ms,
                    last_error: entry.error.clone(),
                },
            );
        }

        write_json(&self.store.freshness_path(&repo.project_id), &meta)
    }

    /// Enumerate every tracked repository. Malformed or unreadable metadata
    /// is skipped with a warning; one broken file must not abort a batch
    /// listing.
    pub fn list_all(&self) -> Result<Vec<FreshnessReport>> {
        let now = Utc::now();
        let mut reports = Vec::new();

        for repo_dir in self.store.list_repos()? {
            let meta = match self.load(&repo_dir) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(repo = %repo_dir, error = %e, "skipping unreadable freshness metadata");
                    continue;
                }
            };
            // Directories without any recorded scan are not listed.
            if meta.last_scan.is_none() {
                continue;
            }
            let failed: Vec<String> = meta
                .scanners
                .iter()
                .filter(|(_, s)| !s.success)
                .map(|(name, _)| name.clone())
                .collect();
            reports.push(FreshnessReport {
                repository: meta.repository.clone(),
                path: meta.path.clone(),
                level: self.level_at(meta.last_scan, now),
                last_scan: meta.last_scan,
                age: meta.age_string(now),
                profile: meta.profile.clone(),
                scanners: meta.scanners.len(),
                failed_scanners: failed,
            });
        }

        // Most recently scanned first
        reports.sort_by(|a, b| b.last_scan.cmp(&a.last_scan));
        Ok(reports)
    }

    /// Repositories whose data needs refreshing
    pub fn list_stale(&self) -> Result<Vec<FreshnessReport>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|r| r.level.needs_refresh())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> FreshnessTracker {
        FreshnessTracker::new(
            StorePaths::new("/tmp/vigil-unused"),
            FreshnessSettings::default(),
        )
    }

    #[test]
    fn level_boundaries_advance_at_thresholds() {
        let t = tracker();
        let now = Utc::now();
        let at = |hours: i64| Some(now - Duration::hours(hours));

        assert_eq!(t.level_at(at(2), now), Level::Fresh);
        assert_eq!(t.level_at(at(23), now), Level::Fresh);
        assert_eq!(t.level_at(at(24), now), Level::Stale);
        assert_eq!(t.level_at(at(24 * 6), now), Level::Stale);
        assert_eq!(t.level_at(at(24 * 7), now), Level::VeryStale);
        assert_eq!(t.level_at(at(24 * 29), now), Level::VeryStale);
        assert_eq!(t.level_at(at(24 * 30), now), Level::Expired);
        assert_eq!(t.level_at(None, now), Level::Expired);
    }

    #[test]
    fn level_never_decreases_with_age() {
        let t = tracker();
        let now = Utc::now();
        let last = Some(now - Duration::hours(1));

        let mut previous = Level::Fresh;
        for days in 0..60 {
            let level = t.level_at(last, now + Duration::days(days));
            assert!(
                level >= previous,
                "staleness regressed from {:?} to {:?} at day {}",
                previous,
                level,
                days
            );
            previous = level;
        }
        assert_eq!(previous, Level::Expired);
    }

    #[test]
    fn age_string_is_humane() {
        let now = Utc::now();
        let mut meta = FreshnessMetadata::empty("r");
        assert_eq!(meta.age_string(now), "never");
        meta.last_scan = Some(now - Duration::hours(3));
        assert_eq!(meta.age_string(now), "3 hours ago");
        meta.last_scan = Some(now - Duration::days(1));
        assert_eq!(meta.age_string(now), "1 day ago");
        meta.last_scan = Some(now - Duration::days(14));
        assert_eq!(meta.age_string(now), "2 weeks ago");
    }
}
