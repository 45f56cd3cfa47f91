//! Diff command - compare findings between two historical scans

use anyhow::{bail, Result};
use std::path::Path;

use vigil::config::Config;
use vigil::delta::{diff_scans, DeltaOptions};
use vigil::domain::Severity;
use vigil::history::HistoryStore;
use vigil::output::{render_delta, Format};
use vigil::storage::StorePaths;

#[allow(clippy::too_many_arguments)]
pub async fn diff_command(
    work_dir: &Path,
    repo: &str,
    baseline: Option<String>,
    compare: Option<String>,
    scanner: Option<String>,
    severity: Option<String>,
    fuzzy: bool,
    tolerance: i64,
    new_only: bool,
    fixed_only: bool,
    format: Format,
) -> Result<i32> {
    let config = Config::from_dir(work_dir)?;
    let store = StorePaths::default_home()?;
    let history = HistoryStore::new(store, config.settings.max_scans);

    let severity = match severity {
        Some(s) => Some(
            Severity::parse(&s)
                .ok_or_else(|| anyhow::anyhow!("unknown severity '{}'", s))?,
        ),
        None => None,
    };
    if new_only && fixed_only {
        bail!("--new-only and --fixed-only are mutually exclusive");
    }

    let options = DeltaOptions {
        fuzzy,
        line_tolerance: tolerance,
        scanner,
        severity,
        new_only,
        fixed_only,
    };

    let baseline_ref = baseline.unwrap_or_else(|| "latest~1".to_string());
    let compare_ref = compare.unwrap_or_else(|| "latest".to_string());

    let delta = diff_scans(&history, repo, &baseline_ref, &compare_ref, &options)?;
    print!("{}", render_delta(&delta, format)?);

    Ok(0)
}
