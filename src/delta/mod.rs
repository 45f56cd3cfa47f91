//! Delta computation - classify findings between two scans
//!
//! Classification is a partition: every baseline finding ends up exactly
//! one of fixed / moved / unchanged, every compare finding exactly one of
//! new / moved / unchanged. Matching runs in two passes - exact fingerprint
//! equality, then fuzzy line-proximity within (scanner, rule, file) groups.
//! Output filters are applied only after classification, so filtered-out
//! findings can never distort how the others classify.

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::{Finding, Severity};
use crate::error::{Result, VigilError};
use crate::history::HistoryStore;

/// Options for a delta computation
#[derive(Debug, Clone)]
pub struct DeltaOptions {
    /// Fuzzy line-proximity matching for findings whose fingerprint changed
    pub fuzzy: bool,

    /// Maximum |line shift| the fuzzy pass accepts
    pub line_tolerance: i64,

    /// Restrict output to one scanner
    pub scanner: Option<String>,

    /// Restrict output to one severity
    pub severity: Option<Severity>,

    pub new_only: bool,
    pub fixed_only: bool,
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self {
            fuzzy: true,
            line_tolerance: 5,
            scanner: None,
            severity: None,
            new_only: false,
            fixed_only: false,
        }
    }
}

/// A finding that moved between scans
#[derive(Debug, Clone, Serialize)]
pub struct MovedFinding {
    pub from: Finding,
    pub to: Finding,
    pub line_shift: i64,
}

/// Classification of findings between two scans
#[derive(Debug, Clone, Serialize)]
pub struct Delta {
    pub baseline_scan_id: String,
    pub compare_scan_id: String,
    pub new: Vec<Finding>,
    pub fixed: Vec<Finding>,
    pub moved: Vec<MovedFinding>,
    pub unchanged: usize,
}

impl Delta {
    fn empty(baseline_scan_id: &str, compare_scan_id: &str, unchanged: usize) -> Self {
        Self {
            baseline_scan_id: baseline_scan_id.to_string(),
            compare_scan_id: compare_scan_id.to_string(),
            new: Vec::new(),
            fixed: Vec::new(),
            moved: Vec::new(),
            unchanged,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.new.is_empty() && self.fixed.is_empty() && self.moved.is_empty()
    }
}

/// Resolve two scan refs against history and diff their archived findings.
pub fn diff_scans(
    history: &HistoryStore,
    project_id: &str,
    baseline_ref: &str,
    compare_ref: &str,
    options: &DeltaOptions,
) -> Result<Delta> {
    let record_count = history.load(project_id)?.total_scans;
    if record_count < 2 {
        return Err(VigilError::HistoryNotFound(format!(
            "need at least 2 scans to diff, {} has {}",
            project_id, record_count
        )));
    }

    let baseline = history.resolve_ref(project_id, baseline_ref)?;
    let compare = history.resolve_ref(project_id, compare_ref)?;

    // Same resolved scan: a real CLI misuse (e.g. `diff repo latest latest`);
    // short-circuit instead of reporting a trivially empty diff as data.
    if baseline.scan_id == compare.scan_id {
        let findings = history.load_findings(project_id, &baseline.scan_id)?;
        return Ok(Delta::empty(
            &baseline.scan_id,
            &compare.scan_id,
            findings.len(),
        ));
    }

    let baseline_findings = history.load_findings(project_id, &baseline.scan_id)?;
    let compare_findings = history.load_findings(project_id, &compare.scan_id)?;

    Ok(compute_delta(
        &baseline.scan_id,
        &compare.scan_id,
        baseline_findings,
        compare_findings,
        options,
    ))
}

/// Pure classification of two finding sets. Identical inputs always yield
/// identical output.
pub fn compute_delta(
    baseline_scan_id: &str,
    compare_scan_id: &str,
    baseline: Vec<Finding>,
    compare: Vec<Finding>,
    options: &DeltaOptions,
) -> Delta {
    let mut baseline_matched = vec![false; baseline.len()];
    let mut compare_matched = vec![false; compare.len()];
    let mut unchanged = 0usize;

    // Pass 1 - exact: bucket baseline findings by fingerprint, consume one
    // bucket slot per matching compare finding.
    let mut by_fingerprint: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, f) in baseline.iter().enumerate() {
        if !f.fingerprint.is_empty() {
            by_fingerprint.entry(&f.fingerprint).or_default().push(i);
        }
    }
    for (j, f) in compare.iter().enumerate() {
        if f.fingerprint.is_empty() {
            continue;
        }
        if let Some(slots) = by_fingerprint.get_mut(f.fingerprint.as_str()) {
            if let Some(i) = slots.pop() {
                baseline_matched[i] = true;
                compare_matched[j] = true;
                unchanged += 1;
            }
        }
    }

    // Pass 2 - fuzzy: remaining findings grouped by (scanner, rule, file);
    // each baseline finding, in ascending line order, takes the nearest
    // unclaimed compare finding within tolerance.
    let mut moved = Vec::new();
    if options.fuzzy && options.line_tolerance >= 0 {
        let mut compare_groups: HashMap<(String, String, String), Vec<usize>> = HashMap::new();
        for (j, f) in compare.iter().enumerate() {
            if !compare_matched[j] {
                compare_groups.entry(f.group_key()).or_default().push(j);
            }
        }

        let mut baseline_pending: Vec<usize> = (0..baseline.len())
            .filter(|&i| !baseline_matched[i])
            .collect();
        baseline_pending.sort_by_key(|&i| (baseline[i].line_start, i));

        for i in baseline_pending {
            let Some(candidates) = compare_groups.get_mut(&baseline[i].group_key()) else {
                continue;
            };

            let best = candidates
                .iter()
                .copied()
                .filter(|&j| !compare_matched[j])
                .map(|j| {
                    let shift =
                        compare[j].line_start as i64 - baseline[i].line_start as i64;
                    (j, shift)
                })
                .filter(|(_, shift)| shift.abs() <= options.line_tolerance)
                .min_by_key(|&(j, shift)| {
                    // Nearest first; ties prefer an identical message, then
                    // the smallest compare line.
                    let same_message = compare[j].message == baseline[i].message;
                    (shift.abs(), !same_message, compare[j].line_start)
                });

            if let Some((j, shift)) = best {
                baseline_matched[i] = true;
                compare_matched[j] = true;
                moved.push(MovedFinding {
                    from: baseline[i].clone(),
                    to: compare[j].clone(),
                    line_shift: shift,
                });
            }
        }
    }

    // Remainder: unmatched baseline findings were fixed, unmatched compare
    // findings are new.
    let fixed: Vec<Finding> = baseline
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !baseline_matched[*i])
        .map(|(_, f)| f)
        .collect();
    let new: Vec<Finding> = compare
        .into_iter()
        .enumerate()
        .filter(|(j, _)| !compare_matched[*j])
        .map(|(_, f)| f)
        .collect();

    let mut delta = Delta {
        baseline_scan_id: baseline_scan_id.to_string(),
        compare_scan_id: compare_scan_id.to_string(),
        new,
        fixed,
        moved,
        unchanged,
    };
    apply_filters(&mut delta, options);
    delta
}

/// Output-side filters. Classification above is complete by the time these
/// run, so an excluded finding cannot change another's class.
fn apply_filters(delta: &mut Delta, options: &DeltaOptions) {
    if let Some(scanner) = &options.scanner {
        delta.new.retain(|f| &f.scanner == scanner);
        delta.fixed.retain(|f| &f.scanner == scanner);
        delta.moved.retain(|m| &m.to.scanner == scanner);
    }
    if let Some(severity) = options.severity {
        delta.new.retain(|f| f.severity == severity);
        delta.fixed.retain(|f| f.severity == severity);
        delta.moved.retain(|m| m.to.severity == severity);
    }
    if options.new_only {
        delta.fixed.clear();
        delta.moved.clear();
    }
    if options.fixed_only {
        delta.new.clear();
        delta.moved.clear();
    }
}
