//! Rendering of deltas, manifests and history for the terminal
//!
//! Thin by design: everything here formats data the engine already
//! produced. JSON output is the serde form of the same structures.

use anyhow::Result;

use crate::delta::Delta;
use crate::domain::{History, ScanManifest};
use crate::freshness::FreshnessReport;

/// Output format selector shared by the CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Table,
    Json,
    Summary,
}

pub fn render_delta(delta: &Delta, format: Format) -> Result<String> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(delta)?),
        Format::Summary => Ok(delta_summary(delta)),
        Format::Table => Ok(delta_table(delta)),
    }
}

fn delta_summary(delta: &Delta) -> String {
    let trend = match delta.new.len() as i64 - delta.fixed.len() as i64 {
        n if n > 0 => "degrading",
        0 => "stable",
        _ => "improving",
    };
    format!(
        "{} -> {}: {} new, {} fixed, {} moved, {} unchanged ({})",
        delta.baseline_scan_id,
        delta.compare_scan_id,
        delta.new.len(),
        delta.fixed.len(),
        delta.moved.len(),
        delta.unchanged,
        trend
    )
}

fn delta_table(delta: &Delta) -> String {
    let mut out = String::new();
    out.push_str(&delta_summary(delta));
    out.push('\n');

    if !delta.new.is_empty() {
        out.push_str(&format!("\nNew findings ({}):\n", delta.new.len()));
        for f in &delta.new {
            out.push_str(&format!(
                "  + [{:<8}] {:<24} {}  {}\n",
                f.severity.as_str(),
                f.rule_id,
                f.location(),
                f.message
            ));
        }
    }

    if !delta.fixed.is_empty() {
        out.push_str(&format!("\nFixed findings ({}):\n", delta.fixed.len()));
        for f in &delta.fixed {
            out.push_str(&format!(
                "  - [{:<8}] {:<24} {}  {}\n",
                f.severity.as_str(),
                f.rule_id,
                f.location(),
                f.message
            ));
        }
    }

    if !delta.moved.is_empty() {
        out.push_str(&format!("\nMoved findings ({}):\n", delta.moved.len()));
        for m in &delta.moved {
            out.push_str(&format!(
                "  ~ [{:<8}] {:<24} {} -> {} ({:+} lines)\n",
                m.to.severity.as_str(),
                m.to.rule_id,
                m.from.location(),
                m.to.location(),
                m.line_shift
            ));
        }
    }

    if delta.is_clean() {
        out.push_str("\nNo changes between scans.\n");
    }
    out
}

pub fn render_manifest(manifest: &ScanManifest) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Scan {} ({} @ {})\n",
        manifest.scan_id, manifest.profile, manifest.commit
    ));
    for (name, entry) in &manifest.scanners {
        let detail = entry
            .summary
            .as_deref()
            .or(entry.error.as_deref())
            .unwrap_or("");
        out.push_str(&format!(
            "  {:<20} {:<9} {:>7}ms  {}\n",
            name,
            entry.status.as_str(),
            entry.duration_ms,
            detail
        ));
    }
    out.push_str(&format!(
        "Result: {}\n",
        if manifest.success { "success" } else { "failed" }
    ));
    out
}

pub fn render_history(history: &History, limit: usize) -> String {
    if history.scans.is_empty() {
        return "No scans recorded.\n".to_string();
    }

    let mut out = format!(
        "{} scans (first {}, last {})\n\n",
        history.total_scans,
        history
            .first_scan_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        history
            .last_scan_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    );
    out.push_str(&format!(
        "  {:<26} {:<10} {:<10} {:<9} {:>9}  findings\n",
        "scan id", "commit", "profile", "status", "duration"
    ));

    for record in history.scans.iter().rev().take(limit) {
        out.push_str(&format!(
            "  {:<26} {:<10} {:<10} {:<9} {:>8}s  {} total ({} critical, {} high)\n",
            record.scan_id,
            record.commit_short,
            record.profile,
            record.status.as_str(),
            record.duration_seconds,
            record.findings_summary.total,
            record.findings_summary.critical,
            record.findings_summary.high,
        ));
    }
    out
}

pub fn render_freshness_reports(reports: &[FreshnessReport]) -> String {
    if reports.is_empty() {
        return "No tracked repositories.\n".to_string();
    }

    let mut out = format!(
        "  {:<32} {:<11} {:<18} {:<10} failed\n",
        "repository", "level", "last scan", "profile"
    );
    for r in reports {
        out.push_str(&format!(
            "  {:<32} {:<11} {:<18} {:<10} {}\n",
            r.repository,
            r.level.as_str(),
            r.age,
            r.profile,
            if r.failed_scanners.is_empty() {
                "-".to_string()
            } else {
                r.failed_scanners.join(",")
            }
        ));
    }
    out
}
