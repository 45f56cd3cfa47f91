//! Minimal git introspection for scan metadata
//!
//! Scans only need to stamp records with the commit they ran against; all
//! other source-control operations (cloning, fetching) are external.

use std::path::Path;
use std::process::Command;

/// Commit metadata captured at scan time
#[derive(Debug, Clone)]
pub struct RepoInfo {
    pub commit: String,
    pub commit_short: String,
    pub branch: String,
}

impl RepoInfo {
    /// Best-effort lookup of HEAD and the current branch.
    ///
    /// Repositories without a `.git` directory (exported tarballs, test
    /// fixtures) still scan; they record "unknown" commit metadata.
    pub fn detect(repo_path: &Path) -> Self {
        let commit = git_output(repo_path, &["rev-parse", "HEAD"])
            .unwrap_or_else(|| "unknown".to_string());
        let commit_short = if commit == "unknown" {
            commit.clone()
        } else {
            commit.chars().take(8).collect()
        };
        let branch = git_output(repo_path, &["rev-parse", "--abbrev-ref", "HEAD"])
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            commit,
            commit_short,
            branch,
        }
    }
}

fn git_output(repo_path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}
