//! Per-repository storage layout and JSON persistence helpers
//!
//! Everything vigil persists lives under one home directory (default
//! `~/.vigil`):
//!
//! ```text
//! ~/.vigil/repos/<repo-id>/
//!   manifest.json               current scan manifest, overwritten each run
//!   freshness.json              freshness metadata, overwritten each run
//!   history.json                ordered scan records + commit index
//!   analysis/<scanner>.json     current per-scanner artifacts
//!   history/scans/<scan-id>/    archived artifacts per completed scan
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, VigilError};

/// Resolves the on-disk layout for repositories tracked by vigil
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default store under the user's home directory (`~/.vigil`),
    /// overridable via `VIGIL_HOME`.
    pub fn default_home() -> Result<Self> {
        if let Ok(home) = std::env::var("VIGIL_HOME") {
            return Ok(Self::new(home));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| VigilError::Config("cannot determine home directory".to_string()))?;
        Ok(Self::new(home.join(".vigil")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.root.join("repos")
    }

    pub fn repo_dir(&self, project_id: &str) -> PathBuf {
        self.repos_dir().join(sanitize_id(project_id))
    }

    pub fn manifest_path(&self, project_id: &str) -> PathBuf {
        self.repo_dir(project_id).join("manifest.json")
    }

    pub fn freshness_path(&self, project_id: &str) -> PathBuf {
        self.repo_dir(project_id).join("freshness.json")
    }

    pub fn history_path(&self, project_id: &str) -> PathBuf {
        self.repo_dir(project_id).join("history.json")
    }

    /// Directory holding the current run's per-scanner artifacts
    pub fn analysis_dir(&self, project_id: &str) -> PathBuf {
        self.repo_dir(project_id).join("analysis")
    }

    pub fn scans_dir(&self, project_id: &str) -> PathBuf {
        self.repo_dir(project_id).join("history").join("scans")
    }

    /// Archived artifact directory for one completed scan
    pub fn scan_dir(&self, project_id: &str, scan_id: &str) -> PathBuf {
        self.scans_dir(project_id).join(scan_id)
    }

    /// Enumerate tracked repository directory names.
    ///
    /// A missing repos directory is an empty store, not an error.
    pub fn list_repos(&self) -> Result<Vec<String>> {
        let repos = self.repos_dir();
        let entries = match fs::read_dir(&repos) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Map a project id ("owner/repo" or a path) to a flat directory name
pub fn sanitize_id(project_id: &str) -> String {
    project_id
        .trim_matches('/')
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => "__".to_string(),
            c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => c.to_string(),
            _ => "-".to_string(),
        })
        .collect()
}

/// Read and deserialize a JSON file. Missing file yields `None`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = serde_json::from_str(&data).map_err(|source| VigilError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(value))
}

/// Serialize and write a JSON file via temp-file-then-rename, creating
/// parent directories as needed. The rename keeps partially written state
/// from ever being visible, so an interrupted run cannot corrupt a file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(value).map_err(|source| VigilError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Copy every `*.json` artifact from `src` into `dst`
pub fn copy_json_artifacts(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    let entries = match fs::read_dir(src) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "json") {
            let name = entry.file_name();
            fs::copy(&path, dst.join(name))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_flattens_owner_repo() {
        assert_eq!(sanitize_id("acme/widgets"), "acme__widgets");
        assert_eq!(sanitize_id("/srv/code/app"), "srv__code__app");
        assert_eq!(sanitize_id("plain-name_1.0"), "plain-name_1.0");
    }

    #[test]
    fn read_json_missing_file_is_none() {
        let result: Option<serde_json::Value> =
            read_json(Path::new("/tmp/vigil-definitely-missing.json")).unwrap();
        assert!(result.is_none());
    }
}
