//! Command adapter: runs an external scanner tool as a subprocess
//!
//! This is the bridge between the scanner contract and out-of-scope scanner
//! implementations (semgrep, syft, gitleaks, ...). The adapter spawns the
//! configured command, collects its JSON output, and maps it onto
//! [`ScanOutput`]. Termination contract: the child runs in its own process
//! group, and the whole group is killed when the context's cancellation
//! token fires.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ScannerConfig;
use crate::domain::{Finding, Severity};
use crate::error::{Result, VigilError};

use super::{ScanContext, ScanOutput, Scanner};

pub struct CommandScanner {
    name: String,
    description: String,
    command: String,
    args: Vec<String>,
    provides_sbom: bool,
    depends_on_sbom: bool,
    slow: bool,
}

impl CommandScanner {
    pub fn from_config(name: &str, config: &ScannerConfig) -> Self {
        Self {
            name: name.to_string(),
            description: config.description.clone(),
            command: config.command.clone(),
            args: config.args.clone(),
            provides_sbom: config.provides_sbom,
            depends_on_sbom: config.depends_on_sbom,
            slow: config.slow,
        }
    }

    fn substituted_args(&self, ctx: &ScanContext) -> Vec<String> {
        let sbom = ctx
            .sbom_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{repo}", &ctx.repo_path.display().to_string())
                    .replace("{output}", &ctx.output_dir.display().to_string())
                    .replace("{sbom}", &sbom)
            })
            .collect()
    }

    fn failure(&self, message: impl Into<String>) -> VigilError {
        VigilError::ScannerFailure {
            scanner: self.name.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Scanner for CommandScanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn provides_sbom(&self) -> bool {
        self.provides_sbom
    }

    fn depends_on_sbom(&self) -> bool {
        self.depends_on_sbom
    }

    fn is_slow(&self) -> bool {
        self.slow
    }

    async fn run(&self, ctx: &ScanContext) -> Result<ScanOutput> {
        let args = self.substituted_args(ctx);
        debug!(scanner = %self.name, command = %self.command, "spawning scanner");

        let mut cmd = Command::new(&self.command);
        cmd.args(&args)
            .current_dir(&ctx.repo_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| self.failure(format!("failed to spawn {}: {}", self.command, e)))?;

        let pid = child.id();
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.failure("failed to capture stdout pipe"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| self.failure("failed to capture stderr pipe"))?;

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let status = tokio::select! {
            status = async {
                // Drain both pipes before wait() so a chatty tool cannot
                // deadlock on a full pipe buffer.
                let _ = tokio::join!(
                    stdout.read_to_end(&mut stdout_buf),
                    stderr.read_to_end(&mut stderr_buf),
                );
                child.wait().await
            } => status.map_err(|e| self.failure(format!("wait failed: {}", e)))?,
            _ = ctx.cancel.cancelled() => {
                kill_process_group(pid);
                let _ = child.kill().await;
                return Err(self.failure("terminated"));
            }
        };

        if !status.success() {
            let detail = String::from_utf8_lossy(&stderr_buf);
            let detail = detail.lines().last().unwrap_or("").trim();
            return Err(self.failure(format!(
                "exited with {}{}",
                status.code().map_or("signal".to_string(), |c| c.to_string()),
                if detail.is_empty() {
                    String::new()
                } else {
                    format!(": {}", detail)
                }
            )));
        }

        parse_tool_output(&self.name, &stdout_buf)
    }
}

/// Kill the scanner's whole process group so tool-spawned children die too
fn kill_process_group(pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

/// Loose finding shape accepted from external tools
#[derive(Debug, Deserialize)]
struct RawFinding {
    #[serde(default, alias = "id")]
    rule_id: String,
    #[serde(default)]
    severity: String,
    #[serde(default, alias = "path")]
    file: String,
    #[serde(default, alias = "line")]
    line_start: u64,
    #[serde(default)]
    line_end: u64,
    #[serde(default, alias = "title")]
    message: String,
    #[serde(default)]
    fingerprint: String,
}

#[derive(Debug, Deserialize)]
struct RawToolOutput {
    #[serde(default)]
    summary: Option<serde_json::Value>,
    #[serde(default)]
    findings: Vec<serde_json::Value>,
    #[serde(default)]
    metadata: serde_json::Value,
}

/// Map a tool's JSON stdout onto [`ScanOutput`].
///
/// Findings the tool emits in an unrecognized shape are dropped with a
/// warning rather than failing the scan; a scanner with no parseable JSON
/// at all is a scanner failure.
fn parse_tool_output(scanner: &str, stdout: &[u8]) -> Result<ScanOutput> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(ScanOutput {
            summary: "no output".to_string(),
            ..Default::default()
        });
    }

    let raw: RawToolOutput =
        serde_json::from_str(trimmed).map_err(|e| VigilError::ScannerFailure {
            scanner: scanner.to_string(),
            message: format!("unparseable output: {}", e),
        })?;

    let mut findings = Vec::with_capacity(raw.findings.len());
    let mut dropped = 0usize;
    for value in raw.findings {
        match serde_json::from_value::<RawFinding>(value) {
            Ok(f) => {
                let severity = Severity::parse(&f.severity).unwrap_or(Severity::Info);
                let line_end = if f.line_end == 0 { f.line_start } else { f.line_end };
                let mut finding = Finding {
                    scanner: scanner.to_string(),
                    rule_id: f.rule_id,
                    severity,
                    file: f.file,
                    line_start: f.line_start,
                    line_end,
                    message: f.message,
                    fingerprint: f.fingerprint,
                };
                finding.ensure_fingerprint();
                findings.push(finding);
            }
            Err(_) => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(scanner, dropped, "dropped findings with unrecognized shape");
    }

    let summary = match raw.summary {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => format!("{} findings", findings.len()),
    };

    Ok(ScanOutput {
        summary,
        findings,
        metadata: raw.metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_findings_and_summary() {
        let stdout = br#"{
            "summary": "2 findings",
            "findings": [
                {"rule_id": "r1", "severity": "high", "file": "a.rs", "line_start": 3, "message": "bad"},
                {"id": "r2", "severity": "bogus", "path": "b.rs", "line": 9, "title": "worse"}
            ]
        }"#;
        let output = parse_tool_output("secrets", stdout).unwrap();
        assert_eq!(output.summary, "2 findings");
        assert_eq!(output.findings.len(), 2);
        assert_eq!(output.findings[0].severity, Severity::High);
        // alias fields and unknown severity fall back sensibly
        assert_eq!(output.findings[1].rule_id, "r2");
        assert_eq!(output.findings[1].file, "b.rs");
        assert_eq!(output.findings[1].line_start, 9);
        assert_eq!(output.findings[1].line_end, 9);
        assert_eq!(output.findings[1].severity, Severity::Info);
        assert!(!output.findings[1].fingerprint.is_empty());
    }

    #[test]
    fn empty_output_is_not_a_failure() {
        let output = parse_tool_output("sbom", b"  ").unwrap();
        assert_eq!(output.summary, "no output");
        assert!(output.findings.is_empty());
    }

    #[test]
    fn garbage_output_is_a_scanner_failure() {
        let err = parse_tool_output("sbom", b"not json").unwrap_err();
        assert!(matches!(err, VigilError::ScannerFailure { .. }));
    }
}
