//! Shared test helpers

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use vigil::config::{Profile, Settings};
use vigil::domain::{Finding, Severity};
use vigil::error::VigilError;
use vigil::scanner::{ScanContext, ScanOutput, Scanner};

/// What a fake scanner does when the orchestrator runs it
#[derive(Clone)]
pub enum Behavior {
    /// Sleep, then succeed with the given findings
    Succeed {
        delay: Duration,
        findings: Vec<Finding>,
    },
    /// Sleep, then fail
    Fail { delay: Duration },
    /// Panic inside the scanner task
    Panic,
    /// Sleep without ever finishing on time and ignore cancellation
    Hang { duration: Duration },
}

/// Start/finish timestamps recorded by fake scanners, for ordering checks
#[derive(Clone, Debug)]
pub struct RunSpan {
    pub scanner: String,
    pub started: Instant,
    pub finished: Instant,
}

pub type SpanLog = Arc<Mutex<Vec<RunSpan>>>;

pub fn span_log() -> SpanLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub struct FakeScanner {
    pub name: String,
    pub provides_sbom: bool,
    pub behavior: Behavior,
    pub log: Option<SpanLog>,
}

impl FakeScanner {
    pub fn quick(name: &str) -> Self {
        Self {
            name: name.to_string(),
            provides_sbom: false,
            behavior: Behavior::Succeed {
                delay: Duration::from_millis(10),
                findings: Vec::new(),
            },
            log: None,
        }
    }

    pub fn with_findings(name: &str, findings: Vec<Finding>) -> Self {
        Self {
            behavior: Behavior::Succeed {
                delay: Duration::from_millis(10),
                findings,
            },
            ..Self::quick(name)
        }
    }

    pub fn logged(mut self, log: &SpanLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "fake scanner for tests"
    }

    fn provides_sbom(&self) -> bool {
        self.provides_sbom
    }

    async fn run(&self, _ctx: &ScanContext) -> Result<ScanOutput, VigilError> {
        let started = Instant::now();
        let result = match &self.behavior {
            Behavior::Succeed { delay, findings } => {
                tokio::time::sleep(*delay).await;
                Ok(ScanOutput {
                    summary: format!("{} findings", findings.len()),
                    findings: findings.clone(),
                    metadata: serde_json::Value::Null,
                })
            }
            Behavior::Fail { delay } => {
                tokio::time::sleep(*delay).await;
                Err(VigilError::ScannerFailure {
                    scanner: self.name.clone(),
                    message: "synthetic failure".to_string(),
                })
            }
            Behavior::Panic => panic!("synthetic scanner panic"),
            Behavior::Hang { duration } => {
                tokio::time::sleep(*duration).await;
                Ok(ScanOutput::default())
            }
        };

        if let Some(log) = &self.log {
            log.lock().unwrap().push(RunSpan {
                scanner: self.name.clone(),
                started,
                finished: Instant::now(),
            });
        }
        result
    }
}

/// A finding with a computed fingerprint
pub fn finding(scanner: &str, rule: &str, file: &str, line: u64, message: &str) -> Finding {
    let mut f = Finding {
        scanner: scanner.to_string(),
        rule_id: rule.to_string(),
        severity: Severity::High,
        file: file.to_string(),
        line_start: line,
        line_end: line,
        message: message.to_string(),
        fingerprint: String::new(),
    };
    f.fingerprint = f.compute_fingerprint();
    f
}

pub fn profile(name: &str, scanners: &[&str]) -> Profile {
    Profile {
        name: name.to_string(),
        scanners: scanners.iter().map(|s| s.to_string()).collect(),
    }
}

/// Fast-failing settings so tests never wait on production timeouts
pub fn test_settings() -> Settings {
    Settings {
        timeout_seconds: 1,
        grace_seconds: 1,
        ..Settings::default()
    }
}

/// A temporary checkout the orchestrator can point at
pub fn fake_repo() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp repo");
    std::fs::write(dir.path().join("README.md"), "fixture").unwrap();
    dir
}
