//! Finding model - the atomic unit the delta computer diffs

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Severity levels for findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "critical" | "crit" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" | "med" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" | "informational" => Some(Severity::Info),
            _ => None,
        }
    }
}

/// One reported issue with a file/line location and a stable fingerprint.
///
/// Findings are opaque to the engine beyond these fields: scanners produce
/// them, the history store archives them, and the delta computer classifies
/// them as new/fixed/moved/unchanged between two scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Scanner that produced this finding (e.g., "secrets")
    pub scanner: String,

    /// Rule or check identifier within the scanner
    pub rule_id: String,

    pub severity: Severity,

    /// Repository-relative file path
    pub file: String,

    pub line_start: u64,

    pub line_end: u64,

    pub message: String,

    /// Stable content hash; see [`Finding::compute_fingerprint`]
    #[serde(default)]
    pub fingerprint: String,
}

impl Finding {
    /// Compute the stable fingerprint for this finding.
    ///
    /// Hashes (scanner, rule_id, normalized path, normalized snippet) so
    /// formatting noise does not change the fingerprint. Line numbers are
    /// deliberately excluded; small shifts are resolved by fuzzy matching
    /// instead. Fingerprints are only comparable within the same
    /// scanner + rule_id.
    pub fn compute_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.scanner.as_bytes());
        hasher.update(b"\x00");
        hasher.update(self.rule_id.as_bytes());
        hasher.update(b"\x00");
        hasher.update(normalize_path(&self.file).as_bytes());
        hasher.update(b"\x00");
        hasher.update(normalize_snippet(&self.message).as_bytes());
        let digest = hasher.finalize();
        hex_encode(&digest[..16])
    }

    /// Fill in the fingerprint if the scanner did not provide one.
    pub fn ensure_fingerprint(&mut self) {
        if self.fingerprint.is_empty() {
            self.fingerprint = self.compute_fingerprint();
        }
    }

    /// Grouping key used by the fuzzy matcher
    pub fn group_key(&self) -> (String, String, String) {
        (
            self.scanner.clone(),
            self.rule_id.clone(),
            normalize_path(&self.file),
        )
    }

    /// "file:line" location string for display
    pub fn location(&self) -> String {
        format!("{}:{}", self.file, self.line_start)
    }
}

/// Normalize a path for fingerprinting: forward slashes, no leading "./"
fn normalize_path(path: &str) -> String {
    let p = path.replace('\\', "/");
    p.strip_prefix("./").unwrap_or(&p).to_string()
}

/// Collapse all whitespace runs to a single space so reformatting does not
/// change the fingerprint.
fn normalize_snippet(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Per-scan aggregate of finding counts by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsSummary {
    #[serde(default)]
    pub critical: usize,
    #[serde(default)]
    pub high: usize,
    #[serde(default)]
    pub medium: usize,
    #[serde(default)]
    pub low: usize,
    #[serde(default)]
    pub info: usize,
    #[serde(default)]
    pub total: usize,
}

impl FindingsSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = FindingsSummary::default();
        for f in findings {
            match f.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
            summary.total += 1;
        }
        summary
    }

    pub fn merge(&mut self, other: &FindingsSummary) {
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.info += other.info;
        self.total += other.total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(message: &str) -> Finding {
        Finding {
            scanner: "secrets".to_string(),
            rule_id: "generic-api-key".to_string(),
            severity: Severity::High,
            file: "src/config.rs".to_string(),
            line_start: 10,
            line_end: 10,
            message: message.to_string(),
            fingerprint: String::new(),
        }
    }

    #[test]
    fn fingerprint_ignores_whitespace_noise() {
        let a = finding("api key  found in\tconfig").compute_fingerprint();
        let b = finding("api key found in config").compute_fingerprint();
        assert_eq!(a, b, "whitespace runs should not change the fingerprint");
    }

    #[test]
    fn fingerprint_ignores_line_numbers() {
        let mut a = finding("api key found");
        let mut b = finding("api key found");
        a.line_start = 10;
        b.line_start = 200;
        assert_eq!(a.compute_fingerprint(), b.compute_fingerprint());
    }

    #[test]
    fn fingerprint_differs_across_rules() {
        let a = finding("api key found");
        let mut b = finding("api key found");
        b.rule_id = "aws-access-key".to_string();
        assert_ne!(a.compute_fingerprint(), b.compute_fingerprint());
    }

    #[test]
    fn path_normalization_strips_dot_prefix() {
        let mut a = finding("x");
        let mut b = finding("x");
        a.file = "./src/config.rs".to_string();
        b.file = "src/config.rs".to_string();
        assert_eq!(a.compute_fingerprint(), b.compute_fingerprint());
    }

    #[test]
    fn summary_counts_by_severity() {
        let mut findings = vec![finding("a"), finding("b")];
        findings[1].severity = Severity::Low;
        let summary = FindingsSummary::from_findings(&findings);
        assert_eq!(summary.high, 1);
        assert_eq!(summary.low, 1);
        assert_eq!(summary.total, 2);
    }

    #[test]
    fn severity_parse_accepts_aliases() {
        assert_eq!(Severity::parse("CRIT"), Some(Severity::Critical));
        assert_eq!(Severity::parse("med"), Some(Severity::Medium));
        assert_eq!(Severity::parse("bogus"), None);
    }
}
