// Per-probe outcomes. A probe is one request plus one oracle evaluation.

use crate::finding::Finding;
use scour_scanner::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    GetXss,
    FormXss,
    Sqli,
    Csrf,
    SqliModel,
    XssModel,
    DomXss,
}

impl Detector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Detector::GetXss => "get_xss",
            Detector::FormXss => "form_xss",
            Detector::Sqli => "sqli",
            Detector::Csrf => "csrf",
            Detector::SqliModel => "sqli_model",
            Detector::XssModel => "xss_model",
            Detector::DomXss => "dom_xss",
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A probe that could not be evaluated. Counted as "no hit" but kept for the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub detector: Detector,
    pub url: String,
    pub reason: String,
}

impl ProbeFailure {
    pub fn new(detector: Detector, url: &str, error: &ScanError) -> Self {
        Self {
            detector,
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum Probe {
    Hit(Finding),
    Miss,
    Failed(ProbeFailure),
}

/// Findings and failures accumulated by one detector run.
#[derive(Debug, Default)]
pub struct Detection {
    pub findings: Vec<Finding>,
    pub failures: Vec<ProbeFailure>,
}

impl Detection {
    /// Record a probe outcome; returns whether it was a hit.
    pub fn record(&mut self, probe: Probe) -> bool {
        match probe {
            Probe::Hit(finding) => {
                self.findings.push(finding);
                true
            }
            Probe::Miss => false,
            Probe::Failed(failure) => {
                debug!(
                    "[{}] probe failed for {}: {}",
                    failure.detector, failure.url, failure.reason
                );
                self.failures.push(failure);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sorts_outcomes() {
        let mut detection = Detection::default();

        assert!(detection.record(Probe::Hit(Finding::dom("http://t/", "<x>"))));
        assert!(!detection.record(Probe::Miss));
        assert!(!detection.record(Probe::Failed(ProbeFailure {
            detector: Detector::Sqli,
            url: "http://t/?a=1".into(),
            reason: "timed out".into(),
        })));

        assert_eq!(detection.findings.len(), 1);
        assert_eq!(detection.failures.len(), 1);
        assert_eq!(detection.failures[0].detector, Detector::Sqli);
    }
}
