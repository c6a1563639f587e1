// Passive security header audit

use chrono::{DateTime, Local};
use reqwest::header::HeaderMap;
use scour_scanner::HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Header name, accepted substrings (any one suffices), remediation.
const CHECKLIST: &[(&str, &[&str], &str)] = &[
    (
        "Content-Security-Policy",
        &["default-src 'self'"],
        "Restrict resource origins with a Content-Security-Policy such as default-src 'self'.",
    ),
    (
        "X-Frame-Options",
        &["deny", "sameorigin"],
        "Prevent clickjacking with X-Frame-Options: DENY or SAMEORIGIN.",
    ),
    (
        "Strict-Transport-Security",
        &["max-age=63072000"],
        "Force HTTPS with Strict-Transport-Security: max-age=63072000.",
    ),
    (
        "X-Content-Type-Options",
        &["nosniff"],
        "Disable MIME sniffing with X-Content-Type-Options: nosniff.",
    ),
    (
        "Referrer-Policy",
        &["no-referrer", "strict-origin-when-cross-origin"],
        "Limit referrer leakage with Referrer-Policy: no-referrer or strict-origin-when-cross-origin.",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderStatus {
    Ok,
    Warning,
    Missing,
}

impl HeaderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderStatus::Ok => "ok",
            HeaderStatus::Warning => "warning",
            HeaderStatus::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderResult {
    pub name: String,
    pub status: HeaderStatus,
    /// Trimmed header value as served, if any
    pub actual: Option<String>,
    pub recommended: Vec<String>,
    pub remediation: String,
}

/// Header audit of one page. A failed fetch is kept apart from a clean result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum HeaderReport {
    Checked {
        url: String,
        checked_at: DateTime<Local>,
        results: Vec<HeaderResult>,
    },
    Failed {
        url: String,
        checked_at: DateTime<Local>,
        error: String,
    },
}

impl HeaderReport {
    pub fn url(&self) -> &str {
        match self {
            HeaderReport::Checked { url, .. } | HeaderReport::Failed { url, .. } => url,
        }
    }

    pub fn checked_at(&self) -> DateTime<Local> {
        match self {
            HeaderReport::Checked { checked_at, .. } | HeaderReport::Failed { checked_at, .. } => {
                *checked_at
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, HeaderReport::Failed { .. })
    }

    /// Rows whose status is not `ok`. Empty for a failed report.
    pub fn problems(&self) -> impl Iterator<Item = &HeaderResult> {
        let results: &[HeaderResult] = match self {
            HeaderReport::Checked { results, .. } => results,
            HeaderReport::Failed { .. } => &[],
        };
        results.iter().filter(|r| r.status != HeaderStatus::Ok)
    }
}

/// Classify the checklist against a response's headers.
pub fn classify(headers: &HeaderMap) -> Vec<HeaderResult> {
    CHECKLIST
        .iter()
        .map(|(name, accepted, remediation)| {
            let actual = headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string());

            let status = match &actual {
                None => HeaderStatus::Missing,
                Some(value) => {
                    let value = value.to_lowercase();
                    if accepted.iter().any(|a| value.contains(a)) {
                        HeaderStatus::Ok
                    } else {
                        HeaderStatus::Warning
                    }
                }
            };

            HeaderResult {
                name: name.to_string(),
                status,
                actual,
                recommended: accepted.iter().map(|a| a.to_string()).collect(),
                remediation: remediation.to_string(),
            }
        })
        .collect()
}

pub struct HeaderAuditor {
    client: HttpClient,
}

impl HeaderAuditor {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub async fn check(&self, url: &str) -> HeaderReport {
        let checked_at = Local::now();

        match self.client.get(url).await {
            Ok(response) => {
                let results = classify(&response.headers);
                let problems = results
                    .iter()
                    .filter(|r| r.status != HeaderStatus::Ok)
                    .count();
                if problems > 0 {
                    info!("[Headers] {}: {} header(s) need attention", url, problems);
                }
                HeaderReport::Checked {
                    url: url.to_string(),
                    checked_at,
                    results,
                }
            }
            Err(e) => {
                debug!("[Headers] fetch failed for {}: {}", url, e);
                HeaderReport::Failed {
                    url: url.to_string(),
                    checked_at,
                    error: e.to_string(),
                }
            }
        }
    }
}
