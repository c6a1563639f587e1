// Report rendering for a finished scan

use crate::error::ReportError;
use crate::finding::{Family, Finding, Technique};
use crate::headers::{HeaderReport, HeaderStatus};
use crate::scan::ScanOutcome;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const THIN_RULE: &str = "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
            ReportFormat::Csv => "csv",
        }
    }
}

/// Finding groups in report order.
pub const SECTIONS: &[(&str, &[Technique])] = &[
    ("XSS", &[Technique::Get, Technique::Post]),
    ("SQLi", &[Technique::Sqli]),
    ("CSRF", &[Technique::Csrf]),
    ("DOM-XSS", &[Technique::Dom]),
    ("AI", &[Technique::SqliAi, Technique::XssAi]),
];

fn section<'a>(outcome: &'a ScanOutcome, techniques: &[Technique]) -> Vec<&'a Finding> {
    outcome
        .findings
        .iter()
        .filter(|f| techniques.contains(&f.technique()))
        .collect()
}

pub fn render_report(outcome: &ScanOutcome, format: ReportFormat) -> Result<String, ReportError> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(outcome)),
        ReportFormat::Json => Ok(generate_json_report(outcome)?),
        ReportFormat::Markdown => Ok(generate_markdown_report(outcome)),
        ReportFormat::Csv => generate_csv_report(outcome),
    }
}

pub fn generate_text_report(outcome: &ScanOutcome) -> String {
    let manifest = &outcome.manifest;
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                     SCOUR WEB VULNERABILITY SCAN REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Scan ID:      {}\n", manifest.scan_id));
    report.push_str(&format!("Target:       {}\n", manifest.target_root));
    report.push_str(&format!(
        "Scan Time:    {} ~ {}\n",
        manifest.start_time.format("%Y-%m-%d %H:%M:%S"),
        manifest.end_time.format("%H:%M:%S")
    ));
    report.push_str(&format!("Pages Found:  {}\n", manifest.crawled_urls.len()));
    report.push_str(&format!("Pages Tested: {}\n", manifest.pages_scanned.len()));
    report.push_str(&format!("Findings:     {}\n\n", outcome.findings.len()));

    for (title, techniques) in SECTIONS {
        let items = section(outcome, techniques);
        if items.is_empty() {
            continue;
        }

        report.push_str(RULE);
        report.push_str(&format!("{} FINDINGS ({})\n", title, items.len()));
        report.push_str(RULE);
        report.push('\n');

        for (idx, finding) in items.iter().enumerate() {
            report.push_str(&format!("[{}] {}\n", idx + 1, finding.origin_page()));
            report.push_str(&format!("Technique:    {}\n", finding.technique()));
            report.push_str(&format!("Severity:     {}\n", finding.severity().as_str().to_uppercase()));
            report.push_str(&format!("Confidence:   {}\n", finding.confidence().as_str()));
            report.push_str(&format!("Tested URL:   {}\n", finding.tested_url()));
            report.push_str("Evidence:\n");
            report.push_str(&wrap_text(finding.payload_or_note(), 80, "  "));
            report.push('\n');
            report.push_str(THIN_RULE);
            report.push('\n');
        }
    }

    if outcome.findings.is_empty() {
        report.push_str("No vulnerabilities detected.\n\n");
    }

    report.push_str(RULE);
    report.push_str("SECURITY HEADERS\n");
    report.push_str(RULE);
    report.push('\n');

    for header_report in &outcome.header_reports {
        report.push_str(&format!("URL: {}\n", header_report.url()));
        match header_report {
            HeaderReport::Failed { error, .. } => {
                report.push_str(&format!("  Error: {}\n", error));
            }
            HeaderReport::Checked { results, .. } => {
                for result in results {
                    report.push_str(&format!(
                        "  • {}: status={} / actual={}\n",
                        result.name,
                        result.status.as_str(),
                        result.actual.as_deref().unwrap_or("none")
                    ));
                    if result.status != HeaderStatus::Ok {
                        report.push_str(&wrap_text(&result.remediation, 80, "      → "));
                    }
                }
            }
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                          End of Report\n");
    report.push_str(RULE);
    report.push_str("\nFor authorized security testing only.\n\n");

    report
}

pub fn generate_json_report(outcome: &ScanOutcome) -> Result<String, serde_json::Error> {
    let breakdown: serde_json::Map<String, serde_json::Value> = Technique::ALL
        .iter()
        .map(|t| {
            (
                t.as_str().to_string(),
                serde_json::json!(outcome.with_technique(*t).count()),
            )
        })
        .collect();

    let families: serde_json::Map<String, serde_json::Value> = Family::ALL
        .iter()
        .map(|f| {
            (
                f.as_str().to_string(),
                serde_json::json!(outcome.in_family(*f).count()),
            )
        })
        .collect();

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "scour",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Local::now().to_rfc3339(),
                "format": "json",
                "disclaimer": "For authorized security testing only"
            },
            "manifest": outcome.manifest,
            "summary": {
                "total_findings": outcome.findings.len(),
                "technique_breakdown": breakdown,
                "family_breakdown": families,
                "header_reports": outcome.header_reports.len(),
                "failed_probes": outcome.probe_failures.len()
            },
            "findings": outcome.findings,
            "header_reports": outcome.header_reports,
            "probe_failures": outcome.probe_failures
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_markdown_report(outcome: &ScanOutcome) -> String {
    let manifest = &outcome.manifest;
    let mut report = String::new();

    report.push_str("# Scour Scan Report\n\n");
    report.push_str(&format!("- **Scan ID:** `{}`\n", manifest.scan_id));
    report.push_str(&format!("- **Target:** {}\n", manifest.target_root));
    report.push_str(&format!(
        "- **Started:** {}\n",
        manifest.start_time.format("%Y-%m-%d %H:%M:%S")
    ));
    report.push_str(&format!(
        "- **Finished:** {}\n",
        manifest.end_time.format("%Y-%m-%d %H:%M:%S")
    ));
    report.push_str(&format!("- **Pages crawled:** {}\n", manifest.crawled_urls.len()));
    report.push_str(&format!("- **Findings:** {}\n\n", outcome.findings.len()));

    for (title, techniques) in SECTIONS {
        let items = section(outcome, techniques);
        if items.is_empty() {
            continue;
        }
        report.push_str(&format!("## {}\n\n", title));
        report.push_str("| # | Technique | Origin | Tested URL | Evidence |\n");
        report.push_str("|---|---|---|---|---|\n");
        for (idx, finding) in items.iter().enumerate() {
            report.push_str(&format!(
                "| {} | {} | {} | {} | `{}` |\n",
                idx + 1,
                finding.technique(),
                md_cell(finding.origin_page()),
                md_cell(finding.tested_url()),
                md_cell(finding.payload_or_note())
            ));
        }
        report.push('\n');
    }

    report.push_str("## Security Headers\n\n");
    for header_report in &outcome.header_reports {
        report.push_str(&format!("### {}\n\n", header_report.url()));
        match header_report {
            HeaderReport::Failed { error, .. } => {
                report.push_str(&format!("Error: {}\n\n", md_cell(error)));
            }
            HeaderReport::Checked { results, .. } => {
                report.push_str("| Header | Status | Actual | Remediation |\n");
                report.push_str("|---|---|---|---|\n");
                for result in results {
                    let remediation = if result.status == HeaderStatus::Ok {
                        ""
                    } else {
                        result.remediation.as_str()
                    };
                    report.push_str(&format!(
                        "| {} | {} | {} | {} |\n",
                        result.name,
                        result.status.as_str(),
                        md_cell(result.actual.as_deref().unwrap_or("-")),
                        md_cell(remediation)
                    ));
                }
                report.push('\n');
            }
        }
    }

    report
}

pub fn generate_csv_report(outcome: &ScanOutcome) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "origin_page",
        "tested_url",
        "technique",
        "evidence",
        "severity",
        "confidence",
    ])?;

    for finding in &outcome.findings {
        wtr.write_record([
            finding.origin_page(),
            finding.tested_url(),
            finding.technique().as_str(),
            finding.payload_or_note(),
            finding.severity().as_str(),
            finding.confidence().as_str(),
        ])?;
    }

    let data = wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(data)?)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn md_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > width - indent.chars().count()
            && !current_line.is_empty()
        {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}
