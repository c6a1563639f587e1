// Tests for report rendering

use chrono::Local;
use scour_core::finding::Finding;
use scour_core::headers::{HeaderReport, HeaderResult, HeaderStatus};
use scour_core::report::{ReportFormat, render_report, save_report};
use scour_core::scan::{ScanManifest, ScanOutcome};
use scour_core::Technique;
use tempfile::TempDir;
use uuid::Uuid;

fn create_outcome() -> ScanOutcome {
    let now = Local::now();
    ScanOutcome {
        manifest: ScanManifest {
            scan_id: Uuid::new_v4(),
            target_root: "http://shop.test/".to_string(),
            start_time: now,
            end_time: now,
            crawled_urls: vec!["http://shop.test/".to_string()],
            pages_scanned: vec!["http://shop.test/?test=x".to_string()],
        },
        findings: vec![
            Finding::sqli(
                "http://shop.test/item?id=1",
                "http://shop.test/item?id=%27",
                "'",
            ),
            Finding::reflected_get(
                "http://shop.test/?q=1",
                "http://shop.test/?q=x",
                "<script>alert(1)</script>",
            ),
            Finding::model_flag(
                "http://shop.test/?q=1",
                Technique::XssAi,
                "model flagged: q=1".to_string(),
            )
            .unwrap(),
            Finding::csrf(
                "http://shop.test/login",
                "http://shop.test/session",
                "missing CSRF token | cookie lacks Secure".to_string(),
            ),
        ],
        header_reports: vec![
            HeaderReport::Checked {
                url: "http://shop.test/".to_string(),
                checked_at: now,
                results: vec![
                    HeaderResult {
                        name: "X-Frame-Options".to_string(),
                        status: HeaderStatus::Ok,
                        actual: Some("DENY".to_string()),
                        recommended: vec!["deny".to_string(), "sameorigin".to_string()],
                        remediation: "Prevent clickjacking.".to_string(),
                    },
                    HeaderResult {
                        name: "Referrer-Policy".to_string(),
                        status: HeaderStatus::Missing,
                        actual: None,
                        recommended: vec!["no-referrer".to_string()],
                        remediation: "Limit referrer leakage.".to_string(),
                    },
                ],
            },
            HeaderReport::Failed {
                url: "http://shop.test/down".to_string(),
                checked_at: now,
                error: "timed out".to_string(),
            },
        ],
        probe_failures: Vec::new(),
    }
}

// ============================================================================
// Format Parsing
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("TEXT"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("json"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("md"), Some(ReportFormat::Markdown));
    assert_eq!(ReportFormat::from_str("csv"), Some(ReportFormat::Csv));
    assert_eq!(ReportFormat::from_str("pdf"), None);
}

// ============================================================================
// Text Report
// ============================================================================

#[test]
fn test_text_report_sections_in_order() {
    let report = render_report(&create_outcome(), ReportFormat::Text).unwrap();

    let xss = report.find("XSS FINDINGS (1)").unwrap();
    let sqli = report.find("SQLi FINDINGS (1)").unwrap();
    let csrf = report.find("CSRF FINDINGS (1)").unwrap();
    let ai = report.find("AI FINDINGS (1)").unwrap();
    let headers = report.find("SECURITY HEADERS").unwrap();
    assert!(xss < sqli && sqli < csrf && csrf < ai && ai < headers);
    assert!(!report.contains("DOM-XSS FINDINGS"));
}

#[test]
fn test_text_report_header_details() {
    let report = render_report(&create_outcome(), ReportFormat::Text).unwrap();

    assert!(report.contains("X-Frame-Options: status=ok / actual=DENY"));
    assert!(report.contains("Referrer-Policy: status=missing / actual=none"));
    assert!(report.contains("Limit referrer leakage."));
    // Remediation is only shown for rows that are not ok
    assert!(!report.contains("Prevent clickjacking."));
    assert!(report.contains("Error: timed out"));
}

#[test]
fn test_text_report_marks_model_findings() {
    let report = render_report(&create_outcome(), ReportFormat::Text).unwrap();
    let ai = report.find("AI FINDINGS (1)").unwrap();

    assert!(report[ai..].contains("Confidence:   model"));
    assert!(report[..ai].contains("Confidence:   rule"));
    assert!(!report[..ai].contains("Confidence:   model"));
}

// ============================================================================
// Structured Reports
// ============================================================================

#[test]
fn test_json_report_structure() {
    let outcome = create_outcome();
    let report = render_report(&outcome, ReportFormat::Json).unwrap();
    let json: serde_json::Value = serde_json::from_str(&report).unwrap();

    let root = &json["report"];
    assert_eq!(root["metadata"]["generator"], "scour");
    assert_eq!(root["summary"]["total_findings"], 4);
    assert_eq!(root["summary"]["technique_breakdown"]["SQLi"], 1);
    assert_eq!(root["summary"]["technique_breakdown"]["DOM"], 0);
    assert_eq!(root["summary"]["family_breakdown"]["XSS"], 2);
    assert_eq!(root["summary"]["family_breakdown"]["SQLi"], 1);
    assert_eq!(root["summary"]["family_breakdown"]["CSRF"], 1);
    assert_eq!(root["findings"][0]["technique"], "SQLi");
    assert_eq!(root["findings"][0]["evidence"], "'");
    assert_eq!(root["header_reports"][1]["outcome"], "failed");
    assert_eq!(
        root["manifest"]["scan_id"],
        outcome.manifest.scan_id.to_string()
    );
}

#[test]
fn test_csv_report_rows() {
    let report = render_report(&create_outcome(), ReportFormat::Csv).unwrap();
    let lines: Vec<&str> = report.lines().collect();

    assert_eq!(
        lines[0],
        "origin_page,tested_url,technique,evidence,severity,confidence"
    );
    assert_eq!(lines.len(), 5);
    assert!(lines[3].ends_with(",low,model"));
    assert_eq!(
        lines[1],
        "http://shop.test/item?id=1,http://shop.test/item?id=%27,SQLi,',critical,rule"
    );
}

#[test]
fn test_markdown_report_escapes_pipes() {
    let report = render_report(&create_outcome(), ReportFormat::Markdown).unwrap();

    assert!(report.starts_with("# Scour Scan Report"));
    assert!(report.contains("## CSRF"));
    assert!(report.contains("missing CSRF token \\| cookie lacks Secure"));
    assert!(report.contains("### http://shop.test/down"));
}

#[test]
fn test_save_report() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("report.txt");

    save_report("hello", &path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
}
