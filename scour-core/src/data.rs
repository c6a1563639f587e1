use crate::error::SinkError;
use crate::finding::{Finding, Technique};
use crate::headers::HeaderReport;
use crate::probe::ProbeFailure;
use crate::scan::{ScanManifest, ScanOutcome};
use chrono::{DateTime, Local};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, SinkError>;

/// Destination for completed scans.
pub trait FindingSink {
    fn record(&mut self, outcome: &ScanOutcome) -> Result<()>;
}

/// One row of the scan index.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub target_root: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub pages_crawled: usize,
    pub finding_count: i64,
}

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let sink = SqliteSink { conn };
        sink.init_schema()?;
        Ok(sink)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let sink = SqliteSink { conn };
        sink.init_schema()?;
        Ok(sink)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scans (
                id TEXT PRIMARY KEY,
                target_root TEXT NOT NULL,
                start_time TEXT NOT NULL,   -- RFC 3339
                end_time TEXT NOT NULL,
                crawled_urls TEXT NOT NULL, -- JSON array
                pages_scanned TEXT NOT NULL,
                probe_failures TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS findings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scan_id TEXT NOT NULL,
                technique TEXT NOT NULL CHECK(technique IN ('GET', 'POST', 'SQLi', 'CSRF', 'DOM', 'SQLi-AI', 'XSS-AI')),
                origin_page TEXT NOT NULL,
                tested_url TEXT NOT NULL,
                evidence TEXT NOT NULL,
                severity TEXT NOT NULL,
                FOREIGN KEY(scan_id) REFERENCES scans(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS header_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scan_id TEXT NOT NULL,
                url TEXT NOT NULL,
                failed BOOLEAN NOT NULL,
                report TEXT NOT NULL,       -- JSON
                FOREIGN KEY(scan_id) REFERENCES scans(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_findings_scan ON findings(scan_id);
            CREATE INDEX IF NOT EXISTS idx_findings_technique ON findings(technique);
            CREATE INDEX IF NOT EXISTS idx_header_reports_scan ON header_reports(scan_id);
            ",
        )?;
        Ok(())
    }

    pub fn list_scans(&self) -> Result<Vec<ScanSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.target_root, s.start_time, s.end_time, s.crawled_urls,
                    (SELECT COUNT(*) FROM findings f WHERE f.scan_id = s.id)
             FROM scans s ORDER BY s.start_time DESC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, target_root, start, end, crawled, finding_count)| {
                let crawled: Vec<String> = serde_json::from_str(&crawled)?;
                Ok(ScanSummary {
                    scan_id: parse_id(&id)?,
                    target_root,
                    start_time: parse_time(&start)?,
                    end_time: parse_time(&end)?,
                    pages_crawled: crawled.len(),
                    finding_count,
                })
            })
            .collect()
    }

    /// Findings of one scan in the order they were recorded.
    pub fn findings_for_scan(&self, scan_id: &Uuid) -> Result<Vec<Finding>> {
        let mut stmt = self.conn.prepare(
            "SELECT origin_page, tested_url, technique, evidence FROM findings WHERE scan_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![scan_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(origin, tested, technique, evidence)| {
                Ok(Finding::from_record(
                    origin,
                    tested,
                    parse_technique(&technique)?,
                    evidence,
                ))
            })
            .collect()
    }

    pub fn finding_counts_by_technique(&self, scan_id: &Uuid) -> Result<Vec<(Technique, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT technique, COUNT(*) FROM findings WHERE scan_id = ?1 GROUP BY technique",
        )?;

        let rows = stmt
            .query_map(params![scan_id.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut counts = rows
            .into_iter()
            .map(|(technique, count)| Ok((parse_technique(&technique)?, count)))
            .collect::<Result<Vec<_>>>()?;
        counts.sort_by_key(|(technique, _)| {
            Technique::ALL.iter().position(|t| t == technique)
        });
        Ok(counts)
    }

    pub fn header_reports_for_scan(&self, scan_id: &Uuid) -> Result<Vec<HeaderReport>> {
        let mut stmt = self
            .conn
            .prepare("SELECT report FROM header_reports WHERE scan_id = ?1 ORDER BY id")?;

        let rows = stmt
            .query_map(params![scan_id.to_string()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.iter()
            .map(|raw| Ok(serde_json::from_str(raw)?))
            .collect()
    }

    /// Rebuild a stored scan, or `None` if the id is unknown.
    pub fn load_outcome(&self, scan_id: &Uuid) -> Result<Option<ScanOutcome>> {
        let row = self
            .conn
            .query_row(
                "SELECT target_root, start_time, end_time, crawled_urls, pages_scanned, probe_failures
                 FROM scans WHERE id = ?1",
                params![scan_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((target_root, start, end, crawled, scanned, failures)) = row else {
            return Ok(None);
        };
        let probe_failures: Vec<ProbeFailure> = serde_json::from_str(&failures)?;

        Ok(Some(ScanOutcome {
            manifest: ScanManifest {
                scan_id: *scan_id,
                target_root,
                start_time: parse_time(&start)?,
                end_time: parse_time(&end)?,
                crawled_urls: serde_json::from_str(&crawled)?,
                pages_scanned: serde_json::from_str(&scanned)?,
            },
            findings: self.findings_for_scan(scan_id)?,
            header_reports: self.header_reports_for_scan(scan_id)?,
            probe_failures,
        }))
    }

    /// The most recently started scan, if any.
    pub fn latest_scan(&self) -> Result<Option<Uuid>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM scans ORDER BY start_time DESC LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        id.map(|id| parse_id(&id)).transpose()
    }
}

impl FindingSink for SqliteSink {
    fn record(&mut self, outcome: &ScanOutcome) -> Result<()> {
        let manifest = &outcome.manifest;
        let scan_id = manifest.scan_id.to_string();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO scans (id, target_root, start_time, end_time, crawled_urls, pages_scanned, probe_failures)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &scan_id,
                &manifest.target_root,
                manifest.start_time.to_rfc3339(),
                manifest.end_time.to_rfc3339(),
                serde_json::to_string(&manifest.crawled_urls)?,
                serde_json::to_string(&manifest.pages_scanned)?,
                serde_json::to_string(&outcome.probe_failures)?,
            ],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO findings (scan_id, technique, origin_page, tested_url, evidence, severity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for finding in &outcome.findings {
                insert.execute(params![
                    &scan_id,
                    finding.technique().as_str(),
                    finding.origin_page(),
                    finding.tested_url(),
                    finding.payload_or_note(),
                    finding.severity().as_str(),
                ])?;
            }

            let mut insert = tx.prepare(
                "INSERT INTO header_reports (scan_id, url, failed, report) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for report in &outcome.header_reports {
                insert.execute(params![
                    &scan_id,
                    report.url(),
                    report.is_failed(),
                    serde_json::to_string(report)?,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| SinkError::Corrupt(format!("scan id {:?}: {}", raw, e)))
}

fn parse_time(raw: &str) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Local))
        .map_err(|e| SinkError::Corrupt(format!("timestamp {:?}: {}", raw, e)))
}

fn parse_technique(raw: &str) -> Result<Technique> {
    Technique::parse(raw).ok_or_else(|| SinkError::Corrupt(format!("unknown technique {:?}", raw)))
}
