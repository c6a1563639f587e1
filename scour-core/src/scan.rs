//! Scan orchestration: CRAWL, then DETECT page by page, then the DOM pass.

use crate::ai::AiOracle;
use crate::config::{AiConfig, ScanConfig};
use crate::detectors::{CsrfAuditor, ReflectedXss, SqlInjection};
use crate::dom::{BrowserLauncher, ChromeLauncher, DomXssPass};
use crate::error::CoreError;
use crate::finding::{Family, Finding, Technique};
use crate::headers::{HeaderAuditor, HeaderReport};
use crate::probe::{Detection, Detector, ProbeFailure};
use chrono::{DateTime, Local};
use scour_scanner::error::Result;
use scour_scanner::{Crawler, HttpClient, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Crawl,
    Detect,
    DomPass,
    Done,
}

impl Phase {
    pub fn next(self) -> Phase {
        match self {
            Phase::Crawl => Phase::Detect,
            Phase::Detect => Phase::DomPass,
            Phase::DomPass | Phase::Done => Phase::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Crawl => "crawl",
            Phase::Detect => "detect",
            Phase::DomPass => "dom-pass",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called with `(phase, done, total)` as the scan advances.
pub type ScanObserver = Arc<dyn Fn(Phase, usize, usize) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanManifest {
    pub scan_id: Uuid,
    pub target_root: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    /// Pages fetched by the crawler, in fetch order
    pub crawled_urls: Vec<String>,
    /// Detection targets derived from the crawl
    pub pages_scanned: Vec<String>,
}

/// Everything one scan produced, ready for a sink or a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub manifest: ScanManifest,
    pub findings: Vec<Finding>,
    pub header_reports: Vec<HeaderReport>,
    #[serde(default)]
    pub probe_failures: Vec<ProbeFailure>,
}

impl ScanOutcome {
    pub fn with_technique(&self, technique: Technique) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(move |f| f.technique() == technique)
    }

    pub fn in_family(&self, family: Family) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(move |f| f.technique().family() == family)
    }
}

/// Collections owned by one run; detectors only hand results back.
struct Collector {
    findings: Vec<Finding>,
    header_reports: Vec<HeaderReport>,
    failures: Vec<ProbeFailure>,
}

impl Collector {
    fn absorb(&mut self, detection: Detection) {
        self.findings.extend(detection.findings);
        self.failures.extend(detection.failures);
    }
}

pub struct Scanner {
    config: ScanConfig,
    ai: Option<Arc<AiOracle>>,
    /// Classifier load errors, reported with every run
    startup_failures: Vec<ProbeFailure>,
    browser: Option<Arc<dyn BrowserLauncher>>,
    observer: Option<ScanObserver>,
    crawl_progress: Option<ProgressCallback>,
}

/// Load the configured classifiers. A model that cannot be loaded disables the
/// AI stage and is returned as a failure; it never stops the scan.
fn load_oracle(ai: &AiConfig) -> (Option<AiOracle>, Vec<ProbeFailure>) {
    let AiConfig::Models {
        sqli_model,
        xss_model,
    } = ai
    else {
        return (None, Vec::new());
    };

    match AiOracle::load(sqli_model, xss_model) {
        Ok(oracle) => (Some(oracle), Vec::new()),
        Err(e) => {
            error!("Classifier unavailable, AI stage disabled: {}", e);
            let detector = if e.path() == sqli_model.as_path() {
                Detector::SqliModel
            } else {
                Detector::XssModel
            };
            let failure = ProbeFailure {
                detector,
                url: e.path().display().to_string(),
                reason: e.to_string(),
            };
            (None, vec![failure])
        }
    }
}

impl Scanner {
    /// Validate the configuration and load classifiers.
    ///
    /// Only an invalid configuration is an error. Unloadable models leave the
    /// AI stage off and show up in `ScanOutcome::probe_failures`.
    pub fn new(config: ScanConfig) -> std::result::Result<Self, CoreError> {
        config.validate()?;

        let (ai, startup_failures) = load_oracle(&config.ai);

        let browser: Option<Arc<dyn BrowserLauncher>> = if config.dom_pass {
            Some(Arc::new(ChromeLauncher::default()))
        } else {
            None
        };

        Ok(Self {
            config,
            ai: ai.map(Arc::new),
            startup_failures,
            browser,
            observer: None,
            crawl_progress: None,
        })
    }

    pub fn with_ai(mut self, ai: Option<AiOracle>) -> Self {
        self.ai = ai.map(Arc::new);
        self.startup_failures.clear();
        self
    }


    pub fn with_browser(mut self, browser: Option<Arc<dyn BrowserLauncher>>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_observer(mut self, observer: ScanObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_crawl_progress(mut self, callback: ProgressCallback) -> Self {
        self.crawl_progress = Some(callback);
        self
    }

    fn notify(&self, phase: Phase, done: usize, total: usize) {
        if let Some(observer) = &self.observer {
            observer(phase, done, total);
        }
    }

    fn advance(&self, phase: &mut Phase) {
        let next = phase.next();
        assert!(next > *phase, "scan phase cannot move from {} to {}", phase, next);
        info!("Scan phase {} -> {}", phase, next);
        *phase = next;
    }

    pub async fn run(&self, root: &str) -> Result<ScanOutcome> {
        let start_time = Local::now();
        let mut phase = Phase::Crawl;
        info!("Scanning {} (budget {} pages)", root, self.config.max_links);

        // CRAWL
        self.notify(phase, 0, self.config.max_links);
        let mut crawler = Crawler::with_client(HttpClient::with_timeout(self.config.crawl_timeout())?)
            .with_workers(self.config.crawl_workers);
        if let Some(callback) = &self.crawl_progress {
            crawler = crawler.with_progress_callback(callback.clone());
        }
        let crawl = crawler.crawl(root, self.config.max_links).await?;
        let targets = crawl.scan_targets();
        self.notify(phase, crawl.visited.len(), self.config.max_links);
        info!(
            "Crawl visited {} pages, {} detection targets",
            crawl.visited.len(),
            targets.len()
        );

        // DETECT
        self.advance(&mut phase);
        let client = HttpClient::with_timeout(self.config.probe_timeout())?;
        let headers = HeaderAuditor::new(client.clone());
        let xss = ReflectedXss::new(client.clone());
        let sqli = SqlInjection::new(client.clone())
            .with_timing(self.config.sqli_timeout(), self.config.sqli_delay_threshold());
        let csrf = CsrfAuditor::new(client);

        let mut collected = Collector {
            findings: Vec::new(),
            header_reports: Vec::new(),
            failures: self.startup_failures.clone(),
        };

        for (index, page) in targets.iter().enumerate() {
            debug!("[{}/{}] scanning {}", index + 1, targets.len(), page);

            collected.header_reports.push(headers.check(page).await);
            collected.absorb(xss.scan_forms(page).await);
            if page.contains('?') {
                collected.absorb(xss.scan_get(page).await);
                collected.absorb(sqli.scan(page).await);
            }
            collected.absorb(csrf.scan(page).await);
            if let Some(ai) = &self.ai {
                collected.absorb(ai.scan(page));
            }

            self.notify(phase, index + 1, targets.len());
        }

        // DOM-PASS
        self.advance(&mut phase);
        match &self.browser {
            Some(launcher) if !targets.is_empty() => {
                self.notify(phase, 0, targets.len());
                let pass = DomXssPass::new(self.config.dom_settle());
                let launcher = launcher.clone();
                let urls = targets.clone();
                match tokio::task::spawn_blocking(move || pass.launch_and_run(launcher.as_ref(), &urls))
                    .await
                {
                    Ok(detection) => collected.absorb(detection),
                    Err(e) => warn!("DOM-XSS pass aborted, continuing without it: {}", e),
                }
                self.notify(phase, targets.len(), targets.len());
            }
            _ => debug!("DOM-XSS pass skipped"),
        }

        self.advance(&mut phase);
        self.notify(phase, 1, 1);

        let manifest = ScanManifest {
            scan_id: Uuid::new_v4(),
            target_root: root.to_string(),
            start_time,
            end_time: Local::now(),
            crawled_urls: crawl.visited,
            pages_scanned: targets,
        };
        info!(
            "Scan {} complete: {} findings, {} header reports, {} failed probes",
            manifest.scan_id,
            collected.findings.len(),
            collected.header_reports.len(),
            collected.failures.len()
        );

        Ok(ScanOutcome {
            manifest,
            findings: collected.findings,
            header_reports: collected.header_reports,
            probe_failures: collected.failures,
        })
    }
}

/// Scan `root` with default settings and a page budget of `link_budget`.
///
/// The default settings load the classifiers from `models/`; when they are
/// missing the scan runs without the AI stage.
pub async fn crawl_and_scan(
    root: &str,
    link_budget: usize,
) -> std::result::Result<ScanOutcome, CoreError> {
    let config = ScanConfig {
        max_links: link_budget,
        ..Default::default()
    };
    Ok(Scanner::new(config)?.run(root).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_only_move_forward() {
        let mut phase = Phase::Crawl;
        let mut seen = vec![phase];
        while phase != Phase::Done {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![Phase::Crawl, Phase::Detect, Phase::DomPass, Phase::Done]
        );
        assert_eq!(Phase::Done.next(), Phase::Done);
    }

    #[test]
    fn test_missing_models_disable_only_the_ai_stage() {
        let config = ScanConfig {
            ai: AiConfig::Models {
                sqli_model: "/nonexistent/sqli.json".into(),
                xss_model: "/nonexistent/xss.json".into(),
            },
            dom_pass: false,
            ..Default::default()
        };

        let scanner = Scanner::new(config).unwrap();
        assert!(scanner.ai.is_none());
        assert_eq!(scanner.startup_failures.len(), 1);
        assert_eq!(scanner.startup_failures[0].detector, Detector::SqliModel);
        assert_eq!(scanner.startup_failures[0].url, "/nonexistent/sqli.json");
    }

    #[test]
    fn test_dom_pass_toggle() {
        let scanner = Scanner::new(ScanConfig {
            dom_pass: false,
            ..Default::default()
        })
        .unwrap();
        assert!(scanner.browser.is_none());
        assert!(Scanner::new(ScanConfig::default()).unwrap().browser.is_some());
    }
}
