pub mod ai;
pub mod config;
pub mod data;
pub mod detectors;
pub mod dom;
pub mod error;
pub mod finding;
pub mod headers;
pub mod payloads;
pub mod probe;
pub mod report;
pub mod scan;

pub use ai::{AiOracle, Classifier, FeatureVector, LinearModel};
pub use config::{AiConfig, ScanConfig};
pub use data::{FindingSink, ScanSummary, SqliteSink};
pub use dom::{BrowserLauncher, BrowserSession, ChromeLauncher, DomXssPass};
pub use error::{ConfigError, CoreError, ModelError, SinkError};
pub use finding::{Confidence, Family, Finding, Severity, Technique};
pub use headers::{HeaderAuditor, HeaderReport, HeaderResult, HeaderStatus};
pub use probe::{Detection, Detector, Probe, ProbeFailure};
pub use report::{ReportFormat, render_report, save_report};
pub use scan::{Phase, ScanManifest, ScanObserver, ScanOutcome, Scanner, crawl_and_scan};
