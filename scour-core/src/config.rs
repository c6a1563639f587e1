use crate::error::ConfigError;
use crate::payloads;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_SQLI_MODEL: &str = "models/sqli_detector.json";
pub const DEFAULT_XSS_MODEL: &str = "models/xss_detector.json";

/// Classifier stage setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AiConfig {
    Disabled,
    Models {
        sqli_model: PathBuf,
        xss_model: PathBuf,
    },
}

/// The classifier stage is on by default, reading models relative to the working directory.
impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::Models {
            sqli_model: PathBuf::from(DEFAULT_SQLI_MODEL),
            xss_model: PathBuf::from(DEFAULT_XSS_MODEL),
        }
    }
}

/// Tunables for one scan, stored as JSON. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on fetched pages during the crawl
    pub max_links: usize,
    pub crawl_workers: usize,
    pub crawl_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub sqli_timeout_ms: u64,
    pub sqli_delay_threshold_ms: u64,
    pub dom_pass: bool,
    pub dom_settle_ms: u64,
    pub ai: AiConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_links: 10,
            crawl_workers: scour_scanner::crawler::DEFAULT_WORKERS,
            crawl_timeout_ms: scour_scanner::crawler::DEFAULT_CRAWL_TIMEOUT.as_millis() as u64,
            probe_timeout_ms: payloads::PROBE_TIMEOUT.as_millis() as u64,
            sqli_timeout_ms: payloads::SQLI_TIMEOUT.as_millis() as u64,
            sqli_delay_threshold_ms: payloads::SQLI_DELAY_THRESHOLD.as_millis() as u64,
            dom_pass: true,
            dom_settle_ms: crate::dom::DEFAULT_SETTLE.as_millis() as u64,
            ai: AiConfig::default(),
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: ScanConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawl_workers == 0 {
            return Err(ConfigError::Invalid("crawl_workers must be at least 1".into()));
        }
        if self.sqli_timeout_ms <= self.sqli_delay_threshold_ms {
            return Err(ConfigError::Invalid(format!(
                "sqli_timeout_ms ({}) must exceed sqli_delay_threshold_ms ({})",
                self.sqli_timeout_ms, self.sqli_delay_threshold_ms
            )));
        }
        Ok(())
    }

    pub fn crawl_timeout(&self) -> Duration {
        Duration::from_millis(self.crawl_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn sqli_timeout(&self) -> Duration {
        Duration::from_millis(self.sqli_timeout_ms)
    }

    pub fn sqli_delay_threshold(&self) -> Duration {
        Duration::from_millis(self.sqli_delay_threshold_ms)
    }

    pub fn dom_settle(&self) -> Duration {
        Duration::from_millis(self.dom_settle_ms)
    }
}
