//! Classifier-backed flags for query parameters.
//!
//! Each parameter is reduced to five numeric features and handed to two
//! independent binary classifiers, one tuned for injection and one for markup.
//! A positive verdict is a low-confidence finding: the oracle sees request
//! features only, never a server response.

use crate::detectors::query_params;
use crate::error::ModelError;
use crate::finding::{Finding, Technique};
use crate::probe::{Detection, Probe};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

pub const FEATURE_COUNT: usize = 5;

/// `[url length, param name length, value length, quote count, non-alphanumeric count]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Lengths are counted in characters. Quotes are `'` and `"`.
    pub fn extract(url: &str, param: &str, value: &str) -> Self {
        let quotes = value.chars().filter(|c| matches!(c, '\'' | '"')).count();
        let symbols = value.chars().filter(|c| !c.is_alphanumeric()).count();

        Self([
            url.chars().count() as f64,
            param.chars().count() as f64,
            value.chars().count() as f64,
            quotes as f64,
            symbols as f64,
        ])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Binary classifier over a feature vector. `true` is the positive class.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> bool;
}

impl<F> Classifier for F
where
    F: Fn(&FeatureVector) -> bool + Send + Sync,
{
    fn predict(&self, features: &FeatureVector) -> bool {
        self(features)
    }
}

/// Logistic regression stored as JSON: `{"weights": [..5], "bias": b, "threshold": t}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub bias: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

impl LinearModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model: LinearModel =
            serde_json::from_str(&raw).map_err(|source| ModelError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        if model.weights.len() != FEATURE_COUNT {
            return Err(ModelError::Shape {
                path: path.to_path_buf(),
                expected: FEATURE_COUNT,
                actual: model.weights.len(),
            });
        }

        debug!("Loaded model {} (threshold {})", path.display(), model.threshold);
        Ok(model)
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    pub fn probability(&self, features: &FeatureVector) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(features.as_slice())
            .map(|(w, f)| w * f)
            .sum::<f64>()
            + self.bias;

        Self::sigmoid(z)
    }
}

impl Classifier for LinearModel {
    fn predict(&self, features: &FeatureVector) -> bool {
        self.probability(features) >= self.threshold
    }
}

/// The two classifiers, loaded once and shared for the whole scan.
pub struct AiOracle {
    sqli: Box<dyn Classifier>,
    xss: Box<dyn Classifier>,
}

impl AiOracle {
    pub fn new(sqli: Box<dyn Classifier>, xss: Box<dyn Classifier>) -> Self {
        Self { sqli, xss }
    }

    pub fn load(sqli_model: &Path, xss_model: &Path) -> Result<Self, ModelError> {
        let sqli = LinearModel::load(sqli_model)?;
        let xss = LinearModel::load(xss_model)?;
        info!(
            "Classifiers loaded: {}, {}",
            sqli_model.display(),
            xss_model.display()
        );
        Ok(Self::new(Box::new(sqli), Box::new(xss)))
    }

    /// Score every parameter of `url` with the injection classifier, then the markup one.
    pub fn scan(&self, url: &str) -> Detection {
        let mut detection = Detection::default();

        let Ok(parsed) = Url::parse(url) else {
            return detection;
        };
        let params = query_params(&parsed);

        let stages: [(&dyn Classifier, Technique); 2] = [
            (self.sqli.as_ref(), Technique::SqliAi),
            (self.xss.as_ref(), Technique::XssAi),
        ];

        for (classifier, technique) in stages {
            for (name, value) in &params {
                let features = FeatureVector::extract(url, name, value);
                if !classifier.predict(&features) {
                    continue;
                }
                let note = format!("model flagged: {}={}", name, value);
                if let Some(finding) = Finding::model_flag(url, technique, note) {
                    debug!("[{}] {} flagged parameter {:?}", technique, url, name);
                    detection.record(Probe::Hit(finding));
                }
            }
        }

        detection
    }
}
