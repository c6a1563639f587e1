use scour_scanner::ScanError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A classifier artifact that could not be loaded at startup.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Model {path} has {actual} weights, expected {expected}")]
    Shape {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

impl ModelError {
    /// The artifact that failed to load.
    pub fn path(&self) -> &Path {
        match self {
            ModelError::Io { path, .. }
            | ModelError::Malformed { path, .. }
            | ModelError::Shape { path, .. } => path,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("JSON rendering failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV rendering failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Report is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
