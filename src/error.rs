use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Histogram {0} not found in analysis file")]
    MissingHistogram(String),
    #[error("Histogram {name} has dimension {found}; expected {expected}")]
    WrongDimension {
        name: String,
        found: usize,
        expected: usize,
    },
    #[error("Histogram {0} has bin contents that do not match its axes")]
    InconsistentHistogram(String),
    #[error("Distribution source has no spatial bins")]
    NoBins,
    #[error("No strip metadata (stripBoxInfo*) found in analysis file")]
    NoStripInfo,
    #[error("Sensor {0} not found in sensor catalog")]
    UnknownSensor(String),
    #[error("Could not open file {0:?} because it does not exist")]
    BadFilePath(PathBuf),
    #[error("Failed to decode binary histogram store: {0}")]
    Decode(#[from] bincode::Error),
    #[error("Failed to parse catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Failed to draw plot: {0}")]
    Plot(String),
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Analysis failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}
