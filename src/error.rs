//! Error types for the forecasting toolkit

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State file error: {path}: {reason}")]
    State { path: String, reason: String },

    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("Insufficient data: need {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Unknown trigger: {0}")]
    UnknownTrigger(String),

    #[error("Invalid forecast value {0}: must be within [0, 1]")]
    InvalidForecast(f64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for ForecastError {
    fn from(err: config::ConfigError) -> Self {
        ForecastError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
