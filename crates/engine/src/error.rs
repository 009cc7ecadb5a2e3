use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] configuration::error::ConfigError),

    #[error("Ticker universe unavailable: {0}")]
    UniverseUnavailable(#[source] api_client::ApiError),

    #[error("Ticker universe is empty; nothing to track.")]
    EmptyUniverse,

    #[error("API client error: {0}")]
    ApiClient(#[from] api_client::ApiError),

    #[error("Database error: {0}")]
    Database(#[from] database::DbError),

    #[error("Index calculation error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),

    #[error("Another run holds the lock at {0}.")]
    RunInProgress(PathBuf),

    #[error("Run did not finish within {0} seconds.")]
    Timeout(u64),

    #[error("Run interrupted by Ctrl-C.")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Progress bar template error: {0}")]
    ProgressBarTemplate(String),
}

impl From<indicatif::style::TemplateError> for EngineError {
    fn from(error: indicatif::style::TemplateError) -> Self {
        EngineError::ProgressBarTemplate(error.to_string())
    }
}
