use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Not enough price history: need two distinct dates, found {found}. Try again after the next trading day.")]
    InsufficientHistory { found: usize },

    #[error("No market-cap weights available: {0}")]
    MissingWeights(String),

    #[error("Error in calculation: {0}")]
    Calculation(String),
}
