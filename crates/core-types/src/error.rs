use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Unknown weighting scheme '{0}' (expected 'equal' or 'market_cap')")]
    UnknownWeighting(String),
}
