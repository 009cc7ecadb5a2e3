use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How per-ticker returns are combined into the index return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingScheme {
    /// Every ticker with price data counts the same.
    #[default]
    Equal,
    /// Tickers are weighted by their share of the latest snapshot's market cap.
    MarketCap,
}

impl fmt::Display for WeightingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightingScheme::Equal => write!(f, "equal"),
            WeightingScheme::MarketCap => write!(f, "market_cap"),
        }
    }
}

impl FromStr for WeightingScheme {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" => Ok(WeightingScheme::Equal),
            "market_cap" | "marketcap" => Ok(WeightingScheme::MarketCap),
            other => Err(CoreError::UnknownWeighting(other.to_string())),
        }
    }
}
