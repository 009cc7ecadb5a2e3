//! # Market data adapters
//!
//! The pipeline only ever talks to the three traits below. Each is a single
//! capability (listing the universe, quoting one symbol, fetching one symbol's
//! daily bars) so tests can swap any of them for an in-memory double.
//!
//! - `TwelveDataClient` implements [`UniverseSource`].
//! - `YahooFinanceClient` implements [`QuoteSource`] and [`HistorySource`].

use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{PriceBar, Quote};

pub mod error;
pub mod responses;
pub mod twelve_data;
pub mod yahoo;

// --- Public API ---
pub use error::ApiError;
pub use twelve_data::TwelveDataClient;
pub use yahoo::YahooFinanceClient;

/// Supplies the ordered list of candidate symbols.
#[async_trait]
pub trait UniverseSource: Send + Sync {
    async fn fetch_universe(&self) -> Result<Vec<String>, ApiError>;
}

/// Supplies market cap and price for one symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// `Ok(None)` means the provider knows the symbol but lacks a market cap or
    /// a price for it; the symbol is left out of the snapshot.
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>, ApiError>;
}

/// Supplies daily OHLCV bars for one symbol.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Bars dated in `[start, end)`. An empty vector is a valid answer.
    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ApiError>;
}
