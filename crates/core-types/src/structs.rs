use crate::error::CoreError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market cap and last price for one symbol, as returned by a quote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub market_cap: Decimal,
    pub price: Decimal,
}

impl Quote {
    /// Stamps the quote with a snapshot date, rejecting negative values.
    pub fn into_entry(self, date: NaiveDate) -> Result<CompositionEntry, CoreError> {
        CompositionEntry::new(date, self.symbol, self.market_cap, self.price)
    }
}

/// One row of the `stocks` table: a symbol's membership in the snapshot of a given date.
///
/// Weights are never stored; they are derived from `market_cap` relative to the
/// other entries sharing the same `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionEntry {
    pub date: NaiveDate,
    pub symbol: String,
    pub market_cap: Decimal,
    pub price: Decimal,
}

impl CompositionEntry {
    pub fn new(
        date: NaiveDate,
        symbol: impl Into<String>,
        market_cap: Decimal,
        price: Decimal,
    ) -> Result<Self, CoreError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(CoreError::InvalidInput("symbol".into(), "empty".into()));
        }
        if market_cap.is_sign_negative() {
            return Err(CoreError::InvalidInput(
                "market_cap".into(),
                format!("{symbol}: {market_cap} is negative"),
            ));
        }
        if price.is_sign_negative() {
            return Err(CoreError::InvalidInput(
                "price".into(),
                format!("{symbol}: {price} is negative"),
            ));
        }
        Ok(Self { date, symbol, market_cap, price })
    }
}

/// A daily OHLCV bar for one ticker (a row of `historical_prices`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub ticker: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

/// The subset of a price bar the index calculator reads back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosePrice {
    pub ticker: String,
    pub date: NaiveDate,
    pub close: Decimal,
}

/// One row of `index_performance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub date: NaiveDate,
    pub daily_return: Decimal,
}
