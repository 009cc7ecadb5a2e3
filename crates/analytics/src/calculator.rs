use crate::error::AnalyticsError;
use chrono::NaiveDate;
use core_types::{ClosePrice, CompositionEntry, WeightingScheme};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The outcome of one index calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexReturn {
    pub latest_date: NaiveDate,
    pub prior_date: NaiveDate,
    pub daily_return: Decimal,
    /// Tickers seen on either of the two dates.
    pub constituents: usize,
    /// Tickers that contributed a zero return because one side was missing.
    pub zero_filled: usize,
    pub weighting: WeightingScheme,
}

/// A latest/prior close pair for one ticker.
#[derive(Debug, Default, Clone, Copy)]
struct ClosePair {
    latest: Option<Decimal>,
    prior: Option<Decimal>,
}

impl ClosePair {
    /// latest / prior − 1, or `None` when either side is missing or the prior
    /// close is zero.
    fn simple_return(&self) -> Option<Decimal> {
        match (self.latest, self.prior) {
            (Some(latest), Some(prior)) if !prior.is_zero() => Some(latest / prior - Decimal::ONE),
            _ => None,
        }
    }
}

/// A stateless calculator for the daily index return.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexCalculator {
    weighting: WeightingScheme,
}

impl IndexCalculator {
    pub fn new(weighting: WeightingScheme) -> Self {
        Self { weighting }
    }

    pub fn weighting(&self) -> WeightingScheme {
        self.weighting
    }

    /// Computes the index return between the two most recent distinct dates in `closes`.
    ///
    /// # Arguments
    ///
    /// * `closes` - Close prices in storage order. When a ticker has several rows
    ///   for the same date, the last one wins.
    /// * `composition` - The snapshot supplying market caps. Only read under
    ///   `WeightingScheme::MarketCap`.
    ///
    /// Every ticker present on either date is a constituent. A ticker missing on one
    /// of the two dates contributes a return of zero rather than being dropped.
    pub fn calculate(
        &self,
        closes: &[ClosePrice],
        composition: &[CompositionEntry],
    ) -> Result<IndexReturn, AnalyticsError> {
        let dates: BTreeSet<NaiveDate> = closes.iter().map(|c| c.date).collect();
        let mut recent = dates.iter().rev();
        let (Some(&latest_date), Some(&prior_date)) = (recent.next(), recent.next()) else {
            return Err(AnalyticsError::InsufficientHistory { found: dates.len() });
        };

        let pairs = Self::pivot(closes, latest_date, prior_date);
        let returns: Vec<(&str, Decimal)> = pairs
            .iter()
            .map(|(ticker, pair)| (ticker.as_str(), pair.simple_return().unwrap_or(Decimal::ZERO)))
            .collect();
        let zero_filled = pairs.values().filter(|p| p.simple_return().is_none()).count();

        let daily_return = match self.weighting {
            WeightingScheme::Equal => Self::equal_weighted(&returns)?,
            WeightingScheme::MarketCap => Self::cap_weighted(&returns, composition)?,
        };

        tracing::debug!(
            %latest_date,
            %prior_date,
            constituents = pairs.len(),
            zero_filled,
            %daily_return,
            "Calculated index return."
        );

        Ok(IndexReturn {
            latest_date,
            prior_date,
            daily_return,
            constituents: pairs.len(),
            zero_filled,
            weighting: self.weighting,
        })
    }

    /// Reshapes close rows into one latest/prior pair per ticker.
    fn pivot(
        closes: &[ClosePrice],
        latest_date: NaiveDate,
        prior_date: NaiveDate,
    ) -> BTreeMap<String, ClosePair> {
        let mut pairs: BTreeMap<String, ClosePair> = BTreeMap::new();
        for close in closes {
            if close.date == latest_date {
                pairs.entry(close.ticker.clone()).or_default().latest = Some(close.close);
            } else if close.date == prior_date {
                pairs.entry(close.ticker.clone()).or_default().prior = Some(close.close);
            }
        }
        pairs
    }

    fn equal_weighted(returns: &[(&str, Decimal)]) -> Result<Decimal, AnalyticsError> {
        if returns.is_empty() {
            return Err(AnalyticsError::Calculation("no constituents to average".to_string()));
        }
        let total: Decimal = returns.iter().map(|(_, r)| *r).sum();
        Ok(total / Decimal::from(returns.len()))
    }

    /// Σ wᵢ·rᵢ with wᵢ proportional to market cap. Constituents absent from the
    /// snapshot carry no weight.
    fn cap_weighted(
        returns: &[(&str, Decimal)],
        composition: &[CompositionEntry],
    ) -> Result<Decimal, AnalyticsError> {
        // Last occurrence wins, matching how snapshot batches are stored.
        let caps: HashMap<&str, Decimal> = composition
            .iter()
            .map(|e| (e.symbol.as_str(), e.market_cap))
            .collect();

        let weighted: Vec<(Decimal, Decimal)> = returns
            .iter()
            .filter_map(|(ticker, r)| caps.get(ticker).map(|cap| (*cap, *r)))
            .collect();
        let total_cap: Decimal = weighted.iter().map(|(cap, _)| *cap).sum();

        if total_cap <= Decimal::ZERO {
            return Err(AnalyticsError::MissingWeights(format!(
                "{} of {} constituents have a market cap in the latest snapshot, totalling {}",
                weighted.len(),
                returns.len(),
                total_cap
            )));
        }

        let contribution: Decimal = weighted.iter().map(|(cap, r)| *cap * *r).sum();
        Ok(contribution / total_cap)
    }
}
