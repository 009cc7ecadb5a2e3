use chrono::NaiveDate;
use core_types::{CompositionEntry, PerformanceRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One row of the performance series as presented to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePoint {
    pub date: NaiveDate,
    pub daily_return: Decimal,
    /// Compounded return since the first stored row: Π(1 + r) − 1.
    pub cumulative_return: Decimal,
    pub daily_change_pct: Decimal,
}

/// A composition entry together with its share of the snapshot's total market cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedConstituent {
    pub symbol: String,
    pub market_cap: Decimal,
    pub price: Decimal,
    pub weight_pct: Decimal,
}

/// Symbols that entered or left the composition on `date` relative to the
/// previous snapshot date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionChange {
    pub date: NaiveDate,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl CompositionChange {
    pub fn count(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Headline metrics for the dashboard and the `report` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    /// `None` until at least one performance row exists.
    pub cumulative_return: Option<Decimal>,
    pub average_daily_change_pct: Option<Decimal>,
    pub total_composition_changes: usize,
    pub observations: usize,
}

/// Builds the cumulative series from performance rows in storage order.
pub fn performance_series(records: &[PerformanceRecord]) -> Vec<PerformancePoint> {
    let hundred = Decimal::ONE_HUNDRED;
    let mut growth = Decimal::ONE;

    records
        .iter()
        .map(|record| {
            growth *= Decimal::ONE + record.daily_return;
            PerformancePoint {
                date: record.date,
                daily_return: record.daily_return,
                cumulative_return: growth - Decimal::ONE,
                daily_change_pct: record.daily_return * hundred,
            }
        })
        .collect()
}

/// Weights each entry of one snapshot by market cap, largest first.
///
/// A snapshot whose caps sum to zero yields zero weights rather than an error.
pub fn composition_weights(entries: &[CompositionEntry]) -> Vec<WeightedConstituent> {
    let total: Decimal = entries.iter().map(|e| e.market_cap).sum();

    let mut weighted: Vec<WeightedConstituent> = entries
        .iter()
        .map(|e| WeightedConstituent {
            symbol: e.symbol.clone(),
            market_cap: e.market_cap,
            price: e.price,
            weight_pct: if total.is_zero() {
                Decimal::ZERO
            } else {
                e.market_cap / total * Decimal::ONE_HUNDRED
            },
        })
        .collect();

    weighted.sort_by(|a, b| b.market_cap.cmp(&a.market_cap).then_with(|| a.symbol.cmp(&b.symbol)));
    weighted
}

/// Diffs each snapshot date against the one before it.
///
/// The earliest date is the baseline and never produces a change. Dates
/// whose symbol set is unchanged are omitted.
pub fn composition_changes(entries: &[CompositionEntry]) -> Vec<CompositionChange> {
    let mut by_date: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
    for entry in entries {
        by_date.entry(entry.date).or_default().insert(entry.symbol.as_str());
    }

    let mut changes = Vec::new();
    let mut previous: Option<&BTreeSet<&str>> = None;
    for (date, symbols) in &by_date {
        if let Some(prev) = previous {
            let added: Vec<String> = symbols.difference(prev).map(|s| s.to_string()).collect();
            let removed: Vec<String> = prev.difference(symbols).map(|s| s.to_string()).collect();
            if !added.is_empty() || !removed.is_empty() {
                changes.push(CompositionChange { date: *date, added, removed });
            }
        }
        previous = Some(symbols);
    }
    changes
}

pub fn summarize(records: &[PerformanceRecord], entries: &[CompositionEntry]) -> IndexSummary {
    let series = performance_series(records);
    let average_daily_change_pct = if series.is_empty() {
        None
    } else {
        let total: Decimal = series.iter().map(|p| p.daily_change_pct).sum();
        Some(total / Decimal::from(series.len()))
    };

    IndexSummary {
        cumulative_return: series.last().map(|p| p.cumulative_return),
        average_daily_change_pct,
        total_composition_changes: composition_changes(entries).iter().map(|c| c.count()).sum(),
        observations: series.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn entry(day: u32, symbol: &str, cap: Decimal) -> CompositionEntry {
        CompositionEntry::new(date(day), symbol, cap, dec!(10)).unwrap()
    }

    fn record(day: u32, r: Decimal) -> PerformanceRecord {
        PerformanceRecord { date: date(day), daily_return: r }
    }

    #[test]
    fn cumulative_return_compounds() {
        let series = performance_series(&[record(10, dec!(0.1)), record(11, dec!(-0.1))]);

        assert_eq!(series[0].cumulative_return, dec!(0.1));
        assert_eq!(series[0].daily_change_pct, dec!(10));
        // 1.1 * 0.9 − 1
        assert_eq!(series[1].cumulative_return, dec!(-0.01));
    }

    #[test]
    fn weights_sum_to_one_hundred_and_sort_by_cap() {
        let entries = vec![
            entry(14, "MSFT", dec!(3100)),
            entry(14, "NVDA", dec!(2900)),
            entry(14, "AAPL", dec!(3300)),
        ];

        let weights = composition_weights(&entries);
        let symbols: Vec<&str> = weights.iter().map(|w| w.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "NVDA"]);

        let total: Decimal = weights.iter().map(|w| w.weight_pct).sum();
        assert!((total - dec!(100)).abs() < dec!(0.000001));
    }

    #[test]
    fn zero_total_cap_gives_zero_weights() {
        let weights = composition_weights(&[entry(14, "AAA", Decimal::ZERO)]);
        assert_eq!(weights[0].weight_pct, Decimal::ZERO);
    }

    #[test]
    fn one_removed_and_one_added_is_two_changes() {
        let entries = vec![
            entry(13, "AAPL", dec!(1)),
            entry(13, "MSFT", dec!(1)),
            entry(14, "AAPL", dec!(1)),
            entry(14, "NVDA", dec!(1)),
        ];

        let changes = composition_changes(&entries);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].date, date(14));
        assert_eq!(changes[0].added, vec!["NVDA"]);
        assert_eq!(changes[0].removed, vec!["MSFT"]);
        assert_eq!(changes[0].count(), 2);
    }

    #[test]
    fn unchanged_and_single_snapshots_have_no_changes() {
        let entries = vec![entry(13, "AAPL", dec!(1)), entry(14, "AAPL", dec!(2))];
        assert!(composition_changes(&entries).is_empty());
        assert!(composition_changes(&entries[..1]).is_empty());
    }

    #[test]
    fn summary_of_empty_store() {
        let summary = summarize(&[], &[]);
        assert_eq!(summary.cumulative_return, None);
        assert_eq!(summary.average_daily_change_pct, None);
        assert_eq!(summary.total_composition_changes, 0);
        assert_eq!(summary.observations, 0);
    }

    #[test]
    fn summary_metrics() {
        let records = vec![record(13, dec!(0.02)), record(14, dec!(0.04))];
        let entries = vec![
            entry(13, "AAPL", dec!(1)),
            entry(14, "AAPL", dec!(1)),
            entry(14, "MSFT", dec!(1)),
        ];

        let summary = summarize(&records, &entries);
        assert_eq!(summary.observations, 2);
        assert_eq!(summary.average_daily_change_pct, Some(dec!(3)));
        // 1.02 * 1.04 − 1
        assert_eq!(summary.cumulative_return, Some(dec!(0.0608)));
        assert_eq!(summary.total_composition_changes, 1);
    }
}
