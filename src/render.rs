use analytics::{CompositionChange, IndexSummary, PerformancePoint, WeightedConstituent};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Table};
use engine::RunSummary;
use database::Table as DbTable;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.iter().copied());
    table
}

fn pct(value: Decimal) -> String {
    format!("{:.2}%", value * Decimal::ONE_HUNDRED)
}

fn num(value: Decimal) -> Cell {
    Cell::new(value.round_dp(2)).set_alignment(CellAlignment::Right)
}

pub fn run_summary_table(summary: &RunSummary) -> Table {
    let mut table = new_table(&["Step", "Result"]);
    let skipped = |symbols: &[String]| {
        if symbols.is_empty() {
            "none".to_string()
        } else {
            symbols.join(", ")
        }
    };

    table.add_row(vec![
        "Universe".to_string(),
        format!("{} listed, {} selected", summary.universe_size, summary.selected),
    ]);
    table.add_row(vec!["Snapshot rows".to_string(), summary.composition_rows.to_string()]);
    table.add_row(vec!["Skipped quotes".to_string(), skipped(&summary.skipped_quotes)]);
    table.add_row(vec!["History rows".to_string(), summary.history_rows.to_string()]);
    table.add_row(vec!["Skipped history".to_string(), skipped(&summary.skipped_history)]);
    table.add_row(vec![
        "Compared".to_string(),
        format!(
            "{} vs {} ({} constituents, {} zero-filled)",
            summary.index_return.latest_date,
            summary.index_return.prior_date,
            summary.index_return.constituents,
            summary.index_return.zero_filled
        ),
    ]);
    table.add_row(vec![
        format!("Return ({})", summary.index_return.weighting),
        format!("{} recorded for {}", pct(summary.recorded.daily_return), summary.recorded.date),
    ]);
    table
}

pub fn summary_table(summary: &IndexSummary) -> Table {
    let mut table = new_table(&["Metric", "Value"]);
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    table.add_row(vec![
        "Cumulative Return".to_string(),
        or_dash(summary.cumulative_return.map(pct)),
    ]);
    table.add_row(vec![
        "Average Daily Change".to_string(),
        or_dash(summary.average_daily_change_pct.map(|v| format!("{:.2}%", v))),
    ]);
    table.add_row(vec![
        "Total Composition Changes".to_string(),
        summary.total_composition_changes.to_string(),
    ]);
    table.add_row(vec!["Observations".to_string(), summary.observations.to_string()]);
    table
}

pub fn performance_table(points: &[PerformancePoint]) -> Table {
    let mut table = new_table(&["Date", "Daily Return", "Cumulative Return", "Daily Change (%)"]);
    for point in points {
        table.add_row(vec![
            Cell::new(point.date),
            Cell::new(point.daily_return.round_dp(6)).set_alignment(CellAlignment::Right),
            Cell::new(pct(point.cumulative_return)).set_alignment(CellAlignment::Right),
            num(point.daily_change_pct),
        ]);
    }
    table
}

const BAR_WIDTH: u32 = 30;

/// A horizontal bar for `value`, scaled so that `max` spans the full width.
fn bar(value: Decimal, max: Decimal) -> String {
    if max <= Decimal::ZERO {
        return String::new();
    }
    let len = (value / max * Decimal::from(BAR_WIDTH)).round().to_usize().unwrap_or(0);
    "█".repeat(len)
}

/// The snapshot with weights and a market-cap distribution bar per symbol.
pub fn composition_table(constituents: &[WeightedConstituent]) -> Table {
    let mut table = new_table(&["Symbol", "Market Cap", "Price", "Weight (%)", "Distribution"]);
    let largest = constituents.iter().map(|c| c.market_cap).max().unwrap_or(Decimal::ZERO);
    for c in constituents {
        table.add_row(vec![
            Cell::new(&c.symbol),
            Cell::new(c.market_cap.round_dp(0)).set_alignment(CellAlignment::Right),
            num(c.price),
            num(c.weight_pct),
            Cell::new(bar(c.market_cap, largest)),
        ]);
    }
    table
}

pub fn row_counts_table(counts: &[(DbTable, i64)]) -> Table {
    let mut table = new_table(&["Table", "Rows"]);
    for (name, rows) in counts {
        table.add_row(vec![
            Cell::new(name.name()),
            Cell::new(rows).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn changes_table(changes: &[CompositionChange]) -> Table {
    let mut table = new_table(&["Date", "Added", "Removed", "Changes"]);
    for change in changes {
        table.add_row(vec![
            change.date.to_string(),
            change.added.join(", "),
            change.removed.join(", "),
            change.count().to_string(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn summary_renders_dashes_when_empty() {
        let summary = IndexSummary {
            cumulative_return: None,
            average_daily_change_pct: None,
            total_composition_changes: 0,
            observations: 0,
        };
        let rendered = summary_table(&summary).to_string();
        assert!(rendered.contains("Cumulative Return"));
        assert!(rendered.contains('-'));
    }

    #[test]
    fn performance_rows_show_percentages() {
        let points = vec![PerformancePoint {
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            daily_return: dec!(0.0125),
            cumulative_return: dec!(0.0125),
            daily_change_pct: dec!(1.25),
        }];
        let rendered = performance_table(&points).to_string();
        assert!(rendered.contains("2025-03-14"));
        assert!(rendered.contains("1.25%"));
    }

    #[test]
    fn composition_bars_scale_to_the_largest_cap() {
        let constituents = vec![
            WeightedConstituent {
                symbol: "AAPL".into(),
                market_cap: dec!(300),
                price: dec!(110),
                weight_pct: dec!(75),
            },
            WeightedConstituent {
                symbol: "NVDA".into(),
                market_cap: dec!(100),
                price: dec!(45),
                weight_pct: dec!(25),
            },
        ];
        assert_eq!(bar(dec!(300), dec!(300)).chars().count(), 30);
        assert_eq!(bar(dec!(100), dec!(300)).chars().count(), 10);
        assert_eq!(bar(dec!(5), Decimal::ZERO), "");

        let rendered = composition_table(&constituents).to_string();
        assert!(rendered.contains("Distribution"));
        assert!(rendered.contains(&"█".repeat(30)));
    }

    #[test]
    fn row_counts_name_each_table() {
        let rendered = row_counts_table(&[(DbTable::Stocks, 4), (DbTable::IndexPerformance, 2)]).to_string();
        assert!(rendered.contains("stocks"));
        assert!(rendered.contains("index_performance"));
    }

    #[test]
    fn changes_list_added_and_removed() {
        let changes = vec![CompositionChange {
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            added: vec!["NVDA".into()],
            removed: vec!["MSFT".into()],
        }];
        let rendered = changes_table(&changes).to_string();
        assert!(rendered.contains("NVDA"));
        assert!(rendered.contains("MSFT"));
    }
}
