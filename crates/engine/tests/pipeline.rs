use analytics::{composition_weights, AnalyticsError};
use api_client::{ApiError, HistorySource, QuoteSource, UniverseSource};
use async_trait::async_trait;
use chrono::NaiveDate;
use configuration::Config;
use core_types::{PriceBar, Quote, WeightingScheme};
use database::{DbRepository, Table};
use engine::{EngineError, IndexPipeline, RunLock};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

// --- In-memory sources ---

struct StaticUniverse(Option<Vec<&'static str>>);

#[async_trait]
impl UniverseSource for StaticUniverse {
    async fn fetch_universe(&self) -> Result<Vec<String>, ApiError> {
        match &self.0 {
            Some(symbols) => Ok(symbols.iter().map(|s| s.to_string()).collect()),
            None => Err(ApiError::ApiError("code 429: rate limited".into())),
        }
    }
}

/// Quotes keyed by symbol; `FAIL` errors and anything unknown has no quote.
struct StaticQuotes(HashMap<&'static str, (Decimal, Decimal)>);

#[async_trait]
impl QuoteSource for StaticQuotes {
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>, ApiError> {
        if symbol == "FAIL" {
            return Err(ApiError::ApiError("HTTP 500".into()));
        }
        Ok(self.0.get(symbol).map(|(market_cap, price)| Quote {
            symbol: symbol.to_string(),
            market_cap: *market_cap,
            price: *price,
        }))
    }
}

/// Closes keyed by symbol, one bar per (day, close). Records every request.
struct StaticHistory {
    closes: HashMap<&'static str, Vec<(u32, Decimal)>>,
    requested: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl StaticHistory {
    fn new(closes: HashMap<&'static str, Vec<(u32, Decimal)>>) -> Self {
        Self { closes, requested: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl HistorySource for StaticHistory {
    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ApiError> {
        self.requested.lock().unwrap().push((symbol.to_string(), start, end));
        if symbol == "FAIL" {
            return Err(ApiError::ApiError("HTTP 500".into()));
        }
        Ok(self
            .closes
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .map(|(day, close)| PriceBar {
                        date: date(*day),
                        ticker: symbol.to_string(),
                        open: *close,
                        high: *close,
                        low: *close,
                        close: *close,
                        volume: 1_000,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

// --- Fixtures ---

fn config(db_path: &Path) -> Config {
    let mut config = Config::default();
    config.storage.database_path = db_path.to_path_buf();
    config
}

fn default_quotes() -> StaticQuotes {
    StaticQuotes(HashMap::from([
        ("AAPL", (dec!(300), dec!(110))),
        ("MSFT", (dec!(100), dec!(45))),
    ]))
}

fn default_history() -> StaticHistory {
    StaticHistory::new(HashMap::from([
        ("AAPL", vec![(13, dec!(100)), (14, dec!(110))]),
        ("MSFT", vec![(13, dec!(50)), (14, dec!(45))]),
    ]))
}

fn pipeline(
    config: Config,
    universe: StaticUniverse,
    quotes: StaticQuotes,
    history: Arc<StaticHistory>,
) -> IndexPipeline {
    IndexPipeline::new(config, Arc::new(universe), Arc::new(quotes), history).with_progress(false)
}

async fn open(db_path: &Path) -> DbRepository {
    DbRepository::new(database::connect(db_path).await.unwrap())
}

// --- Tests ---

#[tokio::test]
async fn two_runs_append_two_performance_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("stock_data.sqlite");

    for day in [15, 16] {
        let summary = pipeline(
            config(&db_path),
            StaticUniverse(Some(vec!["AAPL", "MSFT"])),
            default_quotes(),
            Arc::new(default_history()),
        )
        .with_as_of(date(day))
        .run()
        .await
        .unwrap();

        assert_eq!(summary.recorded.date, date(day));
        assert_eq!(summary.recorded.daily_return, Decimal::ZERO);
        assert_eq!(summary.index_return.latest_date, date(14));
        assert_eq!(summary.index_return.prior_date, date(13));
        assert_eq!(summary.composition_rows, 2);
        assert_eq!(summary.history_rows, 4);
    }

    let repo = open(&db_path).await;
    assert_eq!(repo.count_rows(Table::IndexPerformance).await.unwrap(), 2);
    assert_eq!(repo.count_rows(Table::Stocks).await.unwrap(), 4);

    let latest = repo.latest_composition_date().await.unwrap().unwrap();
    assert_eq!(latest, date(16));
    let weights = composition_weights(&repo.composition_for_date(latest).await.unwrap());
    let total: Decimal = weights.iter().map(|w| w.weight_pct).sum();
    assert!((total - dec!(100)).abs() < dec!(0.0001));
    assert_eq!(weights[0].symbol, "AAPL");

    assert!(RunLock::acquire(&db_path).is_ok());
}

#[tokio::test]
async fn market_cap_weighting_uses_latest_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stock_data.sqlite");
    let mut config = config(&db_path);
    config.index.weighting = WeightingScheme::MarketCap;

    let summary = pipeline(
        config,
        StaticUniverse(Some(vec!["AAPL", "MSFT"])),
        default_quotes(),
        Arc::new(default_history()),
    )
    .with_as_of(date(15))
    .run()
    .await
    .unwrap();

    // (300 * 0.10 + 100 * -0.10) / 400
    assert!((summary.recorded.daily_return - dec!(0.05)).abs() < dec!(0.0000001));
    assert_eq!(summary.index_return.weighting, WeightingScheme::MarketCap);
}

#[tokio::test]
async fn universe_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stock_data.sqlite");
    let history = Arc::new(default_history());

    let err = pipeline(config(&db_path), StaticUniverse(None), default_quotes(), history.clone())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UniverseUnavailable(_)));

    let repo = open(&db_path).await;
    for table in Table::ALL {
        assert_eq!(repo.count_rows(table).await.unwrap(), 0);
    }
    assert!(history.requested.lock().unwrap().is_empty());
    assert!(RunLock::acquire(&db_path).is_ok());
}

#[tokio::test]
async fn empty_universe_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stock_data.sqlite");

    let err = pipeline(
        config(&db_path),
        StaticUniverse(Some(vec![])),
        default_quotes(),
        Arc::new(default_history()),
    )
    .run()
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::EmptyUniverse));
}

#[tokio::test]
async fn single_price_date_records_no_performance() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stock_data.sqlite");
    let history = StaticHistory::new(HashMap::from([
        ("AAPL", vec![(14, dec!(110))]),
        ("MSFT", vec![(14, dec!(45))]),
    ]));

    let err = pipeline(
        config(&db_path),
        StaticUniverse(Some(vec!["AAPL", "MSFT"])),
        default_quotes(),
        Arc::new(history),
    )
    .with_as_of(date(15))
    .run()
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Analytics(AnalyticsError::InsufficientHistory { found: 1 })
    ));

    let repo = open(&db_path).await;
    assert_eq!(repo.count_rows(Table::IndexPerformance).await.unwrap(), 0);
    assert_eq!(repo.count_rows(Table::HistoricalPrices).await.unwrap(), 2);
}

#[tokio::test]
async fn failing_and_empty_symbols_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stock_data.sqlite");

    let summary = pipeline(
        config(&db_path),
        StaticUniverse(Some(vec!["AAPL", "FAIL", "MSFT", "NOCAP"])),
        default_quotes(),
        Arc::new(default_history()),
    )
    .with_as_of(date(15))
    .run()
    .await
    .unwrap();

    assert_eq!(summary.selected, 4);
    assert_eq!(summary.composition_rows, 2);
    assert_eq!(summary.skipped_quotes, vec!["FAIL", "NOCAP"]);
    assert_eq!(summary.skipped_history, vec!["FAIL", "NOCAP"]);
    assert_eq!(summary.index_return.constituents, 2);
    assert_eq!(summary.recorded.daily_return, Decimal::ZERO);
}

#[tokio::test]
async fn only_top_n_symbols_are_fetched_over_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stock_data.sqlite");
    let mut config = config(&db_path);
    config.universe.top_n = 2;
    let history = Arc::new(default_history());

    let summary = pipeline(
        config,
        StaticUniverse(Some(vec!["AAPL", "MSFT", "NVDA"])),
        default_quotes(),
        history.clone(),
    )
    .with_as_of(date(31))
    .run()
    .await
    .unwrap();

    assert_eq!(summary.universe_size, 3);
    assert_eq!(summary.selected, 2);

    let requested = history.requested.lock().unwrap();
    let symbols: Vec<&str> = requested.iter().map(|(s, _, _)| s.as_str()).collect();
    assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    assert_eq!(requested[0].1, date(1));
    assert_eq!(requested[0].2, date(31));
}

#[tokio::test]
async fn lock_left_by_a_killed_run_does_not_block() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stock_data.sqlite");
    std::fs::write(RunLock::path_for(&db_path), "999999\n").unwrap();

    let summary = pipeline(
        config(&db_path),
        StaticUniverse(Some(vec!["AAPL", "MSFT"])),
        default_quotes(),
        Arc::new(default_history()),
    )
    .with_as_of(date(15))
    .run()
    .await
    .unwrap();

    assert_eq!(summary.recorded.date, date(15));
}

#[tokio::test]
async fn concurrent_run_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stock_data.sqlite");
    let _held = RunLock::acquire(&db_path).unwrap();

    let err = pipeline(
        config(&db_path),
        StaticUniverse(Some(vec!["AAPL"])),
        default_quotes(),
        Arc::new(default_history()),
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::RunInProgress(_)));
    assert!(!db_path.exists());
}
