use crate::error::EngineError;
use crate::lock::RunLock;
use analytics::{IndexCalculator, IndexReturn};
use api_client::{
    HistorySource, QuoteSource, TwelveDataClient, UniverseSource, YahooFinanceClient,
};
use chrono::{Duration, Local, NaiveDate};
use configuration::Config;
use core_types::{CompositionEntry, PerformanceRecord, WeightingScheme};
use database::DbRepository;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// What one `update` run did, for display by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub as_of: NaiveDate,
    pub universe_size: usize,
    pub selected: usize,
    pub composition_rows: usize,
    pub skipped_quotes: Vec<String>,
    pub history_rows: usize,
    pub skipped_history: Vec<String>,
    pub index_return: IndexReturn,
    pub recorded: PerformanceRecord,
}

/// Runs one ingestion and calculation pass: universe, composition snapshot,
/// price history, daily index return.
pub struct IndexPipeline {
    config: Config,
    universe: Arc<dyn UniverseSource>,
    quotes: Arc<dyn QuoteSource>,
    history: Arc<dyn HistorySource>,
    as_of: Option<NaiveDate>,
    show_progress: bool,
}

impl IndexPipeline {
    pub fn new(
        config: Config,
        universe: Arc<dyn UniverseSource>,
        quotes: Arc<dyn QuoteSource>,
        history: Arc<dyn HistorySource>,
    ) -> Self {
        Self {
            config,
            universe,
            quotes,
            history,
            as_of: None,
            show_progress: true,
        }
    }

    /// Wires the production adapters: Twelve Data for the universe, Yahoo
    /// Finance for quotes and history.
    pub fn from_config(config: Config) -> Result<Self, EngineError> {
        config.api.require_twelve_data_key()?;
        let universe = Arc::new(TwelveDataClient::new(&config.api)?);
        let yahoo = Arc::new(YahooFinanceClient::new(&config.api)?);

        Ok(Self::new(config, universe, yahoo.clone(), yahoo))
    }

    /// Pins the snapshot and performance date instead of using today's local date.
    pub fn with_as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Executes the whole run under the configured run timeout.
    ///
    /// Only one run per database may be active; a concurrent call fails with
    /// `EngineError::RunInProgress` before touching storage. Ctrl-C ends the
    /// run with `EngineError::Interrupted` and releases the lock.
    pub async fn run(&self) -> Result<RunSummary, EngineError> {
        let _lock = RunLock::acquire(&self.config.storage.database_path)?;

        let limit = self.config.run.run_timeout();
        tokio::select! {
            outcome = tokio::time::timeout(limit, self.execute()) => match outcome {
                Ok(result) => result,
                Err(_) => Err(EngineError::Timeout(self.config.run.run_timeout_secs)),
            },
            _ = interrupted() => {
                tracing::warn!("Interrupted; abandoning the run.");
                Err(EngineError::Interrupted)
            }
        }
    }

    async fn execute(&self) -> Result<RunSummary, EngineError> {
        let as_of = self.as_of.unwrap_or_else(|| Local::now().date_naive());
        tracing::info!(%as_of, weighting = %self.config.index.weighting, "Starting index update.");

        let pool = database::connect(&self.config.storage.database_path).await?;
        database::init_schema(&pool).await?;
        let repo = DbRepository::new(pool);

        // 1. Universe. Any failure here aborts before a single row is written.
        let universe = self
            .universe
            .fetch_universe()
            .await
            .map_err(EngineError::UniverseUnavailable)?;
        if universe.is_empty() {
            return Err(EngineError::EmptyUniverse);
        }
        let selected: Vec<String> = universe.iter().take(self.config.universe.top_n).cloned().collect();
        tracing::info!(universe = universe.len(), selected = selected.len(), "Fetched ticker universe.");

        // 2. Composition snapshot.
        let (entries, skipped_quotes) = self.collect_composition(&selected, as_of).await?;
        let composition_rows = repo.append_composition(&entries).await?;
        tracing::info!(rows = composition_rows, skipped = skipped_quotes.len(), "Stored composition snapshot.");

        // 3. Price history.
        let (history_rows, skipped_history) = self.collect_history(&repo, &selected, as_of).await?;
        tracing::info!(rows = history_rows, skipped = skipped_history.len(), "Stored price history.");

        // 4. Index return.
        let calculator = IndexCalculator::new(self.config.index.weighting);
        let index_return = calculate_return(&repo, &calculator).await?;
        let recorded = record_return(&repo, as_of, index_return.daily_return).await?;

        tracing::info!(
            date = %recorded.date,
            daily_return = %recorded.daily_return,
            latest = %index_return.latest_date,
            prior = %index_return.prior_date,
            "Recorded index performance."
        );

        Ok(RunSummary {
            as_of,
            universe_size: universe.len(),
            selected: selected.len(),
            composition_rows,
            skipped_quotes,
            history_rows,
            skipped_history,
            index_return,
            recorded,
        })
    }

    async fn collect_composition(
        &self,
        symbols: &[String],
        as_of: NaiveDate,
    ) -> Result<(Vec<CompositionEntry>, Vec<String>), EngineError> {
        let progress = self.progress_bar(symbols.len(), "quotes")?;
        let mut entries = Vec::with_capacity(symbols.len());
        let mut skipped = Vec::new();

        for symbol in symbols {
            progress.set_message(symbol.clone());
            match self.quotes.fetch_quote(symbol).await {
                Ok(Some(quote)) => match quote.into_entry(as_of) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        tracing::warn!(symbol = %symbol, error = %e, "Rejected quote.");
                        skipped.push(symbol.clone());
                    }
                },
                Ok(None) => {
                    tracing::warn!(symbol = %symbol, "No market cap or price available; excluded from snapshot.");
                    skipped.push(symbol.clone());
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Failed to fetch quote.");
                    skipped.push(symbol.clone());
                }
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok((entries, skipped))
    }

    /// Fetches `[as_of − window, as_of)` for each symbol and appends each
    /// symbol's bars as soon as they arrive.
    async fn collect_history(
        &self,
        repo: &DbRepository,
        symbols: &[String],
        as_of: NaiveDate,
    ) -> Result<(usize, Vec<String>), EngineError> {
        let start = as_of - Duration::days(i64::from(self.config.universe.history_window_days));
        let progress = self.progress_bar(symbols.len(), "history")?;
        let mut rows = 0;
        let mut skipped = Vec::new();

        for symbol in symbols {
            progress.set_message(symbol.clone());
            match self.history.fetch_history(symbol, start, as_of).await {
                Ok(bars) if bars.is_empty() => {
                    tracing::warn!(symbol = %symbol, %start, end = %as_of, "No price history returned.");
                    skipped.push(symbol.clone());
                }
                Ok(bars) => rows += repo.append_historical_prices(&bars).await?,
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Failed to fetch price history.");
                    skipped.push(symbol.clone());
                }
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok((rows, skipped))
    }

    fn progress_bar(&self, len: usize, stage: &'static str) -> Result<ProgressBar, EngineError> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let progress = ProgressBar::new(len as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {prefix} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=>-"),
        );
        progress.set_prefix(stage);
        Ok(progress)
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl-C.");
        std::future::pending::<()>().await;
    }
}

/// Reads the two most recent price dates from storage and computes the index
/// return across them.
pub async fn calculate_return(
    repo: &DbRepository,
    calculator: &IndexCalculator,
) -> Result<IndexReturn, EngineError> {
    let dates = repo.latest_price_dates(2).await?;
    let closes = repo.closes_for_dates(&dates).await?;

    let composition = match calculator.weighting() {
        WeightingScheme::Equal => Vec::new(),
        WeightingScheme::MarketCap => match repo.latest_composition_date().await? {
            Some(date) => repo.composition_for_date(date).await?,
            None => Vec::new(),
        },
    };

    Ok(calculator.calculate(&closes, &composition)?)
}

/// Appends one performance row.
pub async fn record_return(
    repo: &DbRepository,
    date: NaiveDate,
    daily_return: Decimal,
) -> Result<PerformanceRecord, EngineError> {
    let record = PerformanceRecord { date, daily_return };
    repo.append_performance(&record).await?;
    Ok(record)
}
