use crate::DbError;
use chrono::NaiveDate;
use core_types::{ClosePrice, CompositionEntry, PerformanceRecord, PriceBar};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::QueryBuilder;
use std::collections::HashSet;

/// The three append-only tables of the index database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Stocks,
    HistoricalPrices,
    IndexPerformance,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Stocks, Table::HistoricalPrices, Table::IndexPerformance];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Stocks => "stocks",
            Table::HistoricalPrices => "historical_prices",
            Table::IndexPerformance => "index_performance",
        }
    }
}

/// The `DbRepository` provides a high-level, application-specific interface
/// to the database. It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: SqlitePool,
}

fn to_real(value: Decimal, column: &'static str) -> Result<f64, DbError> {
    value.to_f64().ok_or_else(|| DbError::Conversion { column, value: value.to_string() })
}

fn from_real(value: f64, column: &'static str) -> Result<Decimal, DbError> {
    Decimal::from_f64(value).ok_or_else(|| DbError::Conversion { column, value: value.to_string() })
}

/// Collapses repeated (Date, Symbol) pairs to their last occurrence, keeping
/// the survivors in their original relative order.
fn dedup_keep_last(entries: &[CompositionEntry]) -> Vec<&CompositionEntry> {
    let mut seen = HashSet::new();
    let mut kept: Vec<&CompositionEntry> = entries
        .iter()
        .rev()
        .filter(|entry| seen.insert((entry.date, entry.symbol.as_str())))
        .collect();
    kept.reverse();
    kept
}

impl DbRepository {
    /// Creates a new `DbRepository` over an already-connected pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- Appends ---

    /// Appends one composition snapshot batch and returns the number of rows written.
    ///
    /// Duplicates inside `entries` collapse to the last occurrence. Rows already
    /// stored by earlier runs are not consulted.
    pub async fn append_composition(&self, entries: &[CompositionEntry]) -> Result<usize, DbError> {
        let rows = dedup_keep_last(entries);
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for entry in &rows {
            sqlx::query("INSERT INTO stocks (Date, Symbol, MarketCap, Price) VALUES (?1, ?2, ?3, ?4)")
                .bind(entry.date)
                .bind(&entry.symbol)
                .bind(to_real(entry.market_cap, "MarketCap")?)
                .bind(to_real(entry.price, "Price")?)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(rows.len())
    }

    /// Appends daily bars exactly as received. Repeated (Date, Ticker) pairs are
    /// stored again; readers resolve them by keeping the last one.
    pub async fn append_historical_prices(&self, bars: &[PriceBar]) -> Result<usize, DbError> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for bar in bars {
            sqlx::query(
                r#"
                INSERT INTO historical_prices (Date, Ticker, Open, High, Low, Close, Volume)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(bar.date)
            .bind(&bar.ticker)
            .bind(to_real(bar.open, "Open")?)
            .bind(to_real(bar.high, "High")?)
            .bind(to_real(bar.low, "Low")?)
            .bind(to_real(bar.close, "Close")?)
            .bind(bar.volume)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(bars.len())
    }

    /// Inserts exactly one performance row.
    pub async fn append_performance(&self, record: &PerformanceRecord) -> Result<(), DbError> {
        sqlx::query("INSERT INTO index_performance (Date, daily_return) VALUES (?1, ?2)")
            .bind(record.date)
            .bind(to_real(record.daily_return, "daily_return")?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Reads used by the index calculation ---

    /// The most recent distinct dates present in `historical_prices`, newest first.
    pub async fn latest_price_dates(&self, limit: u32) -> Result<Vec<NaiveDate>, DbError> {
        let rows: Vec<(NaiveDate,)> = sqlx::query_as(
            "SELECT DISTINCT Date FROM historical_prices WHERE Date IS NOT NULL ORDER BY Date DESC LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(date,)| date).collect())
    }

    /// Every stored close on the given dates, in insertion order. Rows with a
    /// NULL close are left out.
    pub async fn closes_for_dates(&self, dates: &[NaiveDate]) -> Result<Vec<ClosePrice>, DbError> {
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT Ticker, Date, Close FROM historical_prices WHERE Date IN (");
        let mut separated = builder.separated(", ");
        for date in dates {
            separated.push_bind(*date);
        }
        separated.push_unseparated(") ORDER BY rowid ASC");

        let rows: Vec<(String, NaiveDate, Option<f64>)> =
            builder.build_query_as().fetch_all(&self.pool).await?;

        rows.into_iter()
            .filter_map(|(ticker, date, close)| close.map(|close| (ticker, date, close)))
            .map(|(ticker, date, close)| {
                Ok(ClosePrice { ticker, date, close: from_real(close, "Close")? })
            })
            .collect()
    }

    // --- Reads used by reporting ---

    /// The snapshot stored for `date`, largest market cap first.
    pub async fn composition_for_date(&self, date: NaiveDate) -> Result<Vec<CompositionEntry>, DbError> {
        let rows: Vec<(NaiveDate, String, f64, f64)> = sqlx::query_as(
            "SELECT Date, Symbol, MarketCap, Price FROM stocks WHERE Date = ?1 ORDER BY MarketCap DESC, rowid ASC",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::composition_from_row).collect()
    }

    pub async fn latest_composition_date(&self) -> Result<Option<NaiveDate>, DbError> {
        let row: Option<(NaiveDate,)> =
            sqlx::query_as("SELECT Date FROM stocks WHERE Date IS NOT NULL ORDER BY Date DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(date,)| date))
    }

    /// Distinct snapshot dates, oldest first.
    pub async fn composition_dates(&self) -> Result<Vec<NaiveDate>, DbError> {
        let rows: Vec<(NaiveDate,)> =
            sqlx::query_as("SELECT DISTINCT Date FROM stocks WHERE Date IS NOT NULL ORDER BY Date ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(date,)| date).collect())
    }

    /// Every stored snapshot row, ordered by date then insertion.
    pub async fn all_composition(&self) -> Result<Vec<CompositionEntry>, DbError> {
        let rows: Vec<(NaiveDate, String, f64, f64)> = sqlx::query_as(
            "SELECT Date, Symbol, MarketCap, Price FROM stocks ORDER BY Date ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::composition_from_row).collect()
    }

    /// The full performance log, ordered by date then insertion.
    pub async fn performance_history(&self) -> Result<Vec<PerformanceRecord>, DbError> {
        let rows: Vec<(NaiveDate, f64)> = sqlx::query_as(
            "SELECT Date, daily_return FROM index_performance ORDER BY Date ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(date, daily_return)| {
                Ok(PerformanceRecord { date, daily_return: from_real(daily_return, "daily_return")? })
            })
            .collect()
    }

    // --- Introspection ---

    /// User tables present in the database file, sorted by name.
    pub async fn table_names(&self) -> Result<Vec<String>, DbError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn count_rows(&self, table: Table) -> Result<i64, DbError> {
        let query = format!("SELECT COUNT(*) FROM {}", table.name());
        let (count,): (i64,) = sqlx::query_as(&query).fetch_one(&self.pool).await?;
        Ok(count)
    }

    fn composition_from_row(
        (date, symbol, market_cap, price): (NaiveDate, String, f64, f64),
    ) -> Result<CompositionEntry, DbError> {
        Ok(CompositionEntry {
            date,
            symbol,
            market_cap: from_real(market_cap, "MarketCap")?,
            price: from_real(price, "Price")?,
        })
    }
}
