use crate::error::DbError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// DDL run on every start. Column names follow the stored layout other tools
/// already read (`Date`, `Symbol`, `MarketCap`, ...).
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stocks (
        Date DATE,
        Symbol TEXT,
        MarketCap REAL,
        Price REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS historical_prices (
        Date TEXT,
        Ticker TEXT,
        Open REAL,
        High REAL,
        Low REAL,
        Close REAL,
        Volume INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS index_performance (
        Date DATE,
        daily_return REAL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_stocks_date ON stocks(Date)",
    "CREATE INDEX IF NOT EXISTS idx_historical_prices_date ON historical_prices(Date)",
];

/// Opens the SQLite database at `path`, creating the file and its parent
/// directory when they do not exist yet.
///
/// The pool holds a single connection: one run is the only writer, and every
/// append is its own durability point.
pub async fn connect(path: &Path) -> Result<SqlitePool, DbError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| DbError::StoragePath {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    tracing::debug!(path = %path.display(), "Connected to index database.");
    Ok(pool)
}

/// A private in-memory database, used by the test suites.
///
/// The single connection is never recycled, since closing it would discard
/// the database.
pub async fn connect_in_memory() -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Creates the three tables (and their date indexes) if they are absent.
///
/// Safe to call on every run; existing tables and rows are left untouched.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), DbError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("stock_data.sqlite");

        let pool = connect(&path).await.unwrap();
        init_schema(&pool).await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn schema_survives_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_data.sqlite");

        let pool = connect(&path).await.unwrap();
        init_schema(&pool).await.unwrap();
        sqlx::query("INSERT INTO index_performance (Date, daily_return) VALUES ('2025-01-02', 0.01)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let pool = connect(&path).await.unwrap();
        init_schema(&pool).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM index_performance")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
