use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to prepare the database location {path}: {source}")]
    StoragePath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Database operation failed: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Value in column '{column}' cannot be represented: {value}")]
    Conversion { column: &'static str, value: String },
}
