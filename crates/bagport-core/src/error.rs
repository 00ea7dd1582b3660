// crates/bagport-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Source database unavailable: {0}")]
    SourceUnavailable(#[source] sqlx::Error),

    #[error("Table {table}: column {column} holds {value:?}, which is not a valid {expected}")]
    CoercionFailure {
        table: String,
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("Table {table}: column {column} uses unsupported storage class {class}")]
    UnsupportedColumn {
        table: String,
        column: String,
        class: String,
    },

    #[error("Table {table}: writing local parquet failed: {source}")]
    WriteFailure {
        table: String,
        #[source]
        source: polars::error::PolarsError,
    },

    #[error("Table {table}: upload failed: {source}")]
    UploadFailure {
        table: String,
        #[source]
        source: bagport_bucket::StoreError,
    },

    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

pub type Result<T> = std::result::Result<T, ExportError>;
