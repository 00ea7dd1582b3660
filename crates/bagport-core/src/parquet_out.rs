// crates/bagport-core/src/parquet_out.rs

use std::fs::File;
use std::path::Path;

use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::DataFrame;

use crate::error::{ExportError, Result};

/// Serializes a frame to parquet at `path`, overwriting any existing file.
///
/// Column names and coerced dtypes are carried into the embedded schema;
/// downstream consumers rely on the numeric columns being actually typed.
/// Returns the number of bytes written.
pub fn write_dataframe(table: &str, frame: &mut DataFrame, path: &Path) -> Result<u64> {
    let file = File::create(path).map_err(|err| ExportError::WriteFailure {
        table: table.to_string(),
        source: err.into(),
    })?;

    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(None))
        .with_statistics(StatisticsOptions::default())
        .finish(frame)
        .map_err(|err| ExportError::WriteFailure {
            table: table.to_string(),
            source: err,
        })
}
