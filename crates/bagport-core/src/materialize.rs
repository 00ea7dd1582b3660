// crates/bagport-core/src/materialize.rs
//
// Snapshots one source table into a per-connection temp working copy, reads
// the working copy into a typed frame, and repairs coerced columns. The
// working copy is dropped on every exit path.

use polars::prelude::*;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, TypeInfo, ValueRef};
use tracing::{debug, warn};

use crate::coerce;
use crate::db::{quote_ident, quote_literal};
use crate::error::{ExportError, Result};
use crate::progress::ProgressSink;

const PROGRESS_EVERY: usize = 50_000;

/// Working-copy names are scoped by source table so that two in-flight table
/// pipelines can never collide, even on a shared connection.
pub fn working_copy_name(table: &str) -> String {
    format!("wc_{table}")
}

/// Materializes `table` into a typed frame.
///
/// The whole sequence runs on one pooled connection because SQLite temp
/// tables are connection-local. A failed drop after an otherwise successful
/// materialization is surfaced to the caller; a failed drop following an
/// earlier error is logged and the original error wins.
pub async fn materialize(
    conn: &mut PoolConnection<Sqlite>,
    table: &str,
    progress: &dyn ProgressSink,
) -> Result<DataFrame> {
    let wc = working_copy_name(table);
    sqlx::query(&format!(
        "CREATE TEMP TABLE {} AS SELECT * FROM {}",
        quote_ident(&wc),
        quote_ident(table)
    ))
    .execute(&mut **conn)
    .await?;
    debug!(table, working_copy = %wc, "created working copy");

    let loaded = load_frame(conn, table, &wc, progress).await;
    let dropped = sqlx::query(&format!("DROP TABLE temp.{}", quote_ident(&wc)))
        .execute(&mut **conn)
        .await;

    match (loaded, dropped) {
        (Ok(frame), Ok(_)) => Ok(frame),
        (Ok(_), Err(drop_err)) => Err(ExportError::from(drop_err)),
        (Err(err), Ok(_)) => Err(err),
        (Err(err), Err(drop_err)) => {
            warn!(table, error = %drop_err, "failed to drop working copy after error");
            Err(err)
        }
    }
}

async fn load_frame(
    conn: &mut PoolConnection<Sqlite>,
    table: &str,
    wc: &str,
    progress: &dyn ProgressSink,
) -> Result<DataFrame> {
    let names = column_names(conn, wc).await?;

    let rows = sqlx::query(&format!("SELECT * FROM temp.{}", quote_ident(wc)))
        .fetch_all(&mut **conn)
        .await?;
    let total = rows.len();

    let mut cells: Vec<Vec<Cell>> = names
        .iter()
        .map(|_| Vec::with_capacity(total))
        .collect();

    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, name) in names.iter().enumerate() {
            cells[col_idx].push(decode_cell(row, col_idx, table, name)?);
        }
        if (row_idx + 1) % PROGRESS_EVERY == 0 {
            progress.update((row_idx + 1) as u64, total as u64, table);
        }
    }

    let columns = names
        .iter()
        .zip(cells)
        .map(|(name, column)| build_series(name, column).into_column())
        .collect();
    let mut frame = DataFrame::new(columns)?;

    let coerced: Vec<Series> = frame
        .get_columns()
        .iter()
        .filter_map(|column| {
            coerce::coerce_series(table, column.as_materialized_series()).transpose()
        })
        .collect::<Result<_>>()?;
    for series in coerced {
        frame.with_column(series)?;
    }

    debug!(table, rows = frame.height(), columns = frame.width(), "materialized table");
    Ok(frame)
}

async fn column_names(conn: &mut PoolConnection<Sqlite>, wc: &str) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(&format!(
        "SELECT name FROM pragma_table_info({}) ORDER BY cid",
        quote_literal(wc)
    ))
    .fetch_all(&mut **conn)
    .await?;
    Ok(names)
}

/// One SQLite value, keyed by its runtime storage class.
enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

fn decode_cell(row: &SqliteRow, index: usize, table: &str, column: &str) -> Result<Cell> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Cell::Null);
    }
    match raw.type_info().name() {
        "INTEGER" => Ok(Cell::Int(row.try_get(index)?)),
        "REAL" => Ok(Cell::Float(row.try_get(index)?)),
        "TEXT" => Ok(Cell::Text(row.try_get(index)?)),
        other => Err(ExportError::UnsupportedColumn {
            table: table.to_string(),
            column: column.to_string(),
            class: other.to_string(),
        }),
    }
}

/// SQLite columns are dynamically typed, so a column's frame type is the
/// widest storage class observed: Int < Float < Text. A column of nothing
/// but nulls becomes an all-null text column.
fn build_series(name: &str, cells: Vec<Cell>) -> Series {
    #[derive(Clone, Copy, PartialEq, PartialOrd)]
    enum Widest {
        Unknown,
        Int,
        Float,
        Text,
    }

    let mut widest = Widest::Unknown;
    for cell in &cells {
        let observed = match cell {
            Cell::Null => Widest::Unknown,
            Cell::Int(_) => Widest::Int,
            Cell::Float(_) => Widest::Float,
            Cell::Text(_) => Widest::Text,
        };
        if observed > widest {
            widest = observed;
        }
    }

    match widest {
        Widest::Unknown => Series::full_null(name.into(), cells.len(), &DataType::String),
        Widest::Int => {
            let values: Vec<Option<i64>> = cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Int(v) => Some(v),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        Widest::Float => {
            let values: Vec<Option<f64>> = cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Int(v) => Some(v as f64),
                    Cell::Float(v) => Some(v),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        Widest::Text => {
            let values: Vec<Option<String>> = cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Null => None,
                    Cell::Int(v) => Some(v.to_string()),
                    Cell::Float(v) => Some(v.to_string()),
                    Cell::Text(v) => Some(v),
                })
                .collect();
            Series::new(name.into(), values)
        }
    }
}
