// crates/bagport-core/src/maintenance.rs
//
// Post-export maintenance: drop loader tables that are no longer needed and
// reclaim the space. Runs out of band from the export pipeline, which must
// work against a database this has already compacted.

use sqlx::SqlitePool;
use tracing::info;

use crate::db::quote_ident;
use crate::error::Result;

/// Drops each named table if it exists. Returns how many actually existed.
pub async fn drop_stale_tables(pool: &SqlitePool, tables: &[String]) -> Result<usize> {
    let mut dropped = 0;
    for table in tables {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
            .execute(pool)
            .await?;

        if count > 0 {
            info!(table = %table, "dropped stale table");
            dropped += 1;
        }
    }
    Ok(dropped)
}

/// Compacts the database file. SQLite refuses to VACUUM inside a
/// transaction, so this runs as a standalone statement.
pub async fn vacuum(pool: &SqlitePool) -> Result<()> {
    sqlx::query("VACUUM").execute(pool).await?;
    info!("database compacted");
    Ok(())
}
