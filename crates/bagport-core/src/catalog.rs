// crates/bagport-core/src/catalog.rs

use sqlx::SqlitePool;

use crate::error::Result;

/// Lists user tables in name order.
///
/// Internal SQLite objects (`sqlite_sequence`, `sqlite_stat1`, ...) are
/// excluded, as are views and indexes. Name order is only there to make runs
/// and logs deterministic; table processing order carries no semantics.
pub async fn list_user_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        r#"
        SELECT name FROM sqlite_master
        WHERE type = 'table'
          AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(names)
}
