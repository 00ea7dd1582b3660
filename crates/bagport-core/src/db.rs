// crates/bagport-core/src/db.rs

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{ExportError, Result};

/// Opens a pool over an existing BAG SQLite database.
///
/// The file must already exist; a missing or unreadable database surfaces as
/// `SourceUnavailable` before any table is touched. The pool is the one
/// long-lived handle of a run and is passed explicitly to every stage.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false);

    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(ExportError::SourceUnavailable)
}

/// Double-quote an identifier for interpolation into SQL. SQLite table and
/// column names come out of `sqlite_master`, so they can be arbitrary text.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quote_ident("pand"), "\"pand\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[tokio::test]
    async fn connect_refuses_missing_database() {
        let path = std::env::temp_dir().join("bagport-does-not-exist.sqlite");
        let err = connect(&path).await.unwrap_err();
        assert!(matches!(err, ExportError::SourceUnavailable(_)));
    }
}
