//! Query helpers returning [`DataFrame`]s.
//!
//! SQL templates may contain a `{table}` placeholder that is replaced with a
//! table expression (a quoted path, a `read_parquet([...])` call, ...).

use std::path::{Path, PathBuf};

use duckdb::vtab::arrow_recordbatch_to_query_params;
use duckdb::arrow::record_batch::RecordBatch;
use tracing::{debug, warn};

use crate::error::DrDuckError;

use super::frame::DataFrame;
use super::{Session, ARROW_SCAN_FUNCTION};

/// Placeholder replaced by the table expression in SQL templates.
pub const TABLE_PLACEHOLDER: &str = "{table}";

/// Template used when no SQL is given: every row and column, unmodified.
pub const DEFAULT_QUERY_TEMPLATE: &str = "SELECT * FROM {table}";

/// Quote `value` as a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Substitute `table` into `sql` (or the default template).
pub fn render_template(sql: Option<&str>, table: &str) -> String {
    sql.unwrap_or(DEFAULT_QUERY_TEMPLATE)
        .replace(TABLE_PLACEHOLDER, table)
}

/// `read_parquet([...])` over all `paths`, read as one unioned table.
pub fn parquet_table_expr<P: AsRef<Path>>(paths: &[P]) -> String {
    let quoted: Vec<String> = paths
        .iter()
        .map(|path| quote_literal(&path.as_ref().to_string_lossy()))
        .collect();
    format!("read_parquet([{}])", quoted.join(", "))
}

/// Execute `sql` and collect the full result.
///
/// Engine errors (syntax, unknown columns, missing files) are returned as
/// [`DrDuckError::Query`] with the engine's message unchanged.
pub fn query_to_df(session: &Session, sql: &str) -> Result<DataFrame, DrDuckError> {
    debug!(sql, "executing query");
    let mut stmt = session
        .connection()
        .prepare(sql)
        .map_err(|source| DrDuckError::query(sql, source))?;
    let arrow = stmt
        .query_arrow([])
        .map_err(|source| DrDuckError::query(sql, source))?;
    let schema = arrow.get_schema();
    let batches: Vec<RecordBatch> = arrow.collect();
    Ok(DataFrame::new(schema, batches))
}

/// Query a parquet file, glob or remote URL through the engine.
pub fn query_parquet(
    session: &Session,
    path: &str,
    sql: Option<&str>,
) -> Result<DataFrame, DrDuckError> {
    query_to_df(session, &render_template(sql, &quote_literal(path)))
}

/// Query several local parquet files as one table.
pub fn query_parquet_files(
    session: &Session,
    paths: &[PathBuf],
    sql: Option<&str>,
) -> Result<DataFrame, DrDuckError> {
    if paths.is_empty() {
        return Err(DrDuckError::validation(
            "parquet file list",
            "[]",
            "at least one file is required",
        ));
    }
    query_to_df(session, &render_template(sql, &parquet_table_expr(paths)))
}

pub fn list_tables(session: &Session) -> Result<DataFrame, DrDuckError> {
    query_to_df(session, "SHOW TABLES")
}

pub fn describe_table(session: &Session, table: &str) -> Result<DataFrame, DrDuckError> {
    query_to_df(session, &format!("DESCRIBE {table}"))
}

/// Append the rows of `frame` to an existing table.
///
/// All batches are written in one transaction: on error the table is left as
/// it was.
pub fn insert_df(session: &Session, frame: &DataFrame, table: &str) -> Result<(), DrDuckError> {
    session.ensure_arrow_scan()?;
    let sql = format!("INSERT INTO {table} SELECT * FROM {ARROW_SCAN_FUNCTION}(?, ?)");
    in_transaction(session, || {
        for batch in frame.batches() {
            execute_with_batch(session, &sql, batch.clone())?;
        }
        Ok(())
    })?;
    debug!(table, rows = frame.height(), "inserted dataframe");
    Ok(())
}

/// Create `table` from `frame`. Without `replace` an existing table is an error.
///
/// Runs in one transaction, so a failure never leaves a half-filled table or
/// drops the table being replaced.
pub fn create_table_from_df(
    session: &Session,
    frame: &DataFrame,
    table: &str,
    replace: bool,
) -> Result<(), DrDuckError> {
    session.ensure_arrow_scan()?;
    let create = if replace {
        "CREATE OR REPLACE TABLE"
    } else {
        "CREATE TABLE"
    };
    let sql = format!("{create} {table} AS SELECT * FROM {ARROW_SCAN_FUNCTION}(?, ?)");
    let insert = format!("INSERT INTO {table} SELECT * FROM {ARROW_SCAN_FUNCTION}(?, ?)");

    in_transaction(session, || {
        let mut batches = frame.batches().iter();
        let first = batches
            .next()
            .cloned()
            .unwrap_or_else(|| RecordBatch::new_empty(frame.schema().clone()));
        execute_with_batch(session, &sql, first)?;
        for batch in batches {
            execute_with_batch(session, &insert, batch.clone())?;
        }
        Ok(())
    })?;
    debug!(table, rows = frame.height(), replace, "created table from dataframe");
    Ok(())
}

/// Run `body` between `BEGIN TRANSACTION` and `COMMIT`, rolling back on error.
fn in_transaction<T>(
    session: &Session,
    body: impl FnOnce() -> Result<T, DrDuckError>,
) -> Result<T, DrDuckError> {
    session.execute_batch("BEGIN TRANSACTION")?;
    match body() {
        Ok(value) => {
            session.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = session.execute_batch("ROLLBACK") {
                warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

fn execute_with_batch(session: &Session, sql: &str, batch: RecordBatch) -> Result<(), DrDuckError> {
    let params = arrow_recordbatch_to_query_params(batch);
    let mut stmt = session
        .connection()
        .prepare(sql)
        .map_err(|source| DrDuckError::query(sql, source))?;
    stmt.execute(params)
        .map_err(|source| DrDuckError::query(sql, source))?;
    Ok(())
}
