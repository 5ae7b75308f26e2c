//! DuckDB connection, secret and query helpers.
//!
//! Everything here is a thin wrapper: SQL execution, credential storage and
//! remote file access are done by the engine.

pub mod connection;
pub mod frame;
pub mod query;
pub mod secrets;

use std::cell::Cell;

use duckdb::vtab::arrow::ArrowVTab;
use duckdb::Connection;

use crate::error::DrDuckError;

/// Name the Arrow table function is registered under for dataframe inserts.
pub(crate) const ARROW_SCAN_FUNCTION: &str = "dr_duck_arrow";

/// An open engine connection plus the per-connection state the helpers need.
#[derive(Debug)]
pub struct Session {
    conn: Connection,
    arrow_scan_registered: Cell<bool>,
}

impl Session {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            arrow_scan_registered: Cell::new(false),
        }
    }

    /// Fresh in-memory database with no secrets.
    pub fn in_memory() -> Result<Self, DrDuckError> {
        let conn = Connection::open_in_memory()
            .map_err(|source| DrDuckError::query(":memory:", source))?;
        Ok(Self::new(conn))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Run one or more statements that produce no result set.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DrDuckError> {
        self.conn
            .execute_batch(sql)
            .map_err(|source| DrDuckError::query(sql, source))
    }

    /// Register the Arrow scan table function once per connection.
    pub(crate) fn ensure_arrow_scan(&self) -> Result<(), DrDuckError> {
        if self.arrow_scan_registered.get() {
            return Ok(());
        }
        self.conn
            .register_table_function::<ArrowVTab>(ARROW_SCAN_FUNCTION)
            .map_err(|source| DrDuckError::query(ARROW_SCAN_FUNCTION, source))?;
        self.arrow_scan_registered.set(true);
        Ok(())
    }
}

impl From<Connection> for Session {
    fn from(conn: Connection) -> Self {
        Session::new(conn)
    }
}
