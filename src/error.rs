use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dr-duck operations.
#[derive(Debug, Error)]
pub enum DrDuckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {what} '{input}': {message}")]
    Validation {
        what: &'static str,
        input: String,
        message: String,
    },

    #[error("Not found in {repo_id}: {message}")]
    NotFound { repo_id: String, message: String },

    #[error("Failed fetching '{path}' from {repo_id}: {message}")]
    Fetch {
        repo_id: String,
        path: String,
        message: String,
    },

    /// Engine errors are displayed verbatim.
    #[error("{source}")]
    Query {
        sql: String,
        #[source]
        source: duckdb::Error,
    },

    #[error("Dataframe error: {0}")]
    Frame(#[from] duckdb::arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache path {path} is not usable: {message}")]
    Cache { path: PathBuf, message: String },
}

impl DrDuckError {
    pub(crate) fn validation(
        what: &'static str,
        input: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DrDuckError::Validation {
            what,
            input: input.into(),
            message: message.into(),
        }
    }

    pub(crate) fn query(sql: &str, source: duckdb::Error) -> Self {
        DrDuckError::Query {
            sql: sql.to_string(),
            source,
        }
    }
}
