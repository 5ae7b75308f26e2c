use std::path::PathBuf;

use duckdb::Connection;
use tracing::info;

use crate::error::DrDuckError;

use super::secrets::{setup_hf_secret, setup_s3_secret, S3Credentials};
use super::Session;

/// What to open and which credentials to register on the new connection.
#[derive(Clone, Debug, Default)]
pub struct ConnectionOptions {
    /// Database file; `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    pub hf_token: Option<String>,
    pub s3: Option<S3Credentials>,
    pub motherduck_token: Option<String>,
}

/// Open a local (file or in-memory) database and register configured secrets.
pub fn open_local(options: &ConnectionOptions) -> Result<Session, DrDuckError> {
    let conn = match options.path.as_ref() {
        Some(path) => {
            info!(path = %path.display(), "opening database");
            Connection::open(path)
                .map_err(|source| DrDuckError::query(&path.display().to_string(), source))?
        }
        None => {
            info!("opening in-memory database");
            Connection::open_in_memory().map_err(|source| DrDuckError::query(":memory:", source))?
        }
    };
    register_secrets(Session::new(conn), options)
}

/// Open a MotherDuck database and register configured secrets.
pub fn open_motherduck(options: &ConnectionOptions) -> Result<Session, DrDuckError> {
    let token = options
        .motherduck_token
        .as_deref()
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| {
            DrDuckError::Config("MOTHERDUCK_TOKEN not found in environment or .env file".to_string())
        })?;

    info!("opening MotherDuck database");
    let conn = Connection::open(motherduck_dsn(token))
        .map_err(|source| DrDuckError::query("md:", source))?;
    register_secrets(Session::new(conn), options)
}

pub(crate) fn motherduck_dsn(token: &str) -> String {
    format!("md:?motherduck_token={token}")
}

fn register_secrets(session: Session, options: &ConnectionOptions) -> Result<Session, DrDuckError> {
    if let Some(token) = options.hf_token.as_deref() {
        setup_hf_secret(&session, token)?;
    }
    if let Some(credentials) = options.s3.as_ref() {
        setup_s3_secret(&session, credentials)?;
    }
    Ok(session)
}
