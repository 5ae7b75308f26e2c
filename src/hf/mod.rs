//! Hugging Face Hub location, caching and query helpers.
//!
//! Resolution ([`resolve`]) and cache path arithmetic ([`cache`]) are pure.
//! Network and disk effects live in [`acquire`], which talks to the hub only
//! through the [`acquire::HubClient`] seam.

pub mod acquire;
pub mod cache;
#[cfg(feature = "hf-remote")]
pub mod client;
pub mod resolve;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use duckdb::arrow::array::{ArrayRef, StringArray};
use duckdb::arrow::datatypes::{DataType, Field, Schema};
use duckdb::arrow::record_batch::RecordBatch;

use serde::Serialize;
use tracing::info;

use crate::duck::frame::DataFrame;
use crate::duck::query::{query_parquet_files, quote_literal, render_template};
use crate::duck::Session;
use crate::error::DrDuckError;

use self::acquire::{cached_resources, download_location, HubClient};
use self::cache::CachePathMapper;

/// Branch used when no revision is given.
pub const DEFAULT_REVISION: &str = "main";

/// Pattern used when no path is given: every parquet file in the repository.
pub const DEFAULT_PATH_PATTERN: &str = "**/*.parquet";

/// Validated `<namespace>/<name>` hub repository id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HfRepoId(String);

impl HfRepoId {
    pub fn new(repo_id: &str) -> Result<Self, DrDuckError> {
        resolve::validate_repo_id(repo_id).map(HfRepoId)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> &str {
        self.0.split_once('/').map(|(ns, _)| ns).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.split_once('/').map(|(_, name)| name).unwrap_or_default()
    }
}

impl fmt::Display for HfRepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HfRepoId {
    type Err = DrDuckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HfRepoId::new(s)
    }
}

/// Where to fetch from: repository, path pattern and revision.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct HfLocation {
    repo_id: HfRepoId,
    path_pattern: String,
    revision: String,
}

impl HfLocation {
    pub(crate) fn from_parts(repo_id: HfRepoId, path_pattern: String, revision: String) -> Self {
        Self {
            repo_id,
            path_pattern,
            revision,
        }
    }

    pub fn repo_id(&self) -> &HfRepoId {
        &self.repo_id
    }

    pub fn path_pattern(&self) -> &str {
        &self.path_pattern
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn is_default_revision(&self) -> bool {
        self.revision == DEFAULT_REVISION
    }

    /// `hf://` URL readable by the engine's remote file system.
    pub fn hub_url(&self) -> String {
        let revision = if self.is_default_revision() {
            String::new()
        } else {
            format!("@{}", resolve::encode_revision(&self.revision))
        };
        format!(
            "hf://datasets/{}{}/{}",
            self.repo_id, revision, self.path_pattern
        )
    }
}

impl fmt::Display for HfLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}",
            self.repo_id, self.revision, self.path_pattern
        )
    }
}

/// A concrete remote file and the local path it is cached at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HfResource {
    pub repo_id: HfRepoId,
    pub revision: String,
    pub remote_path: String,
    pub local_path: PathBuf,
}

/// One row per resource with `repo_id`, `revision`, `remote_path` and
/// `local_path` columns, ready for any renderer.
pub fn resources_frame(resources: &[HfResource]) -> Result<DataFrame, DrDuckError> {
    let schema = Arc::new(Schema::new(
        ["repo_id", "revision", "remote_path", "local_path"]
            .into_iter()
            .map(|name| Field::new(name, DataType::Utf8, false))
            .collect::<Vec<_>>(),
    ));
    let column = |value: fn(&HfResource) -> String| -> ArrayRef {
        Arc::new(resources.iter().map(|r| Some(value(r))).collect::<StringArray>())
    };
    let batch = RecordBatch::try_new(
        schema,
        vec![
            column(|r| r.repo_id.to_string()),
            column(|r| r.revision.clone()),
            column(|r| r.remote_path.clone()),
            column(|r| r.local_path.display().to_string()),
        ],
    )?;
    Ok(DataFrame::from_batch(batch))
}

/// Ensure every file matching `location` is cached, then query the cached files.
///
/// An empty match is reported as [`DrDuckError::NotFound`] since there is no
/// table to read.
pub fn query_hf_cached<C: HubClient + ?Sized>(
    session: &Session,
    client: &C,
    mapper: &CachePathMapper,
    location: &HfLocation,
    sql: Option<&str>,
) -> Result<DataFrame, DrDuckError> {
    let resources = download_location(client, mapper, location)?;
    query_resources(session, location, &resources, sql)
}

/// Query files already in the cache without touching the network.
pub fn query_hf_offline(
    session: &Session,
    mapper: &CachePathMapper,
    location: &HfLocation,
    sql: Option<&str>,
) -> Result<DataFrame, DrDuckError> {
    let resources = cached_resources(mapper, location)?;
    query_resources(session, location, &resources, sql)
}

/// Query the hub directly through the engine's `hf://` file system.
///
/// Nothing is cached locally; credentials come from the session's secrets.
pub fn query_hf_remote(
    session: &Session,
    location: &HfLocation,
    sql: Option<&str>,
) -> Result<DataFrame, DrDuckError> {
    let table = quote_literal(&location.hub_url());
    let full_sql = render_template(sql, &table);
    info!(location = %location, "querying hub through engine");
    crate::duck::query::query_to_df(session, &full_sql)
}

fn query_resources(
    session: &Session,
    location: &HfLocation,
    resources: &[HfResource],
    sql: Option<&str>,
) -> Result<DataFrame, DrDuckError> {
    if resources.is_empty() {
        return Err(DrDuckError::NotFound {
            repo_id: location.repo_id().to_string(),
            message: format!(
                "no files matching '{}' at revision '{}'",
                location.path_pattern(),
                location.revision()
            ),
        });
    }

    let paths: Vec<PathBuf> = resources
        .iter()
        .map(|resource| resource.local_path.clone())
        .collect();
    query_parquet_files(session, &paths, sql)
}
