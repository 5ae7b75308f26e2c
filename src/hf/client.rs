//! Production [`HubClient`]: `hf-hub` builds file URLs, `ureq` performs the
//! listing and download requests so HTTP status codes reach error mapping.

use std::io::Write;
use std::time::Duration;

use hf_hub::api::sync::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::DrDuckError;

use super::acquire::HubClient;
use super::HfRepoId;

const AUTH_HINT: &str = " (hint: set HF_TOKEN for gated or private datasets)";
const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

#[derive(Debug, Deserialize)]
struct RepoListing {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
}

/// Connection settings for [`HfHubClient`].
#[derive(Clone, Debug)]
pub struct HfClientOptions {
    pub token: Option<String>,
    /// Alternative hub endpoint, e.g. a mirror.
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

impl Default for HfClientOptions {
    fn default() -> Self {
        Self {
            token: None,
            endpoint: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Dataset repositories on the Hugging Face Hub.
pub struct HfHubClient {
    api: Api,
    agent: ureq::Agent,
    token: Option<String>,
    endpoint: String,
}

impl HfHubClient {
    pub fn new(options: &HfClientOptions) -> Result<Self, DrDuckError> {
        let mut builder = ApiBuilder::new().with_progress(false);
        if options.token.is_some() {
            builder = builder.with_token(options.token.clone());
        }
        if let Some(endpoint) = options.endpoint.as_ref() {
            builder = builder.with_endpoint(endpoint.clone());
        }
        let api = builder
            .build()
            .map_err(|source| DrDuckError::Config(format!("hub client: {source}")))?;

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(options.timeout))
            .build();
        let agent: ureq::Agent = config.into();

        Ok(Self {
            api,
            agent,
            token: options.token.clone(),
            endpoint: options
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        })
    }

    fn get(&self, url: &str) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
        let request = self.agent.get(url);
        match self.token.as_deref() {
            Some(token) => request.header("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn repo(&self, repo_id: &HfRepoId, revision: &str) -> ApiRepo {
        self.api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Dataset,
            revision.to_string(),
        ))
    }
}

impl HubClient for HfHubClient {
    fn list_files(&self, repo_id: &HfRepoId, revision: &str) -> Result<Vec<String>, DrDuckError> {
        let url = listing_url(&self.endpoint, repo_id, revision)?;
        debug!(url = %url, "listing repository");

        let fetch_error = |message: String| DrDuckError::Fetch {
            repo_id: repo_id.to_string(),
            path: "<repo info>".to_string(),
            message,
        };

        let mut response = self.get(url.as_str()).call().map_err(|source| match source {
            ureq::Error::StatusCode(404) => DrDuckError::NotFound {
                repo_id: repo_id.to_string(),
                message: format!("repository or revision '{revision}' does not exist"),
            },
            ureq::Error::StatusCode(code @ (401 | 403)) => {
                fetch_error(format!("HTTP {code}{AUTH_HINT}"))
            }
            other => fetch_error(other.to_string()),
        })?;

        let listing: RepoListing = response
            .body_mut()
            .read_json()
            .map_err(|source| fetch_error(format!("unreadable listing: {source}")))?;

        debug!(repo_id = %repo_id, revision, files = listing.siblings.len(), "listed repository");
        Ok(listing
            .siblings
            .into_iter()
            .map(|sibling| sibling.rfilename)
            .collect())
    }

    fn fetch(
        &self,
        repo_id: &HfRepoId,
        revision: &str,
        path: &str,
        sink: &mut dyn Write,
    ) -> Result<u64, DrDuckError> {
        let url = self.repo(repo_id, revision).url(path);
        debug!(url = %url, "fetching");

        let fetch_error = |message: String| DrDuckError::Fetch {
            repo_id: repo_id.to_string(),
            path: path.to_string(),
            message,
        };

        let mut response = self.get(&url).call().map_err(|source| match source {
            ureq::Error::StatusCode(404) => DrDuckError::NotFound {
                repo_id: repo_id.to_string(),
                message: format!("'{path}' does not exist at revision '{revision}'"),
            },
            ureq::Error::StatusCode(code @ (401 | 403)) => {
                fetch_error(format!("HTTP {code}{AUTH_HINT}"))
            }
            other => fetch_error(other.to_string()),
        })?;

        let mut reader = response.body_mut().as_reader();
        std::io::copy(&mut reader, sink).map_err(|source| fetch_error(source.to_string()))
    }
}

/// `<endpoint>/api/datasets/<ns>/<name>/revision/<revision>`, with the
/// revision as a single escaped segment so `refs/convert/parquet` survives.
fn listing_url(endpoint: &str, repo_id: &HfRepoId, revision: &str) -> Result<Url, DrDuckError> {
    let mut url = Url::parse(endpoint)
        .map_err(|source| DrDuckError::Config(format!("hub endpoint '{endpoint}': {source}")))?;
    url.path_segments_mut()
        .map_err(|()| DrDuckError::Config(format!("hub endpoint '{endpoint}' cannot be a base")))?
        .pop_if_empty()
        .extend([
            "api",
            "datasets",
            repo_id.namespace(),
            repo_id.name(),
            "revision",
            revision,
        ]);
    Ok(url)
}
