//! Runtime settings resolved once at startup.
//!
//! Library calls take these values explicitly; only [`Settings::from_env`]
//! and [`load_env_file`] look at the process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::duck::connection::ConnectionOptions;
use crate::duck::secrets::S3Credentials;
use crate::error::DrDuckError;
use crate::hf::cache::CachePathMapper;

pub const ENV_CACHE_DIR: &str = "DR_DUCK_CACHE_DIR";
pub const ENV_HTTP_TIMEOUT: &str = "DR_DUCK_HTTP_TIMEOUT_SECS";
pub const ENV_HF_TOKEN: &str = "HF_TOKEN";
pub const ENV_HF_TOKEN_LEGACY: &str = "HUGGING_FACE_HUB_TOKEN";
pub const ENV_HF_ENDPOINT: &str = "HF_ENDPOINT";
pub const ENV_MOTHERDUCK_TOKEN: &str = "MOTHERDUCK_TOKEN";
pub const ENV_AWS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_AWS_SECRET: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_AWS_REGION: &str = "AWS_REGION";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct Settings {
    /// Explicit cache root; `None` falls back to the per-user cache directory
    /// when a hub command first needs it.
    pub cache_dir: Option<PathBuf>,
    pub hf_token: Option<String>,
    pub hf_endpoint: Option<String>,
    pub motherduck_token: Option<String>,
    pub s3: Option<S3Credentials>,
    pub http_timeout: Duration,
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Result<Self, DrDuckError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DrDuckError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let http_timeout = match get(ENV_HTTP_TIMEOUT) {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|source| {
                DrDuckError::Config(format!("{ENV_HTTP_TIMEOUT}='{raw}': {source}"))
            })?),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let s3 = match (get(ENV_AWS_KEY_ID), get(ENV_AWS_SECRET)) {
            (None, None) => None,
            (Some(key_id), Some(secret)) => Some(S3Credentials {
                key_id,
                secret,
                region: get(ENV_AWS_REGION),
                ..Default::default()
            }),
            (Some(_), None) => {
                return Err(DrDuckError::Config(format!(
                    "{ENV_AWS_SECRET} not found in environment"
                )))
            }
            (None, Some(_)) => {
                return Err(DrDuckError::Config(format!(
                    "{ENV_AWS_KEY_ID} not found in environment"
                )))
            }
        };

        Ok(Self {
            cache_dir: get(ENV_CACHE_DIR).map(PathBuf::from),
            hf_token: get(ENV_HF_TOKEN).or_else(|| get(ENV_HF_TOKEN_LEGACY)),
            hf_endpoint: get(ENV_HF_ENDPOINT),
            motherduck_token: get(ENV_MOTHERDUCK_TOKEN),
            s3,
            http_timeout,
        })
    }

    pub fn cache_root(&self) -> Result<PathBuf, DrDuckError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => CachePathMapper::default_root(),
        }
    }

    pub fn cache_mapper(&self) -> Result<CachePathMapper, DrDuckError> {
        self.cache_root().map(CachePathMapper::new)
    }

    pub fn connection_options(&self, path: Option<PathBuf>) -> ConnectionOptions {
        ConnectionOptions {
            path,
            hf_token: self.hf_token.clone(),
            s3: self.s3.clone(),
            motherduck_token: self.motherduck_token.clone(),
        }
    }

    #[cfg(feature = "hf-remote")]
    pub fn client_options(&self) -> crate::hf::client::HfClientOptions {
        crate::hf::client::HfClientOptions {
            token: self.hf_token.clone(),
            endpoint: self.hf_endpoint.clone(),
            timeout: self.http_timeout,
        }
    }
}

/// Load `KEY=value` pairs from a `.env` file into the process environment.
///
/// Variables already set are left alone.
pub fn load_env_file(path: &Path) -> Result<(), DrDuckError> {
    dotenvy::from_path(path)
        .map_err(|source| DrDuckError::Config(format!("{}: {source}", path.display())))?;
    debug!(path = %path.display(), "loaded env file");
    Ok(())
}
