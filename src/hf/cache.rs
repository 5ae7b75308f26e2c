use std::path::{Path, PathBuf};

use crate::error::DrDuckError;

use super::resolve::validate_relative_path;
use super::{HfLocation, HfResource};

/// Maps hub locations onto a local directory tree.
///
/// Layout: `<root>/<namespace>/<name>/<relative-path>` for the default
/// revision and `<root>/<namespace>/<name>@<revision>/<relative-path>`
/// otherwise, with `/` in revisions written as `--`. Nothing here touches the
/// filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachePathMapper {
    root: PathBuf,
}

impl CachePathMapper {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default cache root: `<user cache dir>/dr-duck/hf`.
    pub fn default_root() -> Result<PathBuf, DrDuckError> {
        let base = dirs::cache_dir().ok_or_else(|| {
            DrDuckError::Config("cannot determine the user cache directory".to_string())
        })?;
        Ok(base.join("dr-duck").join("hf"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory mirroring the repository at the location's revision.
    pub fn repo_dir(&self, location: &HfLocation) -> PathBuf {
        let repo_id = location.repo_id();
        let name = if location.is_default_revision() {
            repo_id.name().to_string()
        } else {
            format!(
                "{}@{}",
                repo_id.name(),
                location.revision().replace('/', "--")
            )
        };
        self.root.join(repo_id.namespace()).join(name)
    }

    /// The location's glob pattern mirrored under the cache.
    pub fn local_pattern(&self, location: &HfLocation) -> PathBuf {
        join_slash_path(self.repo_dir(location), location.path_pattern())
    }

    /// Local path for one concrete remote file of the location's repository.
    pub fn local_path(
        &self,
        location: &HfLocation,
        remote_path: &str,
    ) -> Result<PathBuf, DrDuckError> {
        let checked = validate_relative_path(remote_path)?;
        Ok(join_slash_path(self.repo_dir(location), &checked))
    }

    pub fn resource(
        &self,
        location: &HfLocation,
        remote_path: &str,
    ) -> Result<HfResource, DrDuckError> {
        Ok(HfResource {
            repo_id: location.repo_id().clone(),
            revision: location.revision().to_string(),
            remote_path: remote_path.to_string(),
            local_path: self.local_path(location, remote_path)?,
        })
    }
}

fn join_slash_path(mut base: PathBuf, relative: &str) -> PathBuf {
    for segment in relative.split('/') {
        base.push(segment);
    }
    base
}
