use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use parquet::file::reader::{FileReader, SerializedFileReader};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::DrDuckError;
use crate::fsutil::{compile_glob, relative_slash_path};

use super::cache::CachePathMapper;
use super::{HfLocation, HfRepoId, HfResource};

/// Suffix of in-flight download files. Files carrying it are never cache hits.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Partial files untouched for longer than this belong to dead downloads.
pub const STALE_PARTIAL_AGE: Duration = Duration::from_secs(60 * 60);

/// Remote side of the cache: lists and streams files of a hub repository.
pub trait HubClient {
    /// Every file path in the repository at `revision`, `/`-separated.
    fn list_files(&self, repo_id: &HfRepoId, revision: &str) -> Result<Vec<String>, DrDuckError>;

    /// Stream the bytes of `path` into `sink`, returning the byte count.
    fn fetch(
        &self,
        repo_id: &HfRepoId,
        revision: &str,
        path: &str,
        sink: &mut dyn Write,
    ) -> Result<u64, DrDuckError>;
}

/// Make sure every remote file matching `location` exists in the cache.
///
/// Files already at their mapped path are not fetched again. Misses are
/// written to a temporary sibling and renamed into place, so a failed or
/// interrupted download never leaves a file at the target. An empty match is
/// an empty result, not an error. Partial files left behind by interrupted
/// runs are swept once they are older than [`STALE_PARTIAL_AGE`].
pub fn download_location<C: HubClient + ?Sized>(
    client: &C,
    mapper: &CachePathMapper,
    location: &HfLocation,
) -> Result<Vec<HfResource>, DrDuckError> {
    let matcher = compile_glob(location.path_pattern()).map_err(|source| {
        DrDuckError::validation("path", location.path_pattern(), source.to_string())
    })?;

    let repo_dir = mapper.repo_dir(location);
    if repo_dir.is_dir() {
        let removed = sweep_stale_partials(&repo_dir, STALE_PARTIAL_AGE);
        if removed > 0 {
            debug!(dir = %repo_dir.display(), removed, "swept stale partial files");
        }
    }

    let mut remote_paths: Vec<String> = client
        .list_files(location.repo_id(), location.revision())?
        .into_iter()
        .filter(|path| matcher.is_match(path))
        .collect();
    remote_paths.sort();
    remote_paths.dedup();

    let mut resources = Vec::with_capacity(remote_paths.len());
    let mut downloaded = 0usize;

    for remote_path in remote_paths {
        let resource = mapper.resource(location, &remote_path)?;

        if resource.local_path.is_file() {
            debug!(path = %remote_path, "cache hit");
        } else {
            debug!(path = %remote_path, "cache miss");
            fetch_into_cache(client, location, &resource)?;
            downloaded += 1;
        }
        resources.push(resource);
    }

    info!(
        location = %location,
        files = resources.len(),
        downloaded,
        "cache ready"
    );
    Ok(resources)
}

/// Files of `location` already in the cache; never touches the network.
pub fn cached_resources(
    mapper: &CachePathMapper,
    location: &HfLocation,
) -> Result<Vec<HfResource>, DrDuckError> {
    let matcher = compile_glob(location.path_pattern()).map_err(|source| {
        DrDuckError::validation("path", location.path_pattern(), source.to_string())
    })?;
    let repo_dir = mapper.repo_dir(location);
    if !repo_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut remote_paths = Vec::new();
    for entry in WalkDir::new(&repo_dir) {
        let entry = entry.map_err(|source| DrDuckError::Cache {
            path: repo_dir.clone(),
            message: source.to_string(),
        })?;
        if !entry.file_type().is_file() || is_partial(entry.path()) {
            continue;
        }
        if let Some(relative) = relative_slash_path(&repo_dir, entry.path()) {
            if matcher.is_match(&relative) {
                remote_paths.push(relative);
            }
        }
    }
    remote_paths.sort();

    remote_paths
        .iter()
        .map(|remote_path| mapper.resource(location, remote_path))
        .collect()
}

fn fetch_into_cache<C: HubClient + ?Sized>(
    client: &C,
    location: &HfLocation,
    resource: &HfResource,
) -> Result<(), DrDuckError> {
    let staged = stage_file(&resource.local_path, |file| {
        let mut writer = BufWriter::new(file);
        let bytes = client.fetch(
            location.repo_id(),
            location.revision(),
            &resource.remote_path,
            &mut writer,
        )?;
        writer.flush()?;
        debug!(path = %resource.remote_path, bytes, "fetched");
        Ok(())
    })?;

    if has_parquet_extension(&resource.remote_path) {
        verify_parquet(staged.path()).map_err(|message| DrDuckError::Fetch {
            repo_id: location.repo_id().to_string(),
            path: resource.remote_path.clone(),
            message: format!("downloaded file is not valid parquet: {message}"),
        })?;
    }

    staged.commit()?;
    info!(path = %resource.remote_path, local = %resource.local_path.display(), "downloaded");
    Ok(())
}

/// Fully written temporary file waiting to be renamed onto its target.
///
/// Dropping it without [`StagedFile::commit`] deletes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Path of the temporary file.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically rename the temporary file onto the target. Last writer wins.
    pub fn commit(self) -> Result<PathBuf, DrDuckError> {
        let StagedFile { temp, target } = self;
        temp.persist(&target)
            .map_err(|source| DrDuckError::Io(source.error))?;
        Ok(target)
    }
}

/// Write a temporary file next to `target` using `write`, synced to disk.
///
/// Parent directories are created as needed. If `write` fails the temporary
/// file is removed and the target is left untouched.
pub fn stage_file<F>(target: &Path, write: F) -> Result<StagedFile, DrDuckError>
where
    F: FnOnce(&mut File) -> Result<(), DrDuckError>,
{
    let parent = target.parent().ok_or_else(|| DrDuckError::Cache {
        path: target.to_path_buf(),
        message: "target has no parent directory".to_string(),
    })?;
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| DrDuckError::Cache {
            path: target.to_path_buf(),
            message: "target has no UTF-8 file name".to_string(),
        })?;

    fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(parent)?;

    write(temp.as_file_mut())?;
    temp.as_file().sync_all()?;

    Ok(StagedFile {
        temp,
        target: target.to_path_buf(),
    })
}

/// Stage and commit in one step.
pub fn write_atomic<F>(target: &Path, write: F) -> Result<PathBuf, DrDuckError>
where
    F: FnOnce(&mut File) -> Result<(), DrDuckError>,
{
    stage_file(target, write)?.commit()
}

/// Delete partial files under `dir` last modified more than `max_age` ago.
///
/// Returns how many were removed. Files that vanish or cannot be removed are
/// skipped; a concurrent download may own them.
pub fn sweep_stale_partials(dir: &Path, max_age: Duration) -> usize {
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() || !is_partial(entry.path()) {
            continue;
        }
        let age = entry
            .metadata()
            .ok()
            .and_then(|meta| meta.modified().ok())
            .and_then(|modified| now.duration_since(modified).ok());
        if !age.is_some_and(|age| age > max_age) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "cannot remove stale partial")
            }
        }
    }
    removed
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX))
        .unwrap_or(false)
}

fn has_parquet_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("parquet"))
        .unwrap_or(false)
}

fn verify_parquet(path: &Path) -> Result<(), String> {
    let file = File::open(path).map_err(|source| source.to_string())?;
    let reader = SerializedFileReader::new(file).map_err(|source| source.to_string())?;
    debug!(
        rows = reader.metadata().file_metadata().num_rows(),
        "verified parquet footer"
    );
    Ok(())
}
