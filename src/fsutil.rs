//! Glob matching and file discovery shared by the cache and the CLI.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

use crate::error::DrDuckError;

/// Compile a `/`-separated glob where `*` stays within one path segment and
/// `**/` spans any number of directories.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// Relative path of `path` under `root`, always `/`-separated.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

/// Files under any of `roots` whose path relative to that root matches `pattern`.
///
/// Missing roots are skipped. The result is sorted and free of duplicates.
pub fn glob_files_from_roots<P: AsRef<Path>>(
    roots: &[P],
    pattern: &str,
) -> Result<Vec<PathBuf>, DrDuckError> {
    let matcher = compile_glob(pattern)
        .map_err(|source| DrDuckError::validation("glob", pattern, source.to_string()))?;

    let mut found = BTreeSet::new();
    for root in roots {
        let root = root.as_ref();
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|source| DrDuckError::Cache {
                path: root.to_path_buf(),
                message: source.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(relative) = relative_slash_path(root, entry.path()) else {
                continue;
            };
            if matcher.is_match(&relative) {
                found.insert(entry.into_path());
            }
        }
    }

    Ok(found.into_iter().collect())
}
