use crate::error::DrDuckError;
use crate::fsutil::compile_glob;

use super::{HfLocation, HfRepoId, DEFAULT_PATH_PATTERN, DEFAULT_REVISION};

/// Revision the hub publishes auto-converted parquet files under.
pub const PARQUET_CONVERSION_REVISION: &str = "refs/convert/parquet";

const MAX_REPO_ID_LEN: usize = 96;

/// Resolve a user-supplied hub reference into an [`HfLocation`].
///
/// `input` is a repo id (`org/dataset`), a dataset URL
/// (`https://huggingface.co/datasets/org/dataset/tree/main/data`) or an
/// `hf://datasets/org/dataset@rev/path` URI. `path` defaults to every parquet
/// file and `revision` to `main`. Values encoded in a URL must agree with the
/// explicit arguments.
pub fn resolve_location(
    input: &str,
    path: Option<&str>,
    revision: Option<&str>,
) -> Result<HfLocation, DrDuckError> {
    let parsed = if input.starts_with("http://") || input.starts_with("https://") {
        parse_dataset_url(input)?
    } else if input.starts_with("hf://") {
        parse_hf_uri(input)?
    } else {
        ParsedInput {
            repo_id: validate_repo_id(input)?,
            revision: None,
            path: None,
        }
    };

    let revision = merge_component(input, "revision", revision, parsed.revision)?
        .unwrap_or_else(|| DEFAULT_REVISION.to_string());
    let path = merge_component(input, "path", path, parsed.path)?
        .unwrap_or_else(|| DEFAULT_PATH_PATTERN.to_string());

    let revision = validate_revision(&revision)?;
    let path = validate_path_pattern(&path)?;

    Ok(HfLocation::from_parts(
        HfRepoId(parsed.repo_id),
        path,
        revision,
    ))
}

struct ParsedInput {
    repo_id: String,
    revision: Option<String>,
    path: Option<String>,
}

fn merge_component(
    input: &str,
    what: &str,
    explicit: Option<&str>,
    encoded: Option<String>,
) -> Result<Option<String>, DrDuckError> {
    match (explicit, encoded) {
        (Some(arg), Some(from_url)) if arg != from_url => Err(DrDuckError::validation(
            "location",
            input,
            format!(
                "conflicting {what}s: argument is '{arg}' but the URL encodes '{from_url}'"
            ),
        )),
        (Some(arg), _) => Ok(Some(arg.to_string())),
        (None, from_url) => Ok(from_url),
    }
}

fn parse_dataset_url(input: &str) -> Result<ParsedInput, DrDuckError> {
    let url = url::Url::parse(input).map_err(|source| {
        DrDuckError::validation("location", input, format!("invalid URL: {source}"))
    })?;

    let host = url
        .host_str()
        .ok_or_else(|| DrDuckError::validation("location", input, "URL is missing a host"))?
        .to_ascii_lowercase();

    if host != "huggingface.co" {
        return Err(DrDuckError::validation(
            "location",
            input,
            format!("expected host 'huggingface.co', found '{host}'"),
        ));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|iter| iter.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if segments.len() < 3 || segments[0] != "datasets" {
        return Err(DrDuckError::validation(
            "location",
            input,
            "expected dataset URL like https://huggingface.co/datasets/<namespace>/<name>",
        ));
    }

    let repo_id = validate_repo_id(&format!("{}/{}", segments[1], segments[2]))?;

    let (revision, path) = match segments.get(3).copied() {
        None => (None, None),
        Some(kind @ ("tree" | "blob" | "resolve")) => {
            let revision = segments.get(4).map(|rev| decode_revision(rev));
            let rest = segments.get(5..).unwrap_or_default().join("/");
            let path = match (kind, rest.is_empty()) {
                (_, true) => None,
                // A tree URL names a directory: read the parquet files below it.
                ("tree", false) => Some(format!("{rest}/{DEFAULT_PATH_PATTERN}")),
                (_, false) => Some(rest),
            };
            (revision, path)
        }
        Some(other) => {
            return Err(DrDuckError::validation(
                "location",
                input,
                format!("unexpected URL segment '{other}' (expected tree, blob or resolve)"),
            ));
        }
    };

    Ok(ParsedInput {
        repo_id,
        revision,
        path,
    })
}

fn parse_hf_uri(input: &str) -> Result<ParsedInput, DrDuckError> {
    let rest = input
        .strip_prefix("hf://datasets/")
        .ok_or_else(|| {
            DrDuckError::validation(
                "location",
                input,
                "expected URI like hf://datasets/<namespace>/<name>[@<revision>]/<path>",
            )
        })?;

    let mut parts = rest.splitn(3, '/');
    let namespace = parts.next().unwrap_or_default();
    let name_and_revision = parts.next().unwrap_or_default();
    let path = parts
        .next()
        .filter(|path| !path.is_empty())
        .map(str::to_string);

    let (name, revision) = match name_and_revision.split_once('@') {
        Some((name, revision)) => (name, Some(decode_revision(revision))),
        None => (name_and_revision, None),
    };

    Ok(ParsedInput {
        repo_id: validate_repo_id(&format!("{namespace}/{name}"))?,
        revision,
        path,
    })
}

/// Undo the encodings used for revisions inside URLs.
fn decode_revision(raw: &str) -> String {
    if raw == "~parquet" {
        return PARQUET_CONVERSION_REVISION.to_string();
    }
    raw.replace("%2F", "/").replace("%2f", "/")
}

/// Encode a revision for use inside an `hf://` URI.
pub(crate) fn encode_revision(revision: &str) -> String {
    if revision == PARQUET_CONVERSION_REVISION {
        return "~parquet".to_string();
    }
    revision.replace('/', "%2F")
}

pub(crate) fn validate_repo_id(repo_id: &str) -> Result<String, DrDuckError> {
    let trimmed = repo_id.trim();
    let mut parts = trimmed.split('/');
    let namespace = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();
    let extra = parts.next();

    if namespace.is_empty() || name.is_empty() || extra.is_some() {
        return Err(DrDuckError::validation(
            "repo id",
            repo_id,
            "expected repo id in '<namespace>/<name>' form",
        ));
    }

    if trimmed.len() > MAX_REPO_ID_LEN {
        return Err(DrDuckError::validation(
            "repo id",
            repo_id,
            format!("repo id is longer than {MAX_REPO_ID_LEN} characters"),
        ));
    }

    for segment in [namespace, name] {
        if let Some(message) = repo_segment_problem(segment) {
            return Err(DrDuckError::validation("repo id", repo_id, message));
        }
    }

    Ok(trimmed.to_string())
}

fn repo_segment_problem(segment: &str) -> Option<String> {
    if let Some(bad) = segment
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Some(format!("character '{bad}' is not allowed in '{segment}'"));
    }
    if segment.starts_with(['-', '.']) || segment.ends_with(['-', '.']) {
        return Some(format!("'{segment}' may not start or end with '-' or '.'"));
    }
    if segment.contains("--") || segment.contains("..") {
        return Some(format!("'{segment}' may not contain '--' or '..'"));
    }
    None
}

pub(crate) fn validate_revision(revision: &str) -> Result<String, DrDuckError> {
    let trimmed = revision.trim();
    let problem = if trimmed.is_empty() {
        Some("revision is empty")
    } else if trimmed.chars().any(char::is_whitespace) {
        Some("revision contains whitespace")
    } else if trimmed.contains("..") {
        Some("revision contains '..'")
    } else if trimmed.starts_with('/') || trimmed.ends_with('/') || trimmed.contains("//") {
        Some("revision has an empty path segment")
    } else {
        None
    };

    match problem {
        Some(message) => Err(DrDuckError::validation("revision", revision, message)),
        None => Ok(trimmed.to_string()),
    }
}

/// Check that `pattern` is a relative glob that stays inside the repository.
pub(crate) fn validate_path_pattern(pattern: &str) -> Result<String, DrDuckError> {
    let checked = validate_relative_path(pattern)?;
    compile_glob(&checked)
        .map_err(|source| DrDuckError::validation("path", pattern, source.to_string()))?;
    Ok(checked)
}

/// Check that `path` is relative, `/`-separated and free of `.`/`..` segments.
pub(crate) fn validate_relative_path(path: &str) -> Result<String, DrDuckError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(DrDuckError::validation("path", path, "path is empty"));
    }
    if trimmed.starts_with('/') || trimmed.contains('\\') {
        return Err(DrDuckError::validation(
            "path",
            path,
            "path must be relative and use '/' separators",
        ));
    }
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(DrDuckError::validation(
                "path",
                path,
                format!("path segment '{segment}' is not allowed"),
            ));
        }
    }
    Ok(trimmed.to_string())
}
