#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use dr_duck::{DrDuckError, HfRepoId, HubClient, Session};

/// In-memory hub serving a fixed set of files for any repository.
#[derive(Default)]
pub struct FakeHub {
    files: BTreeMap<String, Vec<u8>>,
    missing_repo: bool,
    fail_paths: RefCell<Vec<String>>,
    lists: Cell<usize>,
    fetches: Cell<usize>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(path.to_string(), bytes);
        self
    }

    /// Every call reports the repository as absent.
    pub fn missing_repo(mut self) -> Self {
        self.missing_repo = true;
        self
    }

    /// Fetching `path` writes half the bytes, then fails.
    pub fn fail_on(&self, path: &str) {
        self.fail_paths.borrow_mut().push(path.to_string());
    }

    pub fn heal(&self) {
        self.fail_paths.borrow_mut().clear();
    }

    pub fn list_count(&self) -> usize {
        self.lists.get()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl HubClient for FakeHub {
    fn list_files(&self, repo_id: &HfRepoId, _revision: &str) -> Result<Vec<String>, DrDuckError> {
        self.lists.set(self.lists.get() + 1);
        if self.missing_repo {
            return Err(DrDuckError::NotFound {
                repo_id: repo_id.to_string(),
                message: "repository does not exist".to_string(),
            });
        }
        Ok(self.files.keys().cloned().collect())
    }

    fn fetch(
        &self,
        repo_id: &HfRepoId,
        _revision: &str,
        path: &str,
        sink: &mut dyn Write,
    ) -> Result<u64, DrDuckError> {
        self.fetches.set(self.fetches.get() + 1);
        let bytes = self.files.get(path).ok_or_else(|| DrDuckError::NotFound {
            repo_id: repo_id.to_string(),
            message: format!("no file '{path}'"),
        })?;

        if self.fail_paths.borrow().iter().any(|p| p == path) {
            sink.write_all(&bytes[..bytes.len() / 2])?;
            return Err(DrDuckError::Fetch {
                repo_id: repo_id.to_string(),
                path: path.to_string(),
                message: "connection reset".to_string(),
            });
        }

        sink.write_all(bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Parquet bytes holding the result of `select`.
pub fn parquet_bytes(scratch: &Path, select: &str) -> Vec<u8> {
    let path = scratch.join(format!("fixture-{}.parquet", fixture_id()));
    write_parquet(&path, select);
    let bytes = fs::read(&path).expect("read parquet fixture");
    fs::remove_file(&path).expect("remove parquet fixture");
    bytes
}

/// Write the result of `select` to `path` as parquet.
pub fn write_parquet(path: &Path, select: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    let session = Session::in_memory().expect("session");
    let target = path.to_string_lossy().replace('\'', "''");
    session
        .execute_batch(&format!("COPY ({select}) TO '{target}' (FORMAT PARQUET)"))
        .expect("write parquet fixture");
}

fn fixture_id() -> usize {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
