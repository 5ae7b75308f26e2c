#![allow(dead_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A repo id segment that passes validation.
pub fn arb_repo_segment() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9_]{0,10}[a-z0-9]"
}

pub fn arb_repo_id() -> impl Strategy<Value = String> {
    (arb_repo_segment(), arb_repo_segment()).prop_map(|(ns, name)| format!("{ns}/{name}"))
}

/// Branch names, tags and `refs/...` style revisions.
pub fn arb_revision() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("main".to_string()),
        "v[0-9]\\.[0-9]",
        "[a-z][a-z0-9_-]{0,8}",
        "refs/[a-z]{1,6}/[a-z0-9]{1,6}",
    ]
}

/// A relative file path inside a repository, `/`-separated.
pub fn arb_remote_path(extension: &'static str) -> impl Strategy<Value = String> {
    (prop::collection::vec("[a-z0-9_]{1,8}", 0..3), "[a-z0-9_-]{1,12}").prop_map(
        move |(dirs, stem)| {
            let mut parts = dirs;
            parts.push(format!("{stem}.{extension}"));
            parts.join("/")
        },
    )
}
