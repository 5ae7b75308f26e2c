mod common;

use std::fs::{self, File};
use std::time::{Duration, SystemTime};

use common::{parquet_bytes, FakeHub};
use dr_duck::duck::query::query_to_df;
use dr_duck::{
    cached_resources, download_location, query_hf_cached, query_hf_offline, resolve_location,
    CachePathMapper, DrDuckError, Session,
};

fn two_shard_hub(scratch: &std::path::Path) -> FakeHub {
    FakeHub::new()
        .with_file(
            "data/train-00000.parquet",
            parquet_bytes(scratch, "SELECT * FROM range(0, 3) t(id)"),
        )
        .with_file(
            "data/train-00001.parquet",
            parquet_bytes(scratch, "SELECT * FROM range(3, 5) t(id)"),
        )
        .with_file("README.md", b"# dataset card\n".to_vec())
}

#[test]
fn second_download_is_served_from_cache() {
    let scratch = tempfile::tempdir().expect("scratch");
    let cache = tempfile::tempdir().expect("cache");
    let hub = two_shard_hub(scratch.path());
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/dataset", Some("data/*.parquet"), None).expect("location");

    let first = download_location(&hub, &mapper, &location).expect("first download");
    assert_eq!(first.len(), 2);
    assert_eq!(hub.fetch_count(), 2);
    for resource in &first {
        assert!(resource.local_path.is_file());
        assert!(resource
            .local_path
            .starts_with(cache.path().join("org").join("dataset").join("data")));
    }

    let second = download_location(&hub, &mapper, &location).expect("second download");
    assert_eq!(second, first);
    assert_eq!(hub.fetch_count(), 2, "cache hits must not fetch");
}

#[test]
fn resources_are_sorted_and_filtered_by_glob() {
    let scratch = tempfile::tempdir().expect("scratch");
    let cache = tempfile::tempdir().expect("cache");
    let hub = two_shard_hub(scratch.path());
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/dataset", None, None).expect("location");

    let resources = download_location(&hub, &mapper, &location).expect("download");
    let remote: Vec<&str> = resources.iter().map(|r| r.remote_path.as_str()).collect();
    assert_eq!(
        remote,
        vec!["data/train-00000.parquet", "data/train-00001.parquet"]
    );
    assert!(!cache.path().join("org").join("dataset").join("README.md").exists());
}

#[test]
fn empty_match_is_not_an_error() {
    let scratch = tempfile::tempdir().expect("scratch");
    let cache = tempfile::tempdir().expect("cache");
    let hub = two_shard_hub(scratch.path());
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/dataset", Some("test/*.parquet"), None).expect("location");

    let resources = download_location(&hub, &mapper, &location).expect("download");
    assert!(resources.is_empty());
    assert_eq!(hub.fetch_count(), 0);
}

#[test]
fn failed_fetch_leaves_nothing_at_target() {
    let scratch = tempfile::tempdir().expect("scratch");
    let cache = tempfile::tempdir().expect("cache");
    let hub = two_shard_hub(scratch.path());
    hub.fail_on("data/train-00001.parquet");
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/dataset", Some("data/*.parquet"), None).expect("location");

    let err = download_location(&hub, &mapper, &location).expect_err("fetch fails");
    assert!(matches!(err, DrDuckError::Fetch { .. }));

    let target = mapper
        .local_path(&location, "data/train-00001.parquet")
        .expect("target");
    assert!(!target.exists());
    let leftovers: Vec<_> = fs::read_dir(target.parent().expect("parent"))
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");

    // The shard that succeeded stays cached; the retry only fetches the other.
    hub.heal();
    let before = hub.fetch_count();
    let resources = download_location(&hub, &mapper, &location).expect("retry");
    assert_eq!(resources.len(), 2);
    assert_eq!(hub.fetch_count() - before, 1);
}

#[test]
fn corrupt_parquet_is_never_committed() {
    let cache = tempfile::tempdir().expect("cache");
    let hub = FakeHub::new().with_file("data/bad.parquet", b"not parquet at all".to_vec());
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/dataset", None, None).expect("location");

    let err = download_location(&hub, &mapper, &location).expect_err("corrupt download");
    assert!(err.to_string().contains("not valid parquet"));
    assert!(!mapper
        .local_path(&location, "data/bad.parquet")
        .expect("target")
        .exists());
}

#[test]
fn missing_repository_propagates_not_found() {
    let cache = tempfile::tempdir().expect("cache");
    let hub = FakeHub::new().missing_repo();
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/absent", None, None).expect("location");

    let err = download_location(&hub, &mapper, &location).expect_err("missing repo");
    assert!(matches!(err, DrDuckError::NotFound { .. }));
}

#[test]
fn malformed_repo_id_fails_before_any_network_call() {
    let hub = FakeHub::new();
    let err = resolve_location("no-slash", None, None).expect_err("invalid repo id");
    assert!(matches!(err, DrDuckError::Validation { .. }));
    assert_eq!(hub.list_count(), 0);
    assert_eq!(hub.fetch_count(), 0);
}

#[test]
fn cached_query_unions_all_shards() {
    let scratch = tempfile::tempdir().expect("scratch");
    let cache = tempfile::tempdir().expect("cache");
    let hub = two_shard_hub(scratch.path());
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/dataset", Some("data/*.parquet"), None).expect("location");
    let session = Session::in_memory().expect("session");

    let frame = query_hf_cached(&session, &hub, &mapper, &location, None).expect("query");
    let mut ids = frame
        .column_strings("id")
        .expect("format")
        .expect("id column");
    ids.sort();
    assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);

    let filtered = query_hf_cached(
        &session,
        &hub,
        &mapper,
        &location,
        Some("SELECT count(*) AS n FROM {table} WHERE id >= 3"),
    )
    .expect("filtered query");
    assert_eq!(
        filtered.column_strings("n").expect("format"),
        Some(vec!["2".to_string()])
    );
    assert_eq!(hub.fetch_count(), 2);
}

#[test]
fn offline_query_reads_only_the_cache() {
    let scratch = tempfile::tempdir().expect("scratch");
    let cache = tempfile::tempdir().expect("cache");
    let hub = two_shard_hub(scratch.path());
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/dataset", Some("data/*.parquet"), None).expect("location");

    download_location(&hub, &mapper, &location).expect("warm cache");

    let session = Session::in_memory().expect("session");
    let frame = query_hf_offline(&session, &mapper, &location, None).expect("offline query");
    assert_eq!(frame.height(), 5);
}

#[test]
fn offline_listing_skips_partial_files() {
    let scratch = tempfile::tempdir().expect("scratch");
    let cache = tempfile::tempdir().expect("cache");
    let hub = two_shard_hub(scratch.path());
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/dataset", Some("data/*"), None).expect("location");

    download_location(&hub, &mapper, &location).expect("warm cache");
    let data_dir = cache.path().join("org").join("dataset").join("data");
    fs::write(data_dir.join(".train-00002.parquet.abc123.partial"), b"half").expect("stale temp");

    let cached = cached_resources(&mapper, &location).expect("listing");
    let remote: Vec<&str> = cached.iter().map(|r| r.remote_path.as_str()).collect();
    assert_eq!(
        remote,
        vec!["data/train-00000.parquet", "data/train-00001.parquet"]
    );
}

#[test]
fn next_download_sweeps_stale_partials() {
    let scratch = tempfile::tempdir().expect("scratch");
    let cache = tempfile::tempdir().expect("cache");
    let hub = two_shard_hub(scratch.path());
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/dataset", Some("data/*.parquet"), None).expect("location");

    let data_dir = cache.path().join("org").join("dataset").join("data");
    fs::create_dir_all(&data_dir).expect("mkdir");
    let stale = data_dir.join(".train-00000.parquet.dead01.partial");
    let in_flight = data_dir.join(".train-00001.parquet.live02.partial");
    fs::write(&stale, b"left by a killed run").expect("stale temp");
    fs::write(&in_flight, b"another process").expect("fresh temp");
    File::options()
        .write(true)
        .open(&stale)
        .expect("open")
        .set_modified(SystemTime::now() - Duration::from_secs(3 * 60 * 60))
        .expect("age");

    let resources = download_location(&hub, &mapper, &location).expect("download");
    assert_eq!(resources.len(), 2);
    assert!(!stale.exists(), "stale partial must be removed");
    assert!(in_flight.exists(), "recent partial may belong to a live download");
}

#[test]
fn revisions_are_cached_separately() {
    let scratch = tempfile::tempdir().expect("scratch");
    let cache = tempfile::tempdir().expect("cache");
    let hub = two_shard_hub(scratch.path());
    let mapper = CachePathMapper::new(cache.path());
    let main = resolve_location("org/dataset", None, None).expect("main");
    let tagged = resolve_location("org/dataset", None, Some("v1.0")).expect("tag");

    download_location(&hub, &mapper, &main).expect("main download");
    download_location(&hub, &mapper, &tagged).expect("tag download");
    assert_eq!(hub.fetch_count(), 4);
    assert!(cache.path().join("org").join("dataset@v1.0").is_dir());
}

#[test]
fn engine_errors_pass_through_cached_queries() {
    let scratch = tempfile::tempdir().expect("scratch");
    let cache = tempfile::tempdir().expect("cache");
    let hub = two_shard_hub(scratch.path());
    let mapper = CachePathMapper::new(cache.path());
    let location = resolve_location("org/dataset", None, None).expect("location");
    let session = Session::in_memory().expect("session");

    let err = query_hf_cached(
        &session,
        &hub,
        &mapper,
        &location,
        Some("SELECT missing_column FROM {table}"),
    )
    .expect_err("unknown column");
    assert!(matches!(err, DrDuckError::Query { .. }));
    assert!(err.to_string().contains("missing_column"));

    // The session stays usable after a failed query.
    let ok = query_to_df(&session, "SELECT 1 AS one").expect("follow-up query");
    assert_eq!(ok.height(), 1);
}
