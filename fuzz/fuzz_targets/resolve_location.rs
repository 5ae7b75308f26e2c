//! Fuzz target for hub location resolution.
//!
//! Feeds arbitrary UTF-8 to the resolver and, when it accepts the input,
//! maps a few paths through the cache layout. Checks for panics only.

#![no_main]

use dr_duck::{resolve_location, CachePathMapper};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Optional "input\npath\nrevision" triples exercise the merge rules too.
    let mut parts = text.splitn(3, '\n');
    let input = parts.next().unwrap_or_default();
    let path = parts.next();
    let revision = parts.next();

    let Ok(location) = resolve_location(input, path, revision) else {
        return;
    };

    let mapper = CachePathMapper::new("/cache");
    let _ = mapper.local_pattern(&location);
    let _ = mapper.local_path(&location, location.path_pattern());
    let _ = resolve_location(&location.hub_url(), None, None);
});
