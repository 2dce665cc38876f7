#![no_main]
use libfuzzer_sys::fuzz_target;
use svndelta::svndiff::apply_stream;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = apply_stream(data, &[]);

    // Same bytes behind a valid signature, against a non-empty source.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (source, body) = data.split_at(split);
        let mut delta = b"SVN\0".to_vec();
        delta.extend_from_slice(body);
        let _ = apply_stream(&delta, source);
    }
});
