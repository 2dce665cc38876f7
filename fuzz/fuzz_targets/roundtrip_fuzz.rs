#![no_main]
use std::io::Read;

use libfuzzer_sys::fuzz_target;
use svndelta::svndiff::{EncodeOptions, StreamEncoder, apply_stream, encode_memory};
use svndelta::transcode::SvndiffStream;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the window size, the rest is content.
    let window_size = usize::from(data[0]) + 1;
    let content = &data[1..];
    let opts = EncodeOptions { window_size };

    let delta = encode_memory(content, &opts);
    assert_eq!(apply_stream(&delta, &[]).unwrap(), content);

    let mut pulled = Vec::new();
    SvndiffStream::from_content(content, &opts)
        .read_to_end(&mut pulled)
        .unwrap();
    assert_eq!(pulled, delta);

    let mut enc = StreamEncoder::new(Vec::new(), opts);
    for chunk in content.chunks(window_size / 2 + 1) {
        enc.write_content(chunk).unwrap();
    }
    let (pushed, _) = enc.finish().unwrap();
    assert_eq!(pushed, delta);
});
