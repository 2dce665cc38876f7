#![no_main]
use libfuzzer_sys::fuzz_target;
use svndelta::transcode::{TxDelta, apply_txdelta, md5_hex};

fuzz_target!(|data: &[u8]| {
    // Arbitrary text must be rejected cleanly.
    let _ = apply_txdelta(data, &[], None);

    // Generated payloads must decode back with a matching checksum.
    let delta = TxDelta::new(data);
    let mut text = Vec::new();
    delta.write_base64_to(&mut text).unwrap();
    let out = apply_txdelta(&text[..], &[], Some(&md5_hex(data))).unwrap();
    assert_eq!(out, data);
});
