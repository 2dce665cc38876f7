use svndelta::svndiff::{DeltaError, EncodeOptions, apply_stream, encode_memory};
use svndelta::transcode::{TxDelta, apply_txdelta, md5_hex};

#[derive(Debug)]
struct Vector {
    name: String,
    kind: String,
    source: Vec<u8>,
    delta: Vec<u8>,
    target: Vec<u8>,
}

fn hex_to_bytes(s: &str) -> Vec<u8> {
    hex::decode(s.trim()).unwrap_or_else(|e| panic!("bad hex {s:?}: {e}"))
}

fn load_vectors() -> Vec<Vector> {
    let manifest = include_str!("vectors/manifest.tsv");
    manifest
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|line| {
            let parts: Vec<_> = line.split('|').collect();
            assert_eq!(parts.len(), 5, "invalid vector row: {line}");
            Vector {
                name: parts[0].to_string(),
                kind: parts[1].to_string(),
                source: hex_to_bytes(parts[2]),
                delta: hex_to_bytes(parts[3]),
                target: hex_to_bytes(parts[4]),
            }
        })
        .collect()
}

fn variant_name(e: &DeltaError) -> &'static str {
    match e {
        DeltaError::Format(_) => "Format",
        DeltaError::UnsupportedOpcode(_) => "UnsupportedOpcode",
        DeltaError::OffsetOutOfRange { .. } => "OffsetOutOfRange",
        DeltaError::Overflow(_) => "Overflow",
        DeltaError::ChecksumMismatch { .. } => "ChecksumMismatch",
        DeltaError::Io(_) => "Io",
    }
}

#[test]
fn manifest_is_well_formed() {
    let vectors = load_vectors();
    assert!(vectors.len() >= 15);
    for v in &vectors {
        assert!(
            v.kind == "encode" || v.kind == "apply" || v.kind.starts_with("error:"),
            "{}: unknown kind {}",
            v.name,
            v.kind
        );
    }
}

#[test]
fn encoder_output_is_bit_exact() {
    for v in load_vectors().iter().filter(|v| v.kind == "encode") {
        assert!(v.source.is_empty(), "{}: encode vectors have no source", v.name);
        let delta = encode_memory(&v.target, &EncodeOptions::default());
        assert_eq!(delta, v.delta, "{}: encoded bytes differ", v.name);
    }
}

#[test]
fn decoder_reconstructs_target() {
    for v in load_vectors()
        .iter()
        .filter(|v| v.kind == "encode" || v.kind == "apply")
    {
        let out = apply_stream(&v.delta, &v.source)
            .unwrap_or_else(|e| panic!("{}: decode failed: {e}", v.name));
        assert_eq!(out, v.target, "{}: decoded bytes differ", v.name);
    }
}

#[test]
fn malformed_vectors_fail_with_expected_variant() {
    for v in load_vectors() {
        let Some(expected) = v.kind.strip_prefix("error:") else {
            continue;
        };
        let err = apply_stream(&v.delta, &v.source)
            .expect_err(&format!("{}: decode should fail", v.name));
        assert_eq!(variant_name(&err), expected, "{}: {err}", v.name);
    }
}

#[test]
fn txdelta_payloads_for_vectors() {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    for v in load_vectors().iter().filter(|v| v.kind == "encode") {
        let delta = TxDelta::new(&v.target);
        let mut text = Vec::new();
        delta.write_base64_to(&mut text).unwrap();
        assert_eq!(text, STANDARD.encode(&v.delta).into_bytes(), "{}", v.name);
        assert_eq!(delta.md5_checksum(), md5_hex(&v.target));

        let out = apply_txdelta(&text[..], &[], Some(&delta.md5_checksum())).unwrap();
        assert_eq!(out, v.target, "{}", v.name);
    }
}
