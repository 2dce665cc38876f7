// Stream- and file-level helpers for svndiff encoding/decoding.
//
// `encode_stream()` / `decode_stream()` run the streaming pipeline between
// any reader and writer, optionally through Base64. `encode_file()` and
// `decode_file()` wrap them with buffered file I/O. MD5 checksums are
// computed incrementally as data flows through the pipeline.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderWriter;
use log::debug;
use md5::{Digest, Md5};

use crate::svndiff::applier::{DecodeOptions, StreamDecoder};
use crate::svndiff::encoder::{EncodeOptions, StreamEncoder};
use crate::svndiff::error::DeltaError;
use crate::transcode::base64::Base64Decoder;

// ---------------------------------------------------------------------------
// Options and stats
// ---------------------------------------------------------------------------

/// How a delta is represented on disk or on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeltaEncoding {
    /// Raw svndiff bytes.
    #[default]
    Binary,
    /// Standard padded Base64 text of the svndiff bytes.
    Base64,
}

#[derive(Debug, Clone, Default)]
pub struct EncodeFileOptions {
    pub encoding: DeltaEncoding,
    pub svndiff: EncodeOptions,
}

#[derive(Debug, Clone, Default)]
pub struct DecodeFileOptions {
    pub encoding: DeltaEncoding,
    /// Lowercase or uppercase hex MD5 the output must match.
    pub expected_md5: Option<String>,
    pub svndiff: DecodeOptions,
}

/// Statistics returned by `encode_stream()` / `encode_file()`.
#[derive(Debug, Clone)]
pub struct EncodeStats {
    /// Content bytes read.
    pub content_size: u64,
    /// Delta bytes written (Base64 characters when encoding to text).
    pub delta_size: u64,
    /// Number of svndiff windows written.
    pub windows: u64,
    /// Hex MD5 of the content.
    pub content_md5: String,
}

/// Statistics returned by `decode_stream()` / `decode_file()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    pub source_size: u64,
    /// Delta bytes read (Base64 characters when decoding text).
    pub delta_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// Number of svndiff windows decoded.
    pub windows: u64,
    /// Hex MD5 of the reconstructed output.
    pub output_md5: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for stream and file operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Malformed delta or checksum failure.
    #[error("decode error: {0}")]
    Delta(#[from] DeltaError),
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// encode
// ---------------------------------------------------------------------------

/// Encode everything `reader` yields as an svndiff stream of replace windows
/// written to `writer`.
///
/// Returns the writer (flushed) together with the stats.
pub fn encode_stream<R: Read, W: Write>(
    mut reader: R,
    writer: W,
    opts: &EncodeFileOptions,
) -> Result<(W, EncodeStats), IoError> {
    let counted = Counting::new(writer);
    let (mut counted, partial) = match opts.encoding {
        DeltaEncoding::Binary => encode_content(&mut reader, counted, &opts.svndiff)?,
        DeltaEncoding::Base64 => {
            let text = EncoderWriter::new(counted, &STANDARD);
            let (mut text, partial) = encode_content(&mut reader, text, &opts.svndiff)?;
            (text.finish()?, partial)
        }
    };
    counted.flush()?;

    let stats = EncodeStats {
        delta_size: counted.count,
        ..partial
    };
    debug!(
        "encoded {} content bytes into {} delta bytes ({} windows)",
        stats.content_size, stats.delta_size, stats.windows
    );
    Ok((counted.inner, stats))
}

fn encode_content<R: Read, W: Write>(
    reader: &mut R,
    writer: W,
    opts: &EncodeOptions,
) -> io::Result<(W, EncodeStats)> {
    let mut encoder = StreamEncoder::new(writer, opts.clone());
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        encoder.write_content(&buf[..n])?;
    }
    let content_size = encoder.bytes_in();
    let (writer, windows) = encoder.finish()?;
    Ok((
        writer,
        EncodeStats {
            content_size,
            delta_size: 0,
            windows,
            content_md5: hex::encode(hasher.finalize()),
        },
    ))
}

/// Encode the file at `content_path`, writing the delta to `delta_path`.
///
/// The content is streamed through a `BufReader`; only one window is held in
/// memory at a time. The delta output uses `BufWriter`.
pub fn encode_file(
    content_path: &Path,
    delta_path: &Path,
    opts: &EncodeFileOptions,
) -> Result<EncodeStats, IoError> {
    let content = BufReader::with_capacity(BUF_SIZE, File::open(content_path)?);
    let delta = BufWriter::with_capacity(BUF_SIZE, File::create(delta_path)?);
    let (_, stats) = encode_stream(content, delta, opts)?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------------

/// Decode the svndiff stream from `reader` against `source`, writing the
/// reconstructed content to `writer`.
///
/// Nothing reaches `writer` unless the whole stream decodes and, when
/// `opts.expected_md5` is set, the output matches it. A mismatch is
/// reported as [`DeltaError::ChecksumMismatch`].
pub fn decode_stream<R: Read, W: Write>(
    reader: R,
    source: &[u8],
    mut writer: W,
    opts: &DecodeFileOptions,
) -> Result<(W, DecodeStats), IoError> {
    let mut counted = Counting::new(reader);

    let (output, windows) = {
        let input: Box<dyn Read + '_> = match opts.encoding {
            DeltaEncoding::Binary => Box::new(&mut counted),
            DeltaEncoding::Base64 => Box::new(BufReader::with_capacity(
                BUF_SIZE,
                Base64Decoder::new(&mut counted),
            )),
        };
        let mut decoder = StreamDecoder::with_options(input, opts.svndiff.clone());

        // Target copies may reach back into earlier windows, so the decoder
        // keeps the whole output anyway.
        decoder.decode_all(source)?;
        let windows = decoder.windows_decoded();
        (decoder.into_output(), windows)
    };

    let output_md5 = hex::encode(Md5::digest(&output));
    if let Some(expected) = opts.expected_md5.as_deref() {
        if !output_md5.eq_ignore_ascii_case(expected.trim()) {
            return Err(DeltaError::ChecksumMismatch {
                expected: expected.trim().to_ascii_lowercase(),
                actual: output_md5,
            }
            .into());
        }
    }
    writer.write_all(&output)?;
    writer.flush()?;

    let stats = DecodeStats {
        source_size: source.len() as u64,
        delta_size: counted.count,
        output_size: output.len() as u64,
        windows,
        output_md5,
    };
    debug!(
        "decoded {} delta bytes into {} output bytes ({} windows)",
        stats.delta_size, stats.output_size, stats.windows
    );
    Ok((writer, stats))
}

/// Decode the delta at `delta_path`, writing the result to `output_path`.
///
/// The source (if any) is read fully into memory. On failure the output
/// file is removed.
pub fn decode_file(
    source_path: Option<&Path>,
    delta_path: &Path,
    output_path: &Path,
    opts: &DecodeFileOptions,
) -> Result<DecodeStats, IoError> {
    let source = match source_path {
        Some(path) => std::fs::read(path)?,
        None => Vec::new(),
    };
    let delta = BufReader::with_capacity(BUF_SIZE, File::open(delta_path)?);
    let output = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);

    match decode_stream(delta, &source, output, opts) {
        Ok((_, stats)) => Ok(stats),
        Err(e) => {
            let _ = std::fs::remove_file(output_path);
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Byte-counting adapter
// ---------------------------------------------------------------------------

struct Counting<T> {
    inner: T,
    count: u64,
}

impl<T> Counting<T> {
    fn new(inner: T) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for Counting<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

impl<W: Write> Write for Counting<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::md5_hex;
    use tempfile::tempdir;

    fn base64_opts() -> (EncodeFileOptions, DecodeFileOptions) {
        (
            EncodeFileOptions {
                encoding: DeltaEncoding::Base64,
                ..Default::default()
            },
            DecodeFileOptions {
                encoding: DeltaEncoding::Base64,
                ..Default::default()
            },
        )
    }

    #[test]
    fn encode_decode_file_roundtrip() {
        let dir = tempdir().unwrap();
        let content_path = dir.path().join("content.bin");
        let delta_path = dir.path().join("content.svndiff");
        let output_path = dir.path().join("output.bin");
        let content = b"The quick brown fox jumps over the lazy dog. 1234567890";
        std::fs::write(&content_path, content).unwrap();

        let enc = encode_file(&content_path, &delta_path, &EncodeFileOptions::default()).unwrap();
        assert_eq!(enc.content_size, content.len() as u64);
        assert_eq!(enc.windows, 1);
        assert_eq!(
            enc.delta_size,
            std::fs::metadata(&delta_path).unwrap().len()
        );
        assert_eq!(enc.content_md5, md5_hex(content));

        let dec = decode_file(
            None,
            &delta_path,
            &output_path,
            &DecodeFileOptions {
                expected_md5: Some(enc.content_md5.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(dec.output_size, content.len() as u64);
        assert_eq!(dec.delta_size, enc.delta_size);
        assert_eq!(dec.output_md5, enc.content_md5);
        assert_eq!(std::fs::read(&output_path).unwrap(), content);
    }

    #[test]
    fn base64_file_roundtrip() {
        let dir = tempdir().unwrap();
        let content_path = dir.path().join("content.bin");
        let delta_path = dir.path().join("content.b64");
        let output_path = dir.path().join("output.bin");
        let content: Vec<u8> = (0..=255u8).cycle().take(300_001).collect();
        std::fs::write(&content_path, &content).unwrap();

        let (enc_opts, dec_opts) = base64_opts();
        let enc = encode_file(&content_path, &delta_path, &enc_opts).unwrap();
        assert_eq!(enc.windows, 4);

        let text = std::fs::read(&delta_path).unwrap();
        assert_eq!(text.len() as u64, enc.delta_size);
        assert_eq!(text.len() % 4, 0);
        assert!(text.starts_with(b"U1ZOA"));

        decode_file(None, &delta_path, &output_path, &dec_opts).unwrap();
        assert_eq!(std::fs::read(&output_path).unwrap(), content);
    }

    #[test]
    fn base64_stream_matches_txdelta() {
        let content = b"payload for the wire".repeat(50);
        let (enc_opts, _) = base64_opts();
        let (text, _) = encode_stream(&content[..], Vec::new(), &enc_opts).unwrap();

        let mut expected = Vec::new();
        crate::transcode::TxDelta::new(&content)
            .write_base64_to(&mut expected)
            .unwrap();
        assert_eq!(text, expected);
    }

    #[test]
    fn empty_content_is_signature_only() {
        let (delta, stats) =
            encode_stream(io::empty(), Vec::new(), &EncodeFileOptions::default()).unwrap();
        assert_eq!(delta, b"SVN\0");
        assert_eq!(stats.windows, 0);
        assert_eq!(stats.content_md5, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn checksum_mismatch_removes_output() {
        let dir = tempdir().unwrap();
        let content_path = dir.path().join("content.bin");
        let delta_path = dir.path().join("content.svndiff");
        let output_path = dir.path().join("output.bin");
        std::fs::write(&content_path, b"abc").unwrap();
        encode_file(&content_path, &delta_path, &EncodeFileOptions::default()).unwrap();

        let err = decode_file(
            None,
            &delta_path,
            &output_path,
            &DecodeFileOptions {
                expected_md5: Some(md5_hex(b"abd")),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IoError::Delta(DeltaError::ChecksumMismatch { .. })
        ));
        assert!(!output_path.exists());
    }

    #[test]
    fn failed_decode_writes_nothing() {
        use crate::svndiff::{DiffWindow, Instruction};
        use crate::transcode::SvndiffStream;
        use std::borrow::Cow;

        let corrupt = DiffWindow {
            source_view_offset: 0,
            source_view_length: 0,
            target_view_length: 2,
            instructions: vec![Instruction::CopyFromTarget {
                length: 2,
                offset: 99,
            }],
            data: Cow::Borrowed(&[]),
        };
        let windows = vec![
            DiffWindow::replace(b"first"),
            corrupt,
            DiffWindow::replace(b"third"),
        ];
        let mut sink = Vec::new();
        let err = decode_stream(
            SvndiffStream::new(windows),
            &[],
            &mut sink,
            &DecodeFileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IoError::Delta(DeltaError::OffsetOutOfRange { .. })
        ));
        assert!(sink.is_empty());

        // A checksum mismatch is detected before any output is written.
        let err = decode_stream(
            SvndiffStream::new(vec![DiffWindow::replace(b"hello")]),
            &[],
            &mut sink,
            &DecodeFileOptions {
                expected_md5: Some(md5_hex(b"")),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IoError::Delta(DeltaError::ChecksumMismatch { .. })
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn malformed_delta_is_reported() {
        let err = decode_stream(
            &b"SVN\x01"[..],
            &[],
            Vec::new(),
            &DecodeFileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IoError::Delta(DeltaError::Format(_))));
    }

    #[test]
    fn decode_with_source_file() {
        // One window copying "world" out of the source and "hello " from data.
        let delta = [
            b'S', b'V', b'N', 0, // signature
            0x00, 0x05, 0x0B, 0x03, 0x06, // header: sview 0+5, tview 11
            0x86, // new data, length 6
            0x05, 0x00, // source copy, length 5, offset 0
            b'h', b'e', b'l', b'l', b'o', b' ',
        ];
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("source.bin");
        let delta_path = dir.path().join("delta.svndiff");
        let output_path = dir.path().join("output.bin");
        std::fs::write(&source_path, b"world").unwrap();
        std::fs::write(&delta_path, delta).unwrap();

        let stats = decode_file(
            Some(&source_path),
            &delta_path,
            &output_path,
            &DecodeFileOptions::default(),
        )
        .unwrap();
        assert_eq!(stats.source_size, 5);
        assert_eq!(std::fs::read(&output_path).unwrap(), b"hello world");
    }
}
