// The <S:txdelta> payload: Base64 text of an svndiff stream plus the MD5 of
// the content it reconstructs.

use std::io::{self, BufReader, Read, Write};

use log::debug;
use md5::{Digest, Md5};

use super::base64::{Base64Decoder, Base64Encoder};
use super::stream::SvndiffStream;
use crate::svndiff::applier::StreamDecoder;
use crate::svndiff::encoder::EncodeOptions;
use crate::svndiff::error::DeltaError;
use crate::svndiff::generator::ReplaceWindows;

/// Lowercase hex MD5 digest of `bytes`.
pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Full-text delta of one file's content.
///
/// # Example
/// ```
/// use svndelta::transcode::TxDelta;
///
/// let delta = TxDelta::new(b"hello");
/// assert_eq!(delta.md5_checksum(), "5d41402abc4b2a76b9719d911017c592");
///
/// let mut text = Vec::new();
/// delta.write_base64_to(&mut text).unwrap();
/// assert!(text.starts_with(b"U1ZOA"));
/// ```
#[derive(Debug, Clone)]
pub struct TxDelta<'a> {
    content: &'a [u8],
    opts: EncodeOptions,
}

impl<'a> TxDelta<'a> {
    pub fn new(content: &'a [u8]) -> Self {
        Self::with_options(content, EncodeOptions::default())
    }

    pub fn with_options(content: &'a [u8], opts: EncodeOptions) -> Self {
        Self { content, opts }
    }

    /// Checksum the client verifies the reconstructed text against.
    pub fn md5_checksum(&self) -> String {
        md5_hex(self.content)
    }

    /// Raw svndiff stream.
    pub fn svndiff(&self) -> SvndiffStream<'a, ReplaceWindows<'a>> {
        SvndiffStream::from_content(self.content, &self.opts)
    }

    /// Base64 text of the svndiff stream.
    pub fn base64(&self) -> Base64Encoder<SvndiffStream<'a, ReplaceWindows<'a>>> {
        Base64Encoder::new(self.svndiff())
    }

    /// Copy the Base64 text into `w`, returning the number of characters
    /// written.
    pub fn write_base64_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<u64> {
        let written = io::copy(&mut self.base64(), w)?;
        debug!(
            "txdelta: {} content bytes as {} base64 chars",
            self.content.len(),
            written
        );
        Ok(written)
    }
}

/// Decode Base64 svndiff text, apply it to `source` and optionally check
/// the result against an expected hex MD5 digest (case-insensitive).
pub fn apply_txdelta<R: Read>(
    base64_text: R,
    source: &[u8],
    expected_md5: Option<&str>,
) -> Result<Vec<u8>, DeltaError> {
    let mut decoder = StreamDecoder::new(BufReader::new(Base64Decoder::new(base64_text)));
    decoder.decode_all(source)?;
    let output = decoder.into_output();

    if let Some(expected) = expected_md5 {
        let actual = md5_hex(&output);
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(DeltaError::ChecksumMismatch {
                expected: expected.trim().to_ascii_lowercase(),
                actual,
            });
        }
    }
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
