// Streaming Base64 transcoding.
//
// Base64Encoder wraps any byte reader and produces standard padded Base64
// text without holding the whole input:
//   - The inner reader is drained in fixed blocks whose size is a multiple
//     of 3, so every block except the last encodes without padding
//   - Only the final short group is padded, once, at end of stream
//
// Base64Decoder goes the other way and tolerates the line wrapping XML
// bodies usually carry.

use std::io::{self, Read};

use base64::Engine as _;
use base64::engine::GeneralPurpose;
use base64::engine::general_purpose::STANDARD;
use base64::read::DecoderReader;
use log::debug;

/// Default input block size: 57 KiB, a multiple of 3.
pub const DEFAULT_BLOCK_SIZE: usize = 57 * 1024;

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Pull-style Base64 encoder over an inner byte reader.
///
/// Readable either as ASCII bytes through [`Read`] or as text chunks through
/// [`Iterator`]. Once the inner reader is exhausted the encoder keeps
/// reporting end of stream.
pub struct Base64Encoder<R: Read> {
    inner: R,
    block: Vec<u8>,
    /// Encoded text of the current block.
    out: String,
    out_pos: usize,
    done: bool,
    bytes_in: u64,
}

impl<R: Read> Base64Encoder<R> {
    pub fn new(inner: R) -> Self {
        Self::with_block_size(inner, DEFAULT_BLOCK_SIZE)
    }

    /// Encoder reading `block_size` bytes at a time, rounded down to a
    /// multiple of 3 (minimum 3).
    pub fn with_block_size(inner: R, block_size: usize) -> Self {
        let block_size = (block_size - block_size % 3).max(3);
        Self {
            inner,
            block: vec![0u8; block_size],
            out: String::new(),
            out_pos: 0,
            done: false,
            bytes_in: 0,
        }
    }

    /// Input bytes consumed from the inner reader so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Encode the next block into `self.out`. Returns `false` at end of
    /// stream.
    fn fill(&mut self) -> io::Result<bool> {
        if self.done {
            return Ok(false);
        }
        self.out.clear();
        self.out_pos = 0;

        // Fill the whole block so that only the final one can end on a
        // partial 3-byte group.
        let mut filled = 0;
        while filled < self.block.len() {
            match self.inner.read(&mut self.block[filled..]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }
        self.bytes_in += filled as u64;
        if self.done {
            debug!("base64 encoder: {} bytes in", self.bytes_in);
        }

        STANDARD.encode_string(&self.block[..filled], &mut self.out);
        Ok(!self.out.is_empty())
    }
}

impl<R: Read> Read for Base64Encoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.out_pos == self.out.len() && !self.fill()? {
            return Ok(0);
        }
        let pending = &self.out.as_bytes()[self.out_pos..];
        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        self.out_pos += n;
        Ok(n)
    }
}

impl<R: Read> Iterator for Base64Encoder<R> {
    type Item = io::Result<String>;

    /// Next chunk of Base64 text, at most one block's worth.
    fn next(&mut self) -> Option<Self::Item> {
        if self.out_pos < self.out.len() {
            // Base64 text is ASCII, any byte index is a char boundary.
            let rest = self.out[self.out_pos..].to_string();
            self.out_pos = self.out.len();
            return Some(Ok(rest));
        }
        match self.fill() {
            Ok(true) => {
                self.out_pos = 0;
                Some(Ok(std::mem::take(&mut self.out)))
            }
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Drops ASCII whitespace from the wrapped reader.
struct SkipWhitespace<R> {
    inner: R,
}

impl<R: Read> Read for SkipWhitespace<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.inner.read(buf)?;
            if n == 0 {
                return Ok(0);
            }
            let mut kept = 0;
            for i in 0..n {
                let b = buf[i];
                if !b.is_ascii_whitespace() {
                    buf[kept] = b;
                    kept += 1;
                }
            }
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

/// Incremental Base64 decoder over text that may contain whitespace.
///
/// Invalid characters surface as `io::ErrorKind::InvalidData`.
pub struct Base64Decoder<R: Read> {
    inner: DecoderReader<'static, GeneralPurpose, SkipWhitespace<R>>,
}

impl<R: Read> Base64Decoder<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: DecoderReader::new(SkipWhitespace { inner }, &STANDARD),
        }
    }
}

impl<R: Read> Read for Base64Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
