// svndiff window serialization and push-style stream encoding.
//
// StreamEncoder mirrors the decoder side:
//   - Content is fed in arbitrary chunks via write_content()
//   - Each full window is serialized and written immediately
//   - Constant memory: at most one window of content is buffered

use std::io::Write;

use log::{debug, trace};

use super::generator::{self, DEFAULT_WINDOW_SIZE};
use super::window::{self, DiffWindow, HARD_MAX_WINDOW_SIZE};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for svndiff encoding.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Maximum target length of a single window in bytes.
    pub window_size: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl EncodeOptions {
    /// Window size clamped to `1..=HARD_MAX_WINDOW_SIZE`.
    pub fn effective_window_size(&self) -> usize {
        self.window_size.clamp(1, HARD_MAX_WINDOW_SIZE)
    }
}

// ---------------------------------------------------------------------------
// Window serialization
// ---------------------------------------------------------------------------

/// Append one window record (header, instructions, new data) to `out`.
pub fn encode_window(window: &DiffWindow<'_>, out: &mut Vec<u8>) {
    let instructions = window.encode_instructions();
    let header = window.header();
    out.reserve(header.encoded_len() + instructions.len() + window.data.len());
    header.append_to(out);
    out.extend_from_slice(&instructions);
    out.extend_from_slice(&window.data);
}

/// Write one window record to `w`.
pub fn write_window<W: Write>(w: &mut W, window: &DiffWindow<'_>) -> std::io::Result<()> {
    let instructions = window.encode_instructions();
    let header = window.header();
    header.encode(w)?;
    w.write_all(&instructions)?;
    w.write_all(&window.data)
}

/// Encode `content` as a complete in-memory svndiff stream of replace
/// windows.
pub fn encode_memory(content: &[u8], opts: &EncodeOptions) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 16);
    out.extend_from_slice(&window::SVNDIFF_SIGNATURE);
    for w in generator::generate(content, opts.effective_window_size()) {
        encode_window(&w, &mut out);
    }
    out
}

// ---------------------------------------------------------------------------
// Streaming encoder
// ---------------------------------------------------------------------------

/// Push-style svndiff encoder.
///
/// # Example
/// ```no_run
/// use svndelta::svndiff::encoder::{EncodeOptions, StreamEncoder};
/// let mut output = Vec::new();
/// let mut enc = StreamEncoder::new(&mut output, EncodeOptions::default());
/// enc.write_content(b"file contents").unwrap();
/// enc.finish().unwrap();
/// ```
pub struct StreamEncoder<W: Write> {
    writer: W,
    window_size: usize,
    signature_written: bool,
    buffer: Vec<u8>,
    bytes_in: u64,
    windows_written: u64,
}

impl<W: Write> StreamEncoder<W> {
    pub fn new(writer: W, opts: EncodeOptions) -> Self {
        Self {
            writer,
            window_size: opts.effective_window_size(),
            signature_written: false,
            buffer: Vec::new(),
            bytes_in: 0,
            windows_written: 0,
        }
    }

    /// Feed content to the encoder.
    ///
    /// Data is buffered internally. Whenever the buffer reaches the window
    /// size, a complete window is written to the output.
    pub fn write_content(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.bytes_in += data.len() as u64;
        let mut offset = 0usize;

        // Complete a partially buffered window first.
        if !self.buffer.is_empty() {
            let need = self.window_size - self.buffer.len();
            let take = need.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            offset += take;

            if self.buffer.len() == self.window_size {
                let window = std::mem::take(&mut self.buffer);
                self.emit(&window)?;
                self.buffer = window;
                self.buffer.clear();
            }
        }

        // Fast path: encode full windows directly from caller-provided input.
        while offset + self.window_size <= data.len() {
            let end = offset + self.window_size;
            self.emit(&data[offset..end])?;
            offset = end;
        }

        // Buffer any trailing partial window.
        if offset < data.len() {
            self.buffer.extend_from_slice(&data[offset..]);
        }

        Ok(())
    }

    /// Flush the final (possibly short) window and the writer.
    ///
    /// Returns the underlying writer and the number of windows written.
    /// Empty content produces the bare signature.
    pub fn finish(mut self) -> std::io::Result<(W, u64)> {
        if !self.buffer.is_empty() {
            let remaining = std::mem::take(&mut self.buffer);
            self.emit(&remaining)?;
        }
        self.write_signature()?;
        self.writer.flush()?;
        debug!(
            "svndiff encoder: {} bytes in {} windows",
            self.bytes_in, self.windows_written
        );
        Ok((self.writer, self.windows_written))
    }

    /// Content bytes received so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    pub fn windows_written(&self) -> u64 {
        self.windows_written
    }

    fn write_signature(&mut self) -> std::io::Result<()> {
        if !self.signature_written {
            window::write_signature(&mut self.writer)?;
            self.signature_written = true;
        }
        Ok(())
    }

    fn emit(&mut self, content: &[u8]) -> std::io::Result<()> {
        self.write_signature()?;
        let w = DiffWindow::replace(content);
        trace!(
            "window {}: {} bytes",
            self.windows_written, w.target_view_length
        );
        write_window(&mut self.writer, &w)?;
        self.windows_written += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svndiff::applier::apply_stream;

    #[test]
    fn empty_content_is_signature_only() {
        assert_eq!(encode_memory(b"", &EncodeOptions::default()), b"SVN\0");

        let (out, windows) = StreamEncoder::new(Vec::new(), EncodeOptions::default())
            .finish()
            .unwrap();
        assert_eq!(out, b"SVN\0");
        assert_eq!(windows, 0);
    }

    #[test]
    fn small_content_exact_bytes() {
        let out = encode_memory(b"hello", &EncodeOptions::default());
        assert_eq!(
            out,
            [
                b'S', b'V', b'N', 0, // signature
                0x00, 0x00, 0x05, 0x01, 0x05, // header
                0x85, // new data, length 5
                b'h', b'e', b'l', b'l', b'o',
            ]
        );
    }

    #[test]
    fn long_window_uses_varint_length() {
        let content = vec![0x5A; 100];
        let out = encode_memory(&content, &EncodeOptions::default());
        // header: 0, 0, 100, inst len 2, data len 100
        assert_eq!(&out[4..9], &[0x00, 0x00, 0x64, 0x02, 0x64]);
        assert_eq!(&out[9..11], &[0x80, 0x64]);
        assert_eq!(&out[11..], &content[..]);
    }

    #[test]
    fn write_window_matches_encode_window() {
        let w = DiffWindow::replace(b"0123456789");
        let mut a = Vec::new();
        encode_window(&w, &mut a);
        let mut b = Vec::new();
        write_window(&mut b, &w).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn streaming_matches_memory_for_any_chunking() {
        let content: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let opts = EncodeOptions { window_size: 999 };
        let expected = encode_memory(&content, &opts);

        for chunk in [1usize, 7, 998, 999, 1000, 4096, 10_000] {
            let mut enc = StreamEncoder::new(Vec::new(), opts.clone());
            for piece in content.chunks(chunk) {
                enc.write_content(piece).unwrap();
            }
            assert_eq!(enc.bytes_in(), content.len() as u64);
            let (out, windows) = enc.finish().unwrap();
            assert_eq!(out, expected, "chunk size {chunk}");
            assert_eq!(windows, content.len().div_ceil(999) as u64);
        }
        assert_eq!(apply_stream(&expected, &[]).unwrap(), content);
    }

    #[test]
    fn window_size_is_clamped() {
        assert_eq!(EncodeOptions { window_size: 0 }.effective_window_size(), 1);
        assert_eq!(
            EncodeOptions {
                window_size: usize::MAX
            }
            .effective_window_size(),
            HARD_MAX_WINDOW_SIZE
        );
    }
}
