// Pull-style svndiff serialization.
//
// SvndiffStream turns any sequence of windows into a `Read`:
//   - The signature comes first, then one record per window
//   - Only the current header + instruction section is buffered
//   - New data is copied straight out of the window, never staged

use std::borrow::Cow;
use std::io::{self, Read};

use log::{debug, trace};

use crate::svndiff::encoder::EncodeOptions;
use crate::svndiff::generator::{self, ReplaceWindows};
use crate::svndiff::window::{DiffWindow, SVNDIFF_SIGNATURE};

/// `Read` adapter producing an svndiff stream from a window iterator.
///
/// # Example
/// ```
/// use std::io::Read;
/// use svndelta::svndiff::EncodeOptions;
/// use svndelta::transcode::SvndiffStream;
///
/// let mut out = Vec::new();
/// SvndiffStream::from_content(b"abc", &EncodeOptions::default())
///     .read_to_end(&mut out)
///     .unwrap();
/// assert_eq!(&out[..4], b"SVN\0");
/// ```
pub struct SvndiffStream<'a, I> {
    windows: I,
    /// Signature, then the header and instruction section of the current window.
    head: Vec<u8>,
    head_pos: usize,
    data: Cow<'a, [u8]>,
    data_pos: usize,
    windows_emitted: u64,
    bytes_emitted: u64,
    exhausted: bool,
}

impl<'a, I> SvndiffStream<'a, I>
where
    I: Iterator<Item = DiffWindow<'a>>,
{
    pub fn new<T>(windows: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            windows: windows.into_iter(),
            head: SVNDIFF_SIGNATURE.to_vec(),
            head_pos: 0,
            data: Cow::Borrowed(&[]),
            data_pos: 0,
            windows_emitted: 0,
            bytes_emitted: 0,
            exhausted: false,
        }
    }

    /// Windows fully or partially serialized so far.
    pub fn windows_emitted(&self) -> u64 {
        self.windows_emitted
    }

    /// Stream bytes handed out so far.
    pub fn bytes_emitted(&self) -> u64 {
        self.bytes_emitted
    }

    /// Load the next window's record. Returns `false` at end of stream.
    fn advance(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let Some(window) = self.windows.next() else {
            self.exhausted = true;
            debug!(
                "svndiff stream: {} windows, {} bytes",
                self.windows_emitted, self.bytes_emitted
            );
            return false;
        };
        trace!(
            "serializing window {}: tview {}, {} instructions, data {}",
            self.windows_emitted,
            window.target_view_length,
            window.instructions.len(),
            window.data.len()
        );

        self.head.clear();
        self.head_pos = 0;
        window.header().append_to(&mut self.head);
        for inst in &window.instructions {
            crate::svndiff::instruction::encode_instruction(inst, &mut self.head);
        }
        self.data = window.data;
        self.data_pos = 0;
        self.windows_emitted += 1;
        true
    }
}

impl<'a> SvndiffStream<'a, ReplaceWindows<'a>> {
    /// Stream of replace windows over `content`.
    pub fn from_content(content: &'a [u8], opts: &EncodeOptions) -> Self {
        Self::new(generator::generate(content, opts.effective_window_size()))
    }
}

impl<'a, I> Read for SvndiffStream<'a, I>
where
    I: Iterator<Item = DiffWindow<'a>>,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            if self.head_pos < self.head.len() {
                let n = (self.head.len() - self.head_pos).min(buf.len() - written);
                buf[written..written + n]
                    .copy_from_slice(&self.head[self.head_pos..self.head_pos + n]);
                self.head_pos += n;
                written += n;
            } else if self.data_pos < self.data.len() {
                let n = (self.data.len() - self.data_pos).min(buf.len() - written);
                buf[written..written + n]
                    .copy_from_slice(&self.data[self.data_pos..self.data_pos + n]);
                self.data_pos += n;
                written += n;
            } else if !self.advance() {
                break;
            }
        }
        self.bytes_emitted += written as u64;
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
