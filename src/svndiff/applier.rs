// svndiff window application and stream decoding.
//
// CopyFromSource addresses the caller's source buffer through the window's
// source view. CopyFromTarget addresses everything reconstructed so far,
// across all windows, and may overlap the bytes it is producing.
//
// Performance notes:
//   - The instruction section buffer is reused across windows in StreamDecoder
//   - Target copies that do not overlap their own output use a bulk copy
//   - Output is pre-sized to the window's target length, up to
//     HARD_MAX_WINDOW_SIZE

use std::io::Read;

use log::{debug, trace};

use super::error::{DeltaError, Region};
use super::instruction::{self, Instruction};
use super::window::{self, DiffWindow, HARD_MAX_WINDOW_SIZE, WindowHeader};

// ---------------------------------------------------------------------------
// Window applier
// ---------------------------------------------------------------------------

/// Applies windows in sequence, accumulating the reconstructed output.
#[derive(Debug, Default)]
pub struct WindowApplier {
    output: Vec<u8>,
}

impl WindowApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applier whose target copies may reference `prefix` as already
    /// reconstructed output.
    pub fn with_output(prefix: Vec<u8>) -> Self {
        Self { output: prefix }
    }

    /// Apply one window and return the bytes it produced.
    ///
    /// Source copies read `source[source_index + source_view_offset + offset..]`.
    /// On error the output is left exactly as it was before the call.
    pub fn apply(
        &mut self,
        window: &DiffWindow<'_>,
        source: &[u8],
        source_index: u64,
    ) -> Result<&[u8], DeltaError> {
        let start = self.output.len();
        match apply_into(window, source, source_index, &mut self.output) {
            Ok(()) => Ok(&self.output[start..]),
            Err(e) => {
                self.output.truncate(start);
                Err(e)
            }
        }
    }

    /// Everything reconstructed so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn into_output(self) -> Vec<u8> {
        self.output
    }
}

/// Apply a single window with no previously reconstructed output.
pub fn apply_window(
    window: &DiffWindow<'_>,
    source: &[u8],
    source_index: u64,
) -> Result<Vec<u8>, DeltaError> {
    let mut output = Vec::new();
    apply_into(window, source, source_index, &mut output)?;
    Ok(output)
}

/// Execute `window`'s instructions, appending to `output`.
fn apply_into(
    window: &DiffWindow<'_>,
    source: &[u8],
    source_index: u64,
    output: &mut Vec<u8>,
) -> Result<(), DeltaError> {
    // A declared length the instructions do not add up to is rejected here,
    // before it can size an allocation.
    window.validate()?;
    let base = output.len();
    let target_len = usize::try_from(window.target_view_length)
        .map_err(|_| DeltaError::Overflow("target view length exceeds usize"))?;
    output.reserve(target_len.min(HARD_MAX_WINDOW_SIZE));

    let view_start = source_index
        .checked_add(window.source_view_offset)
        .ok_or(DeltaError::Overflow("source view start"))?;
    let data: &[u8] = &window.data;
    let mut data_pos = 0usize;

    for inst in &window.instructions {
        let produced = (output.len() - base) as u64;
        if produced
            .checked_add(inst.length())
            .is_none_or(|end| end > window.target_view_length)
        {
            return Err(DeltaError::format(format!(
                "window produces more than its declared {target_len} bytes"
            )));
        }

        match *inst {
            Instruction::CopyFromSource { length, offset } => {
                let start = view_start
                    .checked_add(offset)
                    .ok_or(DeltaError::Overflow("source copy offset"))?;
                let range = checked_range(start, length, source.len())
                    .ok_or_else(|| {
                        DeltaError::out_of_range(Region::Source, start, length, source.len() as u64)
                    })?;
                output.extend_from_slice(&source[range]);
            }

            Instruction::CopyFromTarget { length, offset } => {
                let produced = output.len();
                if length == 0 {
                    continue;
                }
                let from = usize::try_from(offset)
                    .ok()
                    .filter(|&o| o < produced)
                    .ok_or_else(|| {
                        DeltaError::out_of_range(Region::Target, offset, length, produced as u64)
                    })?;
                let length = usize::try_from(length)
                    .map_err(|_| DeltaError::Overflow("target copy length"))?;
                copy_from_target(output, from, length);
            }

            Instruction::CopyFromData { length } => {
                let range = checked_range(data_pos as u64, length, data.len()).ok_or_else(
                    || {
                        DeltaError::out_of_range(
                            Region::Data,
                            data_pos as u64,
                            length,
                            (data.len() - data_pos) as u64,
                        )
                    },
                )?;
                data_pos = range.end;
                output.extend_from_slice(&data[range]);
            }
        }
    }

    let written = output.len() - base;
    if written != target_len {
        return Err(DeltaError::format(format!(
            "target size mismatch: expected {target_len}, got {written}"
        )));
    }
    Ok(())
}

/// `start..start + length` as a usize range if it fits inside `available`.
#[inline]
fn checked_range(start: u64, length: u64, available: usize) -> Option<std::ops::Range<usize>> {
    let end = start.checked_add(length)?;
    if end > available as u64 {
        return None;
    }
    Some(start as usize..end as usize)
}

/// Append `length` bytes read from `output[from..]`, one byte at a time when
/// the read range runs into the bytes being written.
#[inline]
fn copy_from_target(output: &mut Vec<u8>, from: usize, length: usize) {
    let produced = output.len();
    if from + length <= produced {
        output.extend_from_within(from..from + length);
    } else {
        // Overlapping: later reads must observe bytes this copy already
        // wrote, which is how runs are expressed.
        for i in 0..length {
            let byte = output[from + i];
            output.push(byte);
        }
    }
}

// ---------------------------------------------------------------------------
// Decode options
// ---------------------------------------------------------------------------

/// Configuration for [`StreamDecoder`].
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Largest target view (and section) accepted per window.
    pub max_window_size: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_window_size: HARD_MAX_WINDOW_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Stream decoder
// ---------------------------------------------------------------------------

/// Decodes and applies a complete svndiff stream, one window at a time.
///
/// The reconstructed output is accumulated because target copies may
/// address any earlier window.
pub struct StreamDecoder<R: Read> {
    reader: R,
    opts: DecodeOptions,
    signature_read: bool,
    finished: bool,
    /// Set by the first error; the decoder is unusable afterwards.
    failed: bool,
    windows_decoded: u64,
    /// Reusable instruction section buffer (grows to largest section).
    inst_buf: Vec<u8>,
    applier: WindowApplier,
}

impl<R: Read> StreamDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecodeOptions::default())
    }

    pub fn with_options(reader: R, opts: DecodeOptions) -> Self {
        Self {
            reader,
            opts,
            signature_read: false,
            finished: false,
            failed: false,
            windows_decoded: 0,
            inst_buf: Vec::new(),
            applier: WindowApplier::new(),
        }
    }

    /// Read the next window record without applying it.
    ///
    /// Returns `Ok(None)` when the stream has no more windows. After any
    /// error every further call fails as well.
    pub fn next_window(&mut self) -> Result<Option<DiffWindow<'static>>, DeltaError> {
        self.check_failed()?;
        let window = self.read_window();
        self.failed = window.is_err();
        window
    }

    fn read_window(&mut self) -> Result<Option<DiffWindow<'static>>, DeltaError> {
        if !self.signature_read {
            window::read_signature(&mut self.reader)?;
            self.signature_read = true;
        }
        if self.finished {
            return Ok(None);
        }

        let Some(wh) = WindowHeader::decode(&mut self.reader)? else {
            self.finished = true;
            debug!("svndiff stream ended after {} windows", self.windows_decoded);
            return Ok(None);
        };
        wh.check_limits(self.opts.max_window_size)?;
        trace!(
            "window {}: sview {}+{}, tview {}, inst {}, data {}",
            self.windows_decoded,
            wh.source_view_offset,
            wh.source_view_length,
            wh.target_view_length,
            wh.instructions_len,
            wh.data_len
        );

        self.inst_buf.clear();
        read_section(&mut self.reader, wh.instructions_len, &mut self.inst_buf)?;
        let mut data = Vec::new();
        read_section(&mut self.reader, wh.data_len, &mut data)?;

        let window = DiffWindow {
            source_view_offset: wh.source_view_offset,
            source_view_length: wh.source_view_length,
            target_view_length: wh.target_view_length,
            instructions: instruction::decode_section(&self.inst_buf)?,
            data: data.into(),
        };
        window.validate()?;
        Ok(Some(window))
    }

    /// Decode and apply the next window against `source`.
    ///
    /// Returns `Ok(Some(len))` with the number of bytes the window produced,
    /// or `Ok(None)` when there are no more windows.
    pub fn decode_window(&mut self, source: &[u8]) -> Result<Option<usize>, DeltaError> {
        let produced = self.apply_next(source);
        self.failed |= produced.is_err();
        produced
    }

    fn apply_next(&mut self, source: &[u8]) -> Result<Option<usize>, DeltaError> {
        let Some(window) = self.next_window()? else {
            return Ok(None);
        };
        let view_end = window
            .source_view_offset
            .checked_add(window.source_view_length)
            .ok_or(DeltaError::Overflow("source view end"))?;
        if view_end > source.len() as u64 {
            return Err(DeltaError::out_of_range(
                Region::Source,
                window.source_view_offset,
                window.source_view_length,
                source.len() as u64,
            ));
        }
        let produced = self.applier.apply(&window, source, 0)?.len();
        self.windows_decoded += 1;
        Ok(Some(produced))
    }

    /// Decode and apply all remaining windows.
    pub fn decode_all(&mut self, source: &[u8]) -> Result<(), DeltaError> {
        while self.decode_window(source)?.is_some() {}
        Ok(())
    }

    /// Output reconstructed so far.
    pub fn output(&self) -> &[u8] {
        self.applier.output()
    }

    fn check_failed(&self) -> Result<(), DeltaError> {
        if self.failed {
            return Err(DeltaError::format("svndiff stream already failed"));
        }
        Ok(())
    }

    pub fn windows_decoded(&self) -> u64 {
        self.windows_decoded
    }

    pub fn into_output(self) -> Vec<u8> {
        self.applier.into_output()
    }
}

/// Read exactly `len` bytes into `buf`. The buffer grows with the bytes
/// actually received, not with the length a header claims.
fn read_section<R: Read>(r: &mut R, len: usize, buf: &mut Vec<u8>) -> Result<(), DeltaError> {
    let got = r.by_ref().take(len as u64).read_to_end(buf)?;
    if got != len {
        return Err(DeltaError::format(format!(
            "truncated window section: {got} of {len} bytes"
        )));
    }
    Ok(())
}

/// Decode an in-memory svndiff stream against `initial_source`.
pub fn apply_stream(stream: &[u8], initial_source: &[u8]) -> Result<Vec<u8>, DeltaError> {
    let mut decoder = StreamDecoder::new(stream);
    decoder.decode_all(initial_source)?;
    Ok(decoder.into_output())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
