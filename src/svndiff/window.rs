// svndiff stream signature, window records and the in-memory window model.
//
// Stream layout:
//
//   'S' 'V' 'N' 0x00                       signature, version 0
//   window*:
//     varint source view offset
//     varint source view length
//     varint target view length
//     varint instruction section length
//     varint new-data section length
//     instruction section bytes
//     new-data section bytes

use std::borrow::Cow;
use std::io::{Read, Write};

use super::error::{DeltaError, Region};
use super::instruction::{self, Instruction};
use super::varint;

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

pub const SVNDIFF_SIGNATURE: [u8; 4] = *b"SVN\0";

/// Maximum window size accepted when decoding (16 MiB). Bounds the
/// allocation made for a window before any of its bytes are validated.
pub const HARD_MAX_WINDOW_SIZE: usize = 1 << 24;

/// Write the stream signature.
pub fn write_signature<W: Write>(w: &mut W) -> std::io::Result<()> {
    w.write_all(&SVNDIFF_SIGNATURE)
}

/// Read and validate the stream signature.
pub fn read_signature<R: Read>(r: &mut R) -> Result<(), DeltaError> {
    let mut sig = [0u8; 4];
    r.read_exact(&mut sig).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            DeltaError::format("missing svndiff signature")
        } else {
            DeltaError::from(e)
        }
    })?;
    if sig[..3] != SVNDIFF_SIGNATURE[..3] {
        return Err(DeltaError::format(format!(
            "invalid svndiff signature: {:02X} {:02X} {:02X}",
            sig[0], sig[1], sig[2]
        )));
    }
    if sig[3] != 0 {
        return Err(DeltaError::format(format!(
            "unsupported svndiff version {}",
            sig[3]
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Window header
// ---------------------------------------------------------------------------

/// The five varints opening a window record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowHeader {
    pub source_view_offset: u64,
    pub source_view_length: u64,
    pub target_view_length: u64,
    pub instructions_len: usize,
    pub data_len: usize,
}

impl WindowHeader {
    /// Encode the header to a writer.
    pub fn encode<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        varint::write_u64(w, self.source_view_offset)?;
        varint::write_u64(w, self.source_view_length)?;
        varint::write_u64(w, self.target_view_length)?;
        varint::write_u64(w, self.instructions_len as u64)?;
        varint::write_u64(w, self.data_len as u64)
    }

    /// Append the header to an in-memory buffer.
    pub fn append_to(&self, out: &mut Vec<u8>) {
        varint::append_u64(out, self.source_view_offset);
        varint::append_u64(out, self.source_view_length);
        varint::append_u64(out, self.target_view_length);
        varint::append_u64(out, self.instructions_len as u64);
        varint::append_u64(out, self.data_len as u64);
    }

    /// Decode a window header.
    ///
    /// Returns `Ok(None)` at a clean end of stream (no bytes before the
    /// first field).
    pub fn decode<R: Read>(r: &mut R) -> Result<Option<Self>, DeltaError> {
        let Some(source_view_offset) = varint::stream_read_u64(r)? else {
            return Ok(None);
        };
        let source_view_length = required_u64(r)?;
        let target_view_length = required_u64(r)?;
        let instructions_len = varint::stream_read_usize(r)?;
        let data_len = varint::stream_read_usize(r)?;

        if source_view_offset.checked_add(source_view_length).is_none() {
            return Err(DeltaError::Overflow("source view end exceeds 64 bits"));
        }

        Ok(Some(Self {
            source_view_offset,
            source_view_length,
            target_view_length,
            instructions_len,
            data_len,
        }))
    }

    /// Reject windows larger than `max_window_size` before allocating for
    /// them.
    pub fn check_limits(&self, max_window_size: usize) -> Result<(), DeltaError> {
        let max = max_window_size as u64;
        if self.target_view_length > max {
            return Err(DeltaError::format(format!(
                "target view length {} exceeds limit {max}",
                self.target_view_length
            )));
        }
        if self.data_len as u64 > self.target_view_length {
            return Err(DeltaError::format(format!(
                "new data length {} exceeds target view length {}",
                self.data_len, self.target_view_length
            )));
        }
        // Each instruction produces at least one byte and takes at most
        // 1 + 2 * MAX_VARINT_LEN bytes.
        let max_inst = (self.target_view_length.max(1) as usize)
            .saturating_mul(1 + 2 * varint::MAX_VARINT_LEN);
        if self.instructions_len > max_inst {
            return Err(DeltaError::format(format!(
                "instruction section length {} too large for target view length {}",
                self.instructions_len, self.target_view_length
            )));
        }
        Ok(())
    }

    /// Encoded size of the header in bytes.
    pub fn encoded_len(&self) -> usize {
        varint::sizeof_u64(self.source_view_offset)
            + varint::sizeof_u64(self.source_view_length)
            + varint::sizeof_u64(self.target_view_length)
            + varint::sizeof_u64(self.instructions_len as u64)
            + varint::sizeof_u64(self.data_len as u64)
    }
}

fn required_u64<R: Read>(r: &mut R) -> Result<u64, DeltaError> {
    varint::stream_read_u64(r)?.ok_or_else(|| DeltaError::format("truncated window header"))
}

// ---------------------------------------------------------------------------
// Diff window
// ---------------------------------------------------------------------------

/// One bounded unit of an svndiff stream.
///
/// Windows built by the generator borrow their new data from the caller's
/// buffer; windows decoded from the wire own it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffWindow<'a> {
    /// Position in the source that the window's source view starts at.
    pub source_view_offset: u64,
    /// Bytes of source the window may reference.
    pub source_view_length: u64,
    /// Bytes the window produces.
    pub target_view_length: u64,
    pub instructions: Vec<Instruction>,
    /// Literal bytes consumed in order by `CopyFromData` instructions.
    pub data: Cow<'a, [u8]>,
}

impl<'a> DiffWindow<'a> {
    /// Window producing `data` verbatim with a single `CopyFromData`.
    pub fn replace(data: &'a [u8]) -> Self {
        let length = data.len() as u64;
        Self {
            source_view_offset: 0,
            source_view_length: 0,
            target_view_length: length,
            instructions: vec![Instruction::CopyFromData { length }],
            data: Cow::Borrowed(data),
        }
    }

    /// Encoded instruction section.
    pub fn encode_instructions(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.instructions_encoded_len());
        for inst in &self.instructions {
            instruction::encode_instruction(inst, &mut out);
        }
        out
    }

    pub fn instructions_encoded_len(&self) -> usize {
        self.instructions.iter().map(instruction::encoded_len).sum()
    }

    /// Header describing this window's record.
    pub fn header(&self) -> WindowHeader {
        WindowHeader {
            source_view_offset: self.source_view_offset,
            source_view_length: self.source_view_length,
            target_view_length: self.target_view_length,
            instructions_len: self.instructions_encoded_len(),
            data_len: self.data.len(),
        }
    }

    /// Check the structural invariants: instruction lengths add up to the
    /// target view, new-data instructions consume the data section exactly,
    /// and source copies stay inside the source view.
    pub fn validate(&self) -> Result<(), DeltaError> {
        let mut produced: u64 = 0;
        let mut data_used: u64 = 0;
        for inst in &self.instructions {
            produced = produced
                .checked_add(inst.length())
                .ok_or(DeltaError::Overflow("window target length"))?;
            match *inst {
                Instruction::CopyFromData { length } => {
                    data_used = data_used
                        .checked_add(length)
                        .ok_or(DeltaError::Overflow("window data length"))?;
                }
                Instruction::CopyFromSource { length, offset } => {
                    let end = offset
                        .checked_add(length)
                        .ok_or(DeltaError::Overflow("source copy end"))?;
                    if end > self.source_view_length {
                        return Err(DeltaError::out_of_range(
                            Region::SourceView,
                            offset,
                            length,
                            self.source_view_length,
                        ));
                    }
                }
                Instruction::CopyFromTarget { .. } => {}
            }
        }
        if produced != self.target_view_length {
            return Err(DeltaError::format(format!(
                "instructions produce {produced} bytes, window declares {}",
                self.target_view_length
            )));
        }
        if data_used != self.data.len() as u64 {
            return Err(DeltaError::format(format!(
                "instructions consume {data_used} new-data bytes, window carries {}",
                self.data.len()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrip_and_rejects() {
        let mut out = Vec::new();
        write_signature(&mut out).unwrap();
        assert_eq!(out, b"SVN\0");
        read_signature(&mut out.as_slice()).unwrap();

        assert!(matches!(
            read_signature(&mut &b"SVN\x01"[..]),
            Err(DeltaError::Format(_))
        ));
        assert!(matches!(
            read_signature(&mut &b"\xD6\xC3\xC4\0"[..]),
            Err(DeltaError::Format(_))
        ));
        assert!(matches!(
            read_signature(&mut &b"SV"[..]),
            Err(DeltaError::Format(_))
        ));
    }

    #[test]
    fn header_roundtrip() {
        let wh = WindowHeader {
            source_view_offset: 0,
            source_view_length: 12,
            target_view_length: 16,
            instructions_len: 7,
            data_len: 1,
        };
        let mut out = Vec::new();
        wh.encode(&mut out).unwrap();
        assert_eq!(out, [0x00, 0x0C, 0x10, 0x07, 0x01]);
        assert_eq!(wh.encoded_len(), out.len());

        let mut appended = Vec::new();
        wh.append_to(&mut appended);
        assert_eq!(appended, out);

        let decoded = WindowHeader::decode(&mut out.as_slice()).unwrap().unwrap();
        assert_eq!(decoded, wh);
    }

    #[test]
    fn header_clean_end_and_truncation() {
        assert!(WindowHeader::decode(&mut &[][..]).unwrap().is_none());
        assert!(matches!(
            WindowHeader::decode(&mut &[0x00, 0x00, 0x05][..]),
            Err(DeltaError::Format(_))
        ));
    }

    #[test]
    fn header_limits() {
        let wh = WindowHeader {
            target_view_length: 100,
            instructions_len: 2,
            data_len: 100,
            ..Default::default()
        };
        assert!(wh.check_limits(100).is_ok());
        assert!(wh.check_limits(99).is_err());

        let too_much_data = WindowHeader { data_len: 101, ..wh };
        assert!(too_much_data.check_limits(1000).is_err());
    }

    #[test]
    fn replace_window_shape() {
        let w = DiffWindow::replace(b"hello");
        assert_eq!(w.source_view_length, 0);
        assert_eq!(w.target_view_length, 5);
        assert_eq!(w.instructions, [Instruction::CopyFromData { length: 5 }]);
        assert_eq!(w.encode_instructions(), [0x85]);
        assert!(w.validate().is_ok());
        assert_eq!(w.header().data_len, 5);
        assert_eq!(w.header().instructions_len, 1);
    }

    #[test]
    fn validate_catches_inconsistent_windows() {
        let mut w = DiffWindow::replace(b"abcd");
        w.target_view_length = 5;
        assert!(matches!(w.validate(), Err(DeltaError::Format(_))));

        let mut w = DiffWindow::replace(b"abcd");
        w.data = Cow::Owned(b"abcde".to_vec());
        assert!(matches!(w.validate(), Err(DeltaError::Format(_))));

        let w = DiffWindow {
            source_view_offset: 0,
            source_view_length: 2,
            target_view_length: 3,
            instructions: vec![Instruction::CopyFromSource {
                length: 3,
                offset: 0,
            }],
            data: Cow::Borrowed(&[]),
        };
        assert!(matches!(
            w.validate(),
            Err(DeltaError::OffsetOutOfRange {
                region: Region::SourceView,
                ..
            })
        ));
    }
}
