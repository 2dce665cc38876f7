// svndiff0 instruction encoding.
//
// Every instruction starts with one selector byte:
//
//   bits 7-6  kind: 00 copy from source, 01 copy from target, 10 copy from new data
//   bits 5-0  length, or 0 if the length follows as a varint
//
// Source and target copies are followed by their offset as a varint.

use super::error::DeltaError;
use super::varint;

/// Largest length written inline in the selector byte.
pub const MAX_INLINE_LENGTH: u64 = 62;

const KIND_SHIFT: u8 = 6;
const LENGTH_MASK: u8 = 0x3F;

/// The 2-bit instruction selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    CopyFromSource = 0b00,
    CopyFromTarget = 0b01,
    CopyFromData = 0b10,
}

impl InstructionKind {
    #[inline]
    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn from_bits(bits: u8) -> Result<Self, DeltaError> {
        match bits {
            0b00 => Ok(Self::CopyFromSource),
            0b01 => Ok(Self::CopyFromTarget),
            0b10 => Ok(Self::CopyFromData),
            other => Err(DeltaError::UnsupportedOpcode(other)),
        }
    }
}

/// A single decoded svndiff instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Copy `length` bytes of the source view starting at `offset`.
    CopyFromSource { length: u64, offset: u64 },
    /// Copy `length` bytes of already reconstructed output starting at
    /// `offset`. The range may run into bytes this instruction produces.
    CopyFromTarget { length: u64, offset: u64 },
    /// Take the next `length` bytes of the window's new-data section.
    CopyFromData { length: u64 },
}

impl Instruction {
    #[inline]
    pub fn kind(&self) -> InstructionKind {
        match self {
            Self::CopyFromSource { .. } => InstructionKind::CopyFromSource,
            Self::CopyFromTarget { .. } => InstructionKind::CopyFromTarget,
            Self::CopyFromData { .. } => InstructionKind::CopyFromData,
        }
    }

    /// Number of target bytes this instruction produces.
    #[inline]
    pub fn length(&self) -> u64 {
        match *self {
            Self::CopyFromSource { length, .. }
            | Self::CopyFromTarget { length, .. }
            | Self::CopyFromData { length } => length,
        }
    }

    /// Offset operand, `None` for `CopyFromData`.
    #[inline]
    pub fn offset(&self) -> Option<u64> {
        match *self {
            Self::CopyFromSource { offset, .. } | Self::CopyFromTarget { offset, .. } => {
                Some(offset)
            }
            Self::CopyFromData { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Append the encoding of `inst` to `out`.
pub fn encode_instruction(inst: &Instruction, out: &mut Vec<u8>) {
    let length = inst.length();
    let selector = inst.kind().bits() << KIND_SHIFT;
    if (1..=MAX_INLINE_LENGTH).contains(&length) {
        out.push(selector | length as u8);
    } else {
        out.push(selector);
        varint::append_u64(out, length);
    }
    if let Some(offset) = inst.offset() {
        varint::append_u64(out, offset);
    }
}

/// Encoded size of `inst` in bytes.
pub fn encoded_len(inst: &Instruction) -> usize {
    let length = inst.length();
    let mut n = 1;
    if !(1..=MAX_INLINE_LENGTH).contains(&length) {
        n += varint::sizeof_u64(length);
    }
    if let Some(offset) = inst.offset() {
        n += varint::sizeof_u64(offset);
    }
    n
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one instruction from the front of `data`.
/// Returns `(instruction, bytes_consumed)`.
pub fn decode_instruction(data: &[u8]) -> Result<(Instruction, usize), DeltaError> {
    let (&selector, rest) = data
        .split_first()
        .ok_or_else(|| DeltaError::format("truncated instruction"))?;
    let kind = InstructionKind::from_bits(selector >> KIND_SHIFT)?;
    let mut pos = 1;

    // Other producers inline 63 as well; accept anything nonzero.
    let length = match selector & LENGTH_MASK {
        0 => {
            let (len, consumed) = varint::read_u64(rest)?;
            pos += consumed;
            len
        }
        inline => u64::from(inline),
    };
    if length == 0 {
        return Err(DeltaError::format("zero-length instruction"));
    }

    let inst = match kind {
        InstructionKind::CopyFromData => Instruction::CopyFromData { length },
        InstructionKind::CopyFromSource | InstructionKind::CopyFromTarget => {
            let (offset, consumed) = varint::read_u64(&data[pos..])?;
            pos += consumed;
            if kind == InstructionKind::CopyFromSource {
                Instruction::CopyFromSource { length, offset }
            } else {
                Instruction::CopyFromTarget { length, offset }
            }
        }
    };
    Ok((inst, pos))
}

/// Iterate over the instructions of a whole instruction section.
pub struct InstructionReader<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> InstructionReader<'a> {
    pub fn new(section: &'a [u8]) -> Self {
        Self {
            data: section,
            pos: 0,
            failed: false,
        }
    }

    /// Bytes of the section consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for InstructionReader<'_> {
    type Item = Result<Instruction, DeltaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        match decode_instruction(&self.data[self.pos..]) {
            Ok((inst, consumed)) => {
                self.pos += consumed;
                Some(Ok(inst))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Decode a complete instruction section.
pub fn decode_section(section: &[u8]) -> Result<Vec<Instruction>, DeltaError> {
    InstructionReader::new(section).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
