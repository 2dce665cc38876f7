// Error type shared by every svndiff operation.
//
// Every variant is terminal for the operation that produced it: the input is
// malformed, not transiently unavailable, so callers abort the enclosing
// request instead of retrying.

use std::fmt;
use std::io;

/// Which byte region a copy instruction tried to read past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// The caller-supplied source buffer (CopyFromSource).
    Source,
    /// The source view declared by the window header (CopyFromSource).
    SourceView,
    /// Output reconstructed so far (CopyFromTarget).
    Target,
    /// The window's inline data section (CopyFromData).
    Data,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Source => "source",
            Region::SourceView => "source view",
            Region::Target => "target",
            Region::Data => "new data",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// Truncated or malformed signature, varint, window header or section.
    #[error("malformed svndiff: {0}")]
    Format(String),

    /// Instruction selector bits outside the three defined kinds.
    #[error("unsupported instruction opcode {0:#04b}")]
    UnsupportedOpcode(u8),

    /// A copy instruction's range exceeds the bytes available to it.
    #[error(
        "{region} range out of bounds: {length} bytes at offset {offset}, {available} available"
    )]
    OffsetOutOfRange {
        region: Region,
        offset: u64,
        length: u64,
        available: u64,
    },

    /// A decoded integer does not fit the representable range.
    #[error("integer overflow: {0}")]
    Overflow(&'static str),

    /// Reconstructed content does not match the expected MD5 digest.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl DeltaError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub(crate) fn out_of_range(region: Region, offset: u64, length: u64, available: u64) -> Self {
        Self::OffsetOutOfRange {
            region,
            offset,
            length,
            available,
        }
    }
}

impl From<io::Error> for DeltaError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            // A reader running dry mid-record means the stream was truncated.
            io::ErrorKind::UnexpectedEof => Self::Format("unexpected end of stream".into()),
            // Raised by transcoding readers (invalid Base64 text).
            io::ErrorKind::InvalidData => Self::Format(e.to_string()),
            _ => Self::Io(e),
        }
    }
}

impl From<DeltaError> for io::Error {
    fn from(e: DeltaError) -> io::Error {
        match e {
            DeltaError::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_maps_to_format_error() {
        let e: DeltaError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(e, DeltaError::Format(_)));

        let e: DeltaError = io::Error::new(io::ErrorKind::InvalidData, "bad base64").into();
        assert!(matches!(e, DeltaError::Format(_)));

        let e: DeltaError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(e, DeltaError::Io(_)));
    }

    #[test]
    fn display_names_region() {
        let e = DeltaError::out_of_range(Region::Data, 3, 10, 4);
        assert_eq!(
            e.to_string(),
            "new data range out of bounds: 10 bytes at offset 3, 4 available"
        );
        assert_eq!(
            DeltaError::UnsupportedOpcode(3).to_string(),
            "unsupported instruction opcode 0b11"
        );
    }

    #[test]
    fn into_io_error_keeps_io_kind() {
        let e: io::Error = DeltaError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).into();
        assert_eq!(e.kind(), io::ErrorKind::BrokenPipe);

        let e: io::Error = DeltaError::Overflow("varint").into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
    }
}
