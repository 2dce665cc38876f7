// svndiff0 format implementation.
//
// This module provides encoding and decoding of the Subversion svndiff0
// delta format, byte-for-byte compatible with what Subversion clients read.
//
// # Modules
//
// - `varint`     : Variable-length integer encoding (base-128, big-endian)
// - `instruction`: Single copy instruction encoding/decoding
// - `window`     : Stream signature, window header and the DiffWindow model
// - `generator`  : Splitting content into replace windows
// - `encoder`    : Window serialization and push-style stream encoding
// - `applier`    : Window application and stream decoding
// - `error`      : The DeltaError type shared by all of the above

pub mod applier;
pub mod encoder;
pub mod error;
pub mod generator;
pub mod instruction;
pub mod varint;
pub mod window;

// Re-export key types for convenience.
pub use applier::{DecodeOptions, StreamDecoder, WindowApplier, apply_stream, apply_window};
pub use encoder::{EncodeOptions, StreamEncoder, encode_memory};
pub use error::{DeltaError, Region};
pub use generator::{DEFAULT_WINDOW_SIZE, ReplaceWindows, create_replace_window, generate};
pub use instruction::{Instruction, InstructionKind};
pub use window::{DiffWindow, HARD_MAX_WINDOW_SIZE, SVNDIFF_SIGNATURE, WindowHeader};
