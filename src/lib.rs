//! svndelta: svndiff0 delta windows and Base64 txdelta transcoding in Rust.
//!
//! The crate provides:
//! - The svndiff0 codec: varints, instructions, windows, generation and
//!   application (`svndiff`)
//! - Pull-style serialization and Base64 transcoding for WebDAV bodies
//!   (`transcode`)
//! - Stream- and file-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use svndelta::svndiff::{EncodeOptions, apply_stream, encode_memory};
//! use svndelta::transcode::{TxDelta, apply_txdelta};
//!
//! let content = b"hello new world";
//!
//! let delta = encode_memory(content, &EncodeOptions::default());
//! assert_eq!(apply_stream(&delta, &[]).unwrap(), content);
//!
//! let txdelta = TxDelta::new(content);
//! let mut text = Vec::new();
//! txdelta.write_base64_to(&mut text).unwrap();
//! let md5 = txdelta.md5_checksum();
//! assert_eq!(apply_txdelta(&text[..], &[], Some(&md5)).unwrap(), content);
//! ```

pub mod io;
pub mod svndiff;
pub mod transcode;

#[cfg(feature = "cli")]
pub mod cli;
