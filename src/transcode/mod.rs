// Wire transcoding for the WebDAV boundary.
//
// # Modules
//
// - `stream` : svndiff serialization as a `Read`
// - `base64` : Streaming Base64 encoder/decoder
// - `txdelta`: Base64 payload + MD5 checksum for <S:txdelta>

pub mod base64;
pub mod stream;
pub mod txdelta;

pub use self::base64::{Base64Decoder, Base64Encoder, DEFAULT_BLOCK_SIZE};
pub use stream::SvndiffStream;
pub use txdelta::{TxDelta, apply_txdelta, md5_hex};
