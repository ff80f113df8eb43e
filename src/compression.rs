//! Pluggable compression codecs.
//!
//! A codec exposes [`Compressor::pack`]/[`Compressor::unpack`] and a stable
//! numeric id persisted in the superblock (§6). The id is what lets a reopen
//! select the right implementation without re-negotiating anything: the
//! superblock's `compression_type` field is written once, at format time,
//! and honored verbatim by every subsequent open.

use thiserror::Error;

/// Errors a compression codec can report.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// The codec id stored in the superblock has no registered implementation.
    #[error("unknown compression codec id: {0}")]
    UnknownCodec(u32),

    /// The underlying codec failed to pack or unpack a buffer.
    #[error("compression codec failure: {0}")]
    CodecFailure(String),
}

/// A pluggable (de)compression codec.
pub trait Compressor: Send + Sync {
    /// This codec's stable numeric id, persisted in the superblock.
    fn id(&self) -> u32;

    /// Compress `input`, returning the packed bytes.
    fn pack(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError>;

    /// Decompress `input`, returning the original bytes. Must satisfy
    /// `unpack(pack(x)) == x` for every `x`.
    fn unpack(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError>;
}

/// Codec id: no compression, bytes are stored verbatim. Useful for tests and
/// for callers who want the block layer's framing without the CPU cost.
pub const CODEC_NONE: u32 = 0;

/// Codec id: DEFLATE via `flate2`, the reference codec named in §6.
pub const CODEC_DEFLATE: u32 = 1;

/// The identity codec (`pack`/`unpack` are both no-ops).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn id(&self) -> u32 {
        CODEC_NONE
    }

    fn pack(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(input.to_vec())
    }

    fn unpack(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(input.to_vec())
    }
}

/// The reference DEFLATE codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn id(&self) -> u32 {
        CODEC_DEFLATE
    }

    fn pack(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        use flate2::Compression;
        use flate2::write::DeflateEncoder;
        use std::io::Write;

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(input)
            .map_err(|e| CompressionError::CodecFailure(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CompressionError::CodecFailure(e.to_string()))
    }

    fn unpack(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        use flate2::write::DeflateDecoder;
        use std::io::Write;

        let mut decoder = DeflateDecoder::new(Vec::new());
        decoder
            .write_all(input)
            .map_err(|e| CompressionError::CodecFailure(e.to_string()))?;
        decoder
            .finish()
            .map_err(|e| CompressionError::CodecFailure(e.to_string()))
    }
}

/// Resolve a codec id to its implementation. Returns
/// [`CompressionError::UnknownCodec`] for any id the build does not register
/// — the caller maps this to `TosDbError::UnknownCompression` at open time.
pub fn resolve(id: u32) -> Result<Box<dyn Compressor>, CompressionError> {
    match id {
        CODEC_NONE => Ok(Box::new(NoneCompressor)),
        CODEC_DEFLATE => Ok(Box::new(DeflateCompressor)),
        other => Err(CompressionError::UnknownCodec(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_round_trips() {
        let codec = DeflateCompressor;
        let input = b"the quick brown fox jumps over the lazy dog".repeat(16);
        let packed = codec.pack(&input).expect("pack");
        let unpacked = codec.unpack(&packed).expect("unpack");
        assert_eq!(unpacked, input);
    }

    #[test]
    fn none_round_trips() {
        let codec = NoneCompressor;
        let input = b"raw bytes".to_vec();
        assert_eq!(codec.unpack(&codec.pack(&input).unwrap()).unwrap(), input);
    }

    #[test]
    fn resolve_unknown_id_errors() {
        assert!(matches!(
            resolve(9999),
            Err(CompressionError::UnknownCodec(9999))
        ));
    }

    #[test]
    fn resolve_known_ids() {
        assert!(resolve(CODEC_NONE).is_ok());
        assert!(resolve(CODEC_DEFLATE).is_ok());
    }
}
