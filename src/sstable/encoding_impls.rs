//! Encode / Decode implementations for SSTable on-disk payloads.
//!
//! Split into its own file for readability, matching the teacher's
//! `sstable/encoding_impls.rs` layout — the types themselves live in
//! `super` and `super::builder`.

use crate::catalog::IndexKind;
use crate::encoding::{Decode, Encode, EncodingError};

use super::PersistedIndexItem;

impl Encode for PersistedIndexItem {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.hash.encode_to(buf)?;
        self.bytes.encode_to(buf)?;
        self.record_id.encode_to(buf)?;
        self.deleted.encode_to(buf)?;
        self.value_offset.encode_to(buf)?;
        self.value_length.encode_to(buf)?;
        self.primary_key.encode_to(buf)?;
        self.is_primary_key_deleted.encode_to(buf)
    }
}

impl Decode for PersistedIndexItem {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (hash, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (bytes, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (record_id, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (deleted, n) = bool::decode_from(&buf[offset..])?;
        offset += n;
        let (value_offset, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (value_length, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (primary_key, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (is_primary_key_deleted, n) = bool::decode_from(&buf[offset..])?;
        offset += n;
        Ok((
            PersistedIndexItem {
                hash,
                bytes,
                record_id,
                deleted,
                value_offset,
                value_length,
                primary_key,
                is_primary_key_deleted,
            },
            offset,
        ))
    }
}

/// Payload of a `sstable-index` block: bounds, the compressed bloom filter,
/// and the pointer to this index's `sstable-index-data` block (§4.6).
pub(crate) struct IndexPayload {
    pub index_id: u32,
    pub kind: IndexKind,
    pub first_hash: u64,
    pub first_bytes: Vec<u8>,
    pub last_hash: u64,
    pub last_bytes: Vec<u8>,
    pub bloom_codec_id: u32,
    pub bloom_packed: Vec<u8>,
    pub data_location: u64,
    pub data_size: u64,
    pub item_count: u32,
}

impl Encode for IndexPayload {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.index_id.encode_to(buf)?;
        self.kind.encode_to(buf)?;
        self.first_hash.encode_to(buf)?;
        self.first_bytes.encode_to(buf)?;
        self.last_hash.encode_to(buf)?;
        self.last_bytes.encode_to(buf)?;
        self.bloom_codec_id.encode_to(buf)?;
        self.bloom_packed.encode_to(buf)?;
        self.data_location.encode_to(buf)?;
        self.data_size.encode_to(buf)?;
        self.item_count.encode_to(buf)
    }
}

impl Decode for IndexPayload {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (index_id, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (kind, n) = IndexKind::decode_from(&buf[offset..])?;
        offset += n;
        let (first_hash, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (first_bytes, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (last_hash, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (last_bytes, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (bloom_codec_id, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (bloom_packed, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (data_location, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (data_size, n) = u64::decode_from(&buf[offset..])?;
        offset += n;
        let (item_count, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        Ok((
            IndexPayload {
                index_id,
                kind,
                first_hash,
                first_bytes,
                last_hash,
                last_bytes,
                bloom_codec_id,
                bloom_packed,
                data_location,
                data_size,
                item_count,
            },
            offset,
        ))
    }
}

/// Fixed header prefixing a `sstable-index-data` block's compressed item
/// stream: how many items it holds, which codec packed it, and how large
/// the packed payload is (the rest of the block's payload bytes).
pub(crate) struct IndexDataHeader {
    pub record_count: u32,
    pub codec_id: u32,
    pub packed_size: u32,
}

impl Encode for IndexDataHeader {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.record_count.encode_to(buf)?;
        self.codec_id.encode_to(buf)?;
        self.packed_size.encode_to(buf)
    }
}

impl Decode for IndexDataHeader {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (record_count, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (codec_id, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        let (packed_size, n) = u32::decode_from(&buf[offset..])?;
        offset += n;
        Ok((
            IndexDataHeader {
                record_count,
                codec_id,
                packed_size,
            },
            offset,
        ))
    }
}
