//! The Document/Value model — a tagged, self-describing tree.
//!
//! Every record handed to the engine is a [`Document`]: an ordered set of
//! `(column_id, Value)` pairs. Each [`Value`] carries its own type tag so the
//! on-disk representation is self-describing even without the catalog; the
//! catalog is still what gives the tag meaning (a column name and declared
//! type), but corruption in the catalog cannot turn a `Bool` into an `I64` on
//! read.
//!
//! Serialization builds directly on [`crate::encoding`]: deterministic,
//! reversible, and free of any external serialization dependency, matching
//! that module's own stated design goal.

use crate::catalog::ColumnType;
use crate::encoding::{self, Decode, Encode, EncodingError};

/// A single typed value. Column ids are represented separately by
/// [`Document`]; a bare `Value` does not know which column it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Signed 8-bit integer.
    I8(i8),
    /// Signed 16-bit integer.
    I16(i16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// IEEE-754 single precision float.
    F32(f32),
    /// IEEE-754 double precision float.
    F64(f64),
    /// UTF-8 string.
    String(String),
    /// Raw byte array.
    Bytes(Vec<u8>),
    /// A nested document (a sub-record with its own column ids).
    Document(Document),
}

impl Value {
    /// The [`ColumnType`] tag for this value.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Bool(_) => ColumnType::Bool,
            Value::I8(_) => ColumnType::I8,
            Value::I16(_) => ColumnType::I16,
            Value::I32(_) => ColumnType::I32,
            Value::I64(_) => ColumnType::I64,
            Value::U8(_) => ColumnType::U8,
            Value::U16(_) => ColumnType::U16,
            Value::U32(_) => ColumnType::U32,
            Value::U64(_) => ColumnType::U64,
            Value::F32(_) => ColumnType::F32,
            Value::F64(_) => ColumnType::F64,
            Value::String(_) => ColumnType::String,
            Value::Bytes(_) => ColumnType::Bytes,
            Value::Document(_) => ColumnType::Document,
        }
    }

    /// The raw bytes used for hashing/ordering when this value is the key
    /// column of an index. Numeric types are encoded big-endian so that
    /// byte-lexicographic order matches numeric order for unsigned values;
    /// the engine's ordering predicate additionally orders by `(hash, bytes,
    /// length)`, so this only needs to be deterministic, not monotonic.
    pub fn key_bytes(&self) -> Vec<u8> {
        match self {
            Value::Bool(b) => vec![u8::from(*b)],
            Value::I8(v) => v.to_be_bytes().to_vec(),
            Value::I16(v) => v.to_be_bytes().to_vec(),
            Value::I32(v) => v.to_be_bytes().to_vec(),
            Value::I64(v) => v.to_be_bytes().to_vec(),
            Value::U8(v) => v.to_be_bytes().to_vec(),
            Value::U16(v) => v.to_be_bytes().to_vec(),
            Value::U32(v) => v.to_be_bytes().to_vec(),
            Value::U64(v) => v.to_be_bytes().to_vec(),
            Value::F32(v) => v.to_be_bytes().to_vec(),
            Value::F64(v) => v.to_be_bytes().to_vec(),
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Bytes(b) => b.clone(),
            Value::Document(d) => encoding::encode_to_vec(d).unwrap_or_default(),
        }
    }
}

/// Tag discriminants for [`Value`], used as the wire prefix for each field.
/// Kept separate from [`ColumnType`]'s own discriminants so the wire format
/// is stable even if catalog-facing type enums are reordered.
const TAG_BOOL: u8 = 0;
const TAG_I8: u8 = 1;
const TAG_I16: u8 = 2;
const TAG_I32: u8 = 3;
const TAG_I64: u8 = 4;
const TAG_U8: u8 = 5;
const TAG_U16: u8 = 6;
const TAG_U32: u8 = 7;
const TAG_U64: u8 = 8;
const TAG_F32: u8 = 9;
const TAG_F64: u8 = 10;
const TAG_STRING: u8 = 11;
const TAG_BYTES: u8 = 12;
const TAG_DOCUMENT: u8 = 13;

impl Encode for Value {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        match self {
            Value::Bool(v) => {
                buf.push(TAG_BOOL);
                v.encode_to(buf)
            }
            Value::I8(v) => {
                buf.push(TAG_I8);
                buf.push(v.to_le_bytes()[0]);
                Ok(())
            }
            Value::I16(v) => {
                buf.push(TAG_I16);
                buf.extend_from_slice(&v.to_le_bytes());
                Ok(())
            }
            Value::I32(v) => {
                buf.push(TAG_I32);
                buf.extend_from_slice(&v.to_le_bytes());
                Ok(())
            }
            Value::I64(v) => {
                buf.push(TAG_I64);
                v.encode_to(buf)
            }
            Value::U8(v) => {
                buf.push(TAG_U8);
                v.encode_to(buf)
            }
            Value::U16(v) => {
                buf.push(TAG_U16);
                v.encode_to(buf)
            }
            Value::U32(v) => {
                buf.push(TAG_U32);
                v.encode_to(buf)
            }
            Value::U64(v) => {
                buf.push(TAG_U64);
                v.encode_to(buf)
            }
            Value::F32(v) => {
                buf.push(TAG_F32);
                buf.extend_from_slice(&v.to_le_bytes());
                Ok(())
            }
            Value::F64(v) => {
                buf.push(TAG_F64);
                buf.extend_from_slice(&v.to_le_bytes());
                Ok(())
            }
            Value::String(v) => {
                buf.push(TAG_STRING);
                v.encode_to(buf)
            }
            Value::Bytes(v) => {
                buf.push(TAG_BYTES);
                v.encode_to(buf)
            }
            Value::Document(v) => {
                buf.push(TAG_DOCUMENT);
                v.encode_to(buf)
            }
        }
    }
}

impl Decode for Value {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        if buf.is_empty() {
            return Err(EncodingError::UnexpectedEof {
                needed: 1,
                available: 0,
            });
        }
        let tag = buf[0];
        let rest = &buf[1..];
        let (value, consumed) = match tag {
            TAG_BOOL => {
                let (v, n) = bool::decode_from(rest)?;
                (Value::Bool(v), n)
            }
            TAG_I8 => {
                if rest.is_empty() {
                    return Err(EncodingError::UnexpectedEof {
                        needed: 1,
                        available: 0,
                    });
                }
                (Value::I8(rest[0] as i8), 1)
            }
            TAG_I16 => {
                if rest.len() < 2 {
                    return Err(EncodingError::UnexpectedEof {
                        needed: 2,
                        available: rest.len(),
                    });
                }
                (Value::I16(i16::from_le_bytes([rest[0], rest[1]])), 2)
            }
            TAG_I32 => {
                if rest.len() < 4 {
                    return Err(EncodingError::UnexpectedEof {
                        needed: 4,
                        available: rest.len(),
                    });
                }
                let arr: [u8; 4] = rest[..4]
                    .try_into()
                    .map_err(|_| EncodingError::Custom("i32 slice conversion".into()))?;
                (Value::I32(i32::from_le_bytes(arr)), 4)
            }
            TAG_I64 => {
                let (v, n) = i64::decode_from(rest)?;
                (Value::I64(v), n)
            }
            TAG_U8 => {
                let (v, n) = u8::decode_from(rest)?;
                (Value::U8(v), n)
            }
            TAG_U16 => {
                let (v, n) = u16::decode_from(rest)?;
                (Value::U16(v), n)
            }
            TAG_U32 => {
                let (v, n) = u32::decode_from(rest)?;
                (Value::U32(v), n)
            }
            TAG_U64 => {
                let (v, n) = u64::decode_from(rest)?;
                (Value::U64(v), n)
            }
            TAG_F32 => {
                if rest.len() < 4 {
                    return Err(EncodingError::UnexpectedEof {
                        needed: 4,
                        available: rest.len(),
                    });
                }
                let arr: [u8; 4] = rest[..4]
                    .try_into()
                    .map_err(|_| EncodingError::Custom("f32 slice conversion".into()))?;
                (Value::F32(f32::from_le_bytes(arr)), 4)
            }
            TAG_F64 => {
                if rest.len() < 8 {
                    return Err(EncodingError::UnexpectedEof {
                        needed: 8,
                        available: rest.len(),
                    });
                }
                let arr: [u8; 8] = rest[..8]
                    .try_into()
                    .map_err(|_| EncodingError::Custom("f64 slice conversion".into()))?;
                (Value::F64(f64::from_le_bytes(arr)), 8)
            }
            TAG_STRING => {
                let (v, n) = String::decode_from(rest)?;
                (Value::String(v), n)
            }
            TAG_BYTES => {
                let (v, n) = Vec::<u8>::decode_from(rest)?;
                (Value::Bytes(v), n)
            }
            TAG_DOCUMENT => {
                let (v, n) = Document::decode_from(rest)?;
                (Value::Document(v), n)
            }
            other => {
                return Err(EncodingError::InvalidTag {
                    tag: other as u32,
                    type_name: "Value",
                });
            }
        };
        Ok((value, 1 + consumed))
    }
}

/// An ordered set of `(column_id, Value)` fields — the on-wire record shape.
///
/// Field order is insertion order, not column id order; two documents with
/// the same fields in different orders encode to different bytes. Callers
/// that need canonical ordering should sort fields by column id before
/// encoding (the memtable/SST write path does this).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(u32, Value)>,
}

impl Document {
    /// An empty document.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Set (or replace) the value for `column_id`.
    pub fn set(&mut self, column_id: u32, value: Value) {
        if let Some(slot) = self.fields.iter_mut().find(|(id, _)| *id == column_id) {
            slot.1 = value;
        } else {
            self.fields.push((column_id, value));
        }
    }

    /// Get the value for `column_id`, if present.
    pub fn get(&self, column_id: u32) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(id, _)| *id == column_id)
            .map(|(_, v)| v)
    }

    /// Iterate over `(column_id, &Value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.fields.iter().map(|(id, v)| (*id, v))
    }

    /// Sort fields by column id, producing a canonical field order for
    /// on-disk encoding.
    pub fn canonicalize(&mut self) {
        self.fields.sort_by_key(|(id, _)| *id);
    }
}

impl Encode for Document {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        encoding::len_to_u32(self.fields.len())?.encode_to(buf)?;
        for (id, value) in &self.fields {
            id.encode_to(buf)?;
            value.encode_to(buf)?;
        }
        Ok(())
    }
}

impl Decode for Document {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (count, mut offset) = u32::decode_from(buf)?;
        if count > encoding::MAX_VEC_ELEMENTS {
            return Err(EncodingError::LengthOverflow(format!(
                "document field count {count} exceeds MAX_VEC_ELEMENTS"
            )));
        }
        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (id, n) = u32::decode_from(&buf[offset..])?;
            offset += n;
            let (value, n) = Value::decode_from(&buf[offset..])?;
            offset += n;
            fields.push((id, value));
        }
        Ok((Document { fields }, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_scalar_types() {
        let mut doc = Document::new();
        doc.set(0, Value::U64(42));
        doc.set(1, Value::String("hello".into()));
        doc.set(2, Value::Bool(true));
        doc.set(3, Value::F64(1.5));
        doc.set(4, Value::Bytes(vec![1, 2, 3]));
        doc.set(5, Value::I32(-7));

        let bytes = encoding::encode_to_vec(&doc).expect("encode");
        let (decoded, consumed) = Document::decode_from(&bytes).expect("decode");
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, doc);
    }

    #[test]
    fn nested_document_round_trips() {
        let mut inner = Document::new();
        inner.set(0, Value::String("nested".into()));
        let mut outer = Document::new();
        outer.set(0, Value::Document(inner.clone()));

        let bytes = encoding::encode_to_vec(&outer).expect("encode");
        let (decoded, _) = Document::decode_from(&bytes).expect("decode");
        assert_eq!(decoded.get(0), Some(&Value::Document(inner)));
    }

    #[test]
    fn set_replaces_existing_column() {
        let mut doc = Document::new();
        doc.set(0, Value::U64(1));
        doc.set(0, Value::U64(2));
        assert_eq!(doc.get(0), Some(&Value::U64(2)));
        assert_eq!(doc.iter().count(), 1);
    }
}
