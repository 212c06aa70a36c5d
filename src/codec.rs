//! Key/value record framing.
//!
//! A [`FieldSet`] is packed into a [`FramedRecord`] as a flat run of
//! `(key_len, key, value_len, value)` tuples. Both lengths are 32-bit
//! big-endian integers. There is no record header, so a set with no fields
//! encodes to an empty buffer and the decoder consumes tuples until the
//! buffer is exhausted.

use std::fmt;

use thiserror::Error;

const LEN_PREFIX: usize = 4;

/// Errors raised while packing or unpacking records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended early or a length prefix pointed past its end.
    #[error("malformed record at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },
    /// A key or value does not fit a 32-bit length prefix.
    #[error("field {part} is {len} bytes; the limit is {}", u32::MAX)]
    FieldTooLarge { part: &'static str, len: usize },
}

/// A single key/value pair. Neither side is assumed to be text.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Field {
    /// Pair `key` with `value`.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("key", &String::from_utf8_lossy(&self.key))
            .field("value", &String::from_utf8_lossy(&self.value))
            .finish()
    }
}

/// Ordered fields describing one log event.
///
/// Duplicate keys are kept as-is; insertion order decides the wire layout.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    /// An empty set; encodes to an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty set with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Append a field to the end of the set.
    pub fn push(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.fields.push(Field::new(key, value));
    }

    /// Builder-style variant of [`push`](Self::push).
    pub fn with(mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.push(key, value);
        self
    }

    /// Number of fields, duplicates included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the set has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    /// Value of the first field whose key matches `key`.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|field| field.key == key)
            .map(|field| field.value.as_slice())
    }

    /// Number of bytes [`encode`] will produce for this set.
    pub fn encoded_len(&self) -> usize {
        self.fields
            .iter()
            .map(|f| 2 * LEN_PREFIX + f.key.len() + f.value.len())
            .sum()
    }
}

impl From<Vec<Field>> for FieldSet {
    fn from(fields: Vec<Field>) -> Self {
        Self { fields }
    }
}

impl<K, V> FromIterator<(K, V)> for FieldSet
where
    K: Into<Vec<u8>>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| Field::new(k, v)).collect(),
        }
    }
}

impl Extend<Field> for FieldSet {
    fn extend<I: IntoIterator<Item = Field>>(&mut self, iter: I) {
        self.fields.extend(iter);
    }
}

impl IntoIterator for FieldSet {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Encoded bytes of a [`FieldSet`], ready for the queue.
///
/// The buffer cannot be modified once built; ownership moves from the
/// producer through the queue to the emitter.
#[derive(Clone, PartialEq, Eq)]
pub struct FramedRecord(Vec<u8>);

impl FramedRecord {
    /// Wrap bytes produced elsewhere, e.g. by a peer speaking the same format.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record holds no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Unpack the record back into its fields.
    pub fn decode(&self) -> Result<FieldSet, CodecError> {
        decode(&self.0)
    }
}

impl AsRef<[u8]> for FramedRecord {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FramedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedRecord")
            .field("len", &self.0.len())
            .finish()
    }
}

fn prefix(part: &'static str, len: usize) -> Result<[u8; LEN_PREFIX], CodecError> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| CodecError::FieldTooLarge { part, len })
}

/// Pack `fields` into a single contiguous record.
///
/// ```
/// use lumberjack::{FieldSet, encode};
///
/// let record = encode(&FieldSet::new().with("host", "web1")).unwrap();
/// assert_eq!(record.as_bytes(), b"\0\0\0\x04host\0\0\0\x04web1");
/// assert_eq!(record.decode().unwrap(), FieldSet::new().with("host", "web1"));
/// ```
pub fn encode(fields: &FieldSet) -> Result<FramedRecord, CodecError> {
    let mut buf = Vec::with_capacity(fields.encoded_len());
    for field in fields {
        buf.extend(prefix("key", field.key.len())?);
        buf.extend_from_slice(&field.key);
        buf.extend(prefix("value", field.value.len())?);
        buf.extend_from_slice(&field.value);
    }
    Ok(FramedRecord(buf))
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, reason: &'static str) -> Result<&'a [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::Malformed {
                offset: self.pos,
                reason,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn length(&mut self, reason: &'static str) -> Result<usize, CodecError> {
        let raw = self.take(LEN_PREFIX, reason)?;
        let len = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        Ok(len as usize)
    }

    fn chunk(&mut self, what: &'static str) -> Result<Vec<u8>, CodecError> {
        let (prefix_reason, body_reason) = match what {
            "key" => ("truncated key length", "key length exceeds record"),
            _ => ("truncated value length", "value length exceeds record"),
        };
        let start = self.pos;
        let len = self.length(prefix_reason)?;
        self.take(len, body_reason)
            .map(<[u8]>::to_vec)
            .map_err(|_| CodecError::Malformed {
                offset: start,
                reason: body_reason,
            })
    }
}

/// Unpack a record produced by [`encode`].
///
/// Truncated buffers and length prefixes that overrun the buffer yield
/// [`CodecError::Malformed`]; nothing outside `buf` is read.
pub fn decode(buf: &[u8]) -> Result<FieldSet, CodecError> {
    let mut cursor = Cursor { buf, pos: 0 };
    let mut fields = Vec::new();
    while cursor.remaining() > 0 {
        let key = cursor.chunk("key")?;
        let value = cursor.chunk("value")?;
        fields.push(Field { key, value });
    }
    Ok(FieldSet { fields })
}
