//! Binary tuple codec.
//!
//! A tuple is a flat ordered sequence of typed column values encoded as:
//!
//! ```text
//! u8 flags (reserved)
//! null bitmap      ceil(n/8) bytes, bit i set = column i is SQL NULL
//! no-value bitmap  ceil(n/8) bytes, bit i set = column i is absent
//! offset table     (n+1) u32 big-endian offsets into the payload
//! payload          concatenated per-column encodings
//! ```
//!
//! The column count `n` comes from the schema, not from the buffer. The
//! offset table gives O(1) random access to any column without decoding the
//! preceding ones. Null and absent columns occupy an empty payload span;
//! the bitmaps are authoritative and both states round-trip exactly.
//!
//! All multi-byte integers are big-endian. Every type has one canonical
//! binary width; there are no variable-length integer encodings.

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{GridError, Result};
use crate::schema::Column;
use crate::types::{ColumnType, Value};

const FLAGS_SIZE: usize = 1;
const OFFSET_ENTRY_SIZE: usize = 4;

fn bitmap_size(count: usize) -> usize {
    count.div_ceil(8)
}

fn bit(map: &[u8], index: usize) -> bool {
    map[index / 8] & (1 << (index % 8)) != 0
}

fn set_bit(map: &mut [u8], index: usize) {
    map[index / 8] |= 1 << (index % 8);
}

/// Encodes a single value into the canonical payload representation.
///
/// This is the one exhaustive dispatch over value variants for encoding; the
/// colocation hasher feeds the same representation into its mixer.
pub(crate) fn encode_value(dst: &mut BytesMut, value: &Value) -> Result<()> {
    match value {
        Value::Null => {
            return Err(GridError::Format(
                "null values are encoded via the null bitmap, not the payload".to_string(),
            ))
        }
        Value::Boolean(v) => dst.put_u8(u8::from(*v)),
        Value::Int8(v) => dst.put_i8(*v),
        Value::Int16(v) => dst.put_i16(*v),
        Value::Int32(v) => dst.put_i32(*v),
        Value::Int64(v) => dst.put_i64(*v),
        Value::Float(v) => dst.put_f32(*v),
        Value::Double(v) => dst.put_f64(*v),
        Value::Decimal { unscaled, .. } => dst.put_i128(*unscaled),
        Value::Date(v) => dst.put_i32(*v),
        Value::Time(v) => dst.put_i64(*v),
        Value::Datetime(v) => dst.put_i64(*v),
        Value::Timestamp(v) => dst.put_i64(*v),
        Value::Uuid(v) => dst.put_slice(v.as_bytes()),
        Value::Bitmask(v) => dst.put_slice(v),
        Value::String(v) => dst.put_slice(v.as_bytes()),
        Value::Bytes(v) => dst.put_slice(v),
        Value::Period {
            years,
            months,
            days,
        } => {
            dst.put_i32(*years);
            dst.put_i32(*months);
            dst.put_i32(*days);
        }
        Value::Duration { seconds, nanos } => {
            dst.put_i64(*seconds);
            dst.put_i32(*nanos);
        }
        Value::Number(v) => dst.put_i128(*v),
    }
    Ok(())
}

/// Builds a binary tuple column by column.
///
/// Columns must be appended in schema order; `build` fails unless exactly
/// the declared number of columns was appended.
#[derive(Debug)]
pub struct BinaryTupleBuilder {
    count: usize,
    appended: usize,
    null_map: Vec<u8>,
    no_value_map: Vec<u8>,
    ends: Vec<u32>,
    payload: BytesMut,
}

impl BinaryTupleBuilder {
    /// Creates a builder for a tuple with the given column count.
    pub fn new(count: usize) -> Self {
        Self {
            count,
            appended: 0,
            null_map: vec![0; bitmap_size(count)],
            no_value_map: vec![0; bitmap_size(count)],
            ends: Vec::with_capacity(count),
            payload: BytesMut::with_capacity(count * 8),
        }
    }

    /// Appends the next column's value.
    ///
    /// Fails with [`GridError::Format`] when the value's runtime type does
    /// not match the column's declared type; nothing is written in that case.
    pub fn append(&mut self, column: &Column, value: &Value) -> Result<()> {
        self.check_capacity()?;

        if !value.matches(column.column_type, column.scale) {
            return Err(GridError::Format(format!(
                "value {:?} does not match declared type {:?} of column '{}'",
                value, column.column_type, column.name
            )));
        }

        if value.is_null() {
            set_bit(&mut self.null_map, self.appended);
        } else {
            encode_value(&mut self.payload, value)?;
        }

        self.push_end();
        Ok(())
    }

    /// Appends an explicitly absent column (no value), as used by partial
    /// tuples. Distinct from appending [`Value::Null`].
    pub fn append_no_value(&mut self) -> Result<()> {
        self.check_capacity()?;
        set_bit(&mut self.no_value_map, self.appended);
        self.push_end();
        Ok(())
    }

    /// Finishes the tuple and returns the encoded bytes.
    pub fn build(self) -> Result<Bytes> {
        if self.appended != self.count {
            return Err(GridError::Format(format!(
                "tuple has {} of {} declared columns",
                self.appended, self.count
            )));
        }

        let mut out = BytesMut::with_capacity(
            FLAGS_SIZE
                + 2 * bitmap_size(self.count)
                + OFFSET_ENTRY_SIZE * (self.count + 1)
                + self.payload.len(),
        );
        out.put_u8(0);
        out.put_slice(&self.null_map);
        out.put_slice(&self.no_value_map);
        out.put_u32(0);
        for end in &self.ends {
            out.put_u32(*end);
        }
        out.put_slice(&self.payload);
        Ok(out.freeze())
    }

    fn check_capacity(&self) -> Result<()> {
        if self.appended >= self.count {
            return Err(GridError::Format(format!(
                "tuple already holds all {} declared columns",
                self.count
            )));
        }
        Ok(())
    }

    fn push_end(&mut self) {
        self.ends.push(self.payload.len() as u32);
        self.appended += 1;
    }
}

/// The decoded state of one column slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// The column was absent from the tuple.
    NoValue,
    /// The column was present with an explicit null.
    Null,
    /// The column holds a value.
    Value(Value),
}

/// Random-access reader over an encoded binary tuple.
#[derive(Debug)]
pub struct BinaryTupleReader {
    data: Bytes,
    count: usize,
    no_value_off: usize,
    offsets_off: usize,
    payload_off: usize,
}

impl BinaryTupleReader {
    /// Wraps an encoded tuple with the given column count.
    ///
    /// Fails with [`GridError::Format`] when the buffer is too short to hold
    /// the header for `count` columns or the offsets run past the payload.
    pub fn new(data: Bytes, count: usize) -> Result<Self> {
        let bitmap = bitmap_size(count);
        let no_value_off = FLAGS_SIZE + bitmap;
        let offsets_off = no_value_off + bitmap;
        let payload_off = offsets_off + OFFSET_ENTRY_SIZE * (count + 1);

        if data.len() < payload_off {
            return Err(GridError::Format(format!(
                "tuple buffer of {} bytes is too short for {} columns",
                data.len(),
                count
            )));
        }

        let reader = Self {
            data,
            count,
            no_value_off,
            offsets_off,
            payload_off,
        };

        let payload_len = reader.data.len() - payload_off;
        for i in 0..=count {
            if reader.offset(i) > payload_len {
                return Err(GridError::Format(format!(
                    "tuple offset {} exceeds payload length {}",
                    reader.offset(i),
                    payload_len
                )));
            }
        }

        Ok(reader)
    }

    /// Returns the column count this reader was constructed with.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns true if the column at `index` is an explicit null.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`count`](BinaryTupleReader::count).
    pub fn is_null(&self, index: usize) -> bool {
        assert!(
            index < self.count,
            "column index {} out of range for tuple of {} columns",
            index,
            self.count
        );
        bit(&self.data[FLAGS_SIZE..self.no_value_off], index)
    }

    /// Returns true if the column at `index` is absent.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`count`](BinaryTupleReader::count).
    pub fn is_no_value(&self, index: usize) -> bool {
        assert!(
            index < self.count,
            "column index {} out of range for tuple of {} columns",
            index,
            self.count
        );
        bit(&self.data[self.no_value_off..self.offsets_off], index)
    }

    /// Decodes the column at `index` according to the column descriptor.
    pub fn slot(&self, index: usize, column: &Column) -> Result<Slot> {
        if index >= self.count {
            return Err(GridError::Format(format!(
                "column index {} out of range for tuple of {} columns",
                index, self.count
            )));
        }
        if self.is_no_value(index) {
            return Ok(Slot::NoValue);
        }
        if self.is_null(index) {
            return Ok(Slot::Null);
        }

        let start = self.offset(index);
        let end = self.offset(index + 1);
        if end < start {
            return Err(GridError::Format(format!(
                "tuple offsets for column {} are not monotonic",
                index
            )));
        }
        let span = &self.data[self.payload_off + start..self.payload_off + end];

        let value = match column.column_type {
            ColumnType::Boolean => Value::Boolean(fixed::<1>(span, column)?[0] != 0),
            ColumnType::Int8 => Value::Int8(fixed::<1>(span, column)?[0] as i8),
            ColumnType::Int16 => Value::Int16(i16::from_be_bytes(fixed(span, column)?)),
            ColumnType::Int32 => Value::Int32(i32::from_be_bytes(fixed(span, column)?)),
            ColumnType::Int64 => Value::Int64(i64::from_be_bytes(fixed(span, column)?)),
            ColumnType::Float => Value::Float(f32::from_be_bytes(fixed(span, column)?)),
            ColumnType::Double => Value::Double(f64::from_be_bytes(fixed(span, column)?)),
            ColumnType::Decimal => Value::Decimal {
                unscaled: i128::from_be_bytes(fixed(span, column)?),
                scale: column.scale as i16,
            },
            ColumnType::Date => Value::Date(i32::from_be_bytes(fixed(span, column)?)),
            ColumnType::Time => Value::Time(i64::from_be_bytes(fixed(span, column)?)),
            ColumnType::Datetime => Value::Datetime(i64::from_be_bytes(fixed(span, column)?)),
            ColumnType::Timestamp => Value::Timestamp(i64::from_be_bytes(fixed(span, column)?)),
            ColumnType::Uuid => Value::Uuid(Uuid::from_bytes(fixed(span, column)?)),
            ColumnType::Bitmask => Value::Bitmask(span.to_vec()),
            ColumnType::String => Value::String(
                std::str::from_utf8(span)
                    .map_err(|e| {
                        GridError::Format(format!(
                            "column '{}' holds invalid UTF-8: {}",
                            column.name, e
                        ))
                    })?
                    .to_string(),
            ),
            ColumnType::Bytes => Value::Bytes(span.to_vec()),
            ColumnType::Period => {
                let raw = fixed::<12>(span, column)?;
                Value::Period {
                    years: i32::from_be_bytes(raw[0..4].try_into().unwrap()),
                    months: i32::from_be_bytes(raw[4..8].try_into().unwrap()),
                    days: i32::from_be_bytes(raw[8..12].try_into().unwrap()),
                }
            }
            ColumnType::Duration => {
                let raw = fixed::<12>(span, column)?;
                Value::Duration {
                    seconds: i64::from_be_bytes(raw[0..8].try_into().unwrap()),
                    nanos: i32::from_be_bytes(raw[8..12].try_into().unwrap()),
                }
            }
            ColumnType::Number => Value::Number(i128::from_be_bytes(fixed(span, column)?)),
        };

        Ok(Slot::Value(value))
    }

    fn offset(&self, index: usize) -> usize {
        let at = self.offsets_off + index * OFFSET_ENTRY_SIZE;
        u32::from_be_bytes(self.data[at..at + 4].try_into().unwrap()) as usize
    }
}

fn fixed<const N: usize>(span: &[u8], column: &Column) -> Result<[u8; N]> {
    span.try_into().map_err(|_| {
        GridError::Format(format!(
            "column '{}' ({:?}) expects {} payload bytes, got {}",
            column.name,
            column.column_type,
            N,
            span.len()
        ))
    })
}
