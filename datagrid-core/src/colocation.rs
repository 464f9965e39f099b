//! Colocation hashing for partition-aware request routing.
//!
//! The server computes the same hash independently to place records on
//! partitions, so the mixing primitive and the per-type byte representation
//! must match the wire protocol bit-for-bit. A mismatch does not fail; it
//! silently routes requests to a non-owner node. The canonical byte
//! representation of every type is identical to the binary tuple payload
//! encoding.

use crate::error::{GridError, Result};
use crate::schema::{Column, Schema};
use crate::types::Value;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// 32-bit Murmur3 mix over a byte slice, seeded with the running hash.
pub fn hash32(data: &[u8], seed: i32) -> i32 {
    let mut h1 = seed as u32;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k1 = u32::from_le_bytes(chunk.try_into().unwrap());
        k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h1 ^= k1;
        h1 = h1
            .rotate_left(13)
            .wrapping_mul(5)
            .wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k1: u32 = 0;
        for (i, b) in tail.iter().enumerate() {
            k1 |= u32::from(*b) << (8 * i);
        }
        k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85eb_ca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2_ae35);
    h1 ^= h1 >> 16;

    h1 as i32
}

/// Mixes one column value into the running hash.
///
/// Exhaustive over every column type; adding a type to [`Value`] forces an
/// update here.
pub fn append_hash(acc: i32, column: &Column, value: &Value) -> Result<i32> {
    if !value.matches(column.column_type, column.scale) {
        return Err(GridError::Format(format!(
            "value {:?} does not match declared type {:?} of colocation column '{}'",
            value, column.column_type, column.name
        )));
    }

    Ok(match value {
        Value::Null => return Err(GridError::NullKeyColumn(column.name.clone())),
        Value::Boolean(v) => hash32(&[u8::from(*v)], acc),
        Value::Int8(v) => hash32(&v.to_be_bytes(), acc),
        Value::Int16(v) => hash32(&v.to_be_bytes(), acc),
        Value::Int32(v) => hash32(&v.to_be_bytes(), acc),
        Value::Int64(v) => hash32(&v.to_be_bytes(), acc),
        Value::Float(v) => hash32(&v.to_be_bytes(), acc),
        Value::Double(v) => hash32(&v.to_be_bytes(), acc),
        Value::Decimal { unscaled, .. } => hash32(&unscaled.to_be_bytes(), acc),
        Value::Date(v) => hash32(&v.to_be_bytes(), acc),
        Value::Time(v) => hash32(&v.to_be_bytes(), acc),
        Value::Datetime(v) => hash32(&v.to_be_bytes(), acc),
        Value::Timestamp(v) => hash32(&v.to_be_bytes(), acc),
        Value::Uuid(v) => hash32(v.as_bytes(), acc),
        Value::Bitmask(v) => hash32(v, acc),
        Value::String(v) => hash32(v.as_bytes(), acc),
        Value::Bytes(v) => hash32(v, acc),
        Value::Period {
            years,
            months,
            days,
        } => {
            let mut raw = [0u8; 12];
            raw[0..4].copy_from_slice(&years.to_be_bytes());
            raw[4..8].copy_from_slice(&months.to_be_bytes());
            raw[8..12].copy_from_slice(&days.to_be_bytes());
            hash32(&raw, acc)
        }
        Value::Duration { seconds, nanos } => {
            let mut raw = [0u8; 12];
            raw[0..8].copy_from_slice(&seconds.to_be_bytes());
            raw[8..12].copy_from_slice(&nanos.to_be_bytes());
            hash32(&raw, acc)
        }
        Value::Number(v) => hash32(&v.to_be_bytes(), acc),
    })
}

/// Computes the colocation hash for a record against a schema.
///
/// Iterates key columns in schema order, skipping columns that do not
/// participate in the hash. `lookup` resolves a column value by name;
/// returning `None` means the column is absent from the record, which is a
/// usage error. Null participant values are likewise rejected.
pub fn colocation_hash<F>(schema: &Schema, mut lookup: F) -> Result<i32>
where
    F: FnMut(&str) -> Option<Value>,
{
    let mut hash = 0i32;

    for (index, column) in schema.columns()[..schema.key_column_count()]
        .iter()
        .enumerate()
    {
        if !schema.is_colocation_index(index) {
            continue;
        }

        let value = lookup(&column.name)
            .ok_or_else(|| GridError::MissingKeyColumn(column.name.clone()))?;

        if value.is_null() {
            return Err(GridError::NullKeyColumn(column.name.clone()));
        }

        hash = append_hash(hash, column, &value)?;
    }

    Ok(hash)
}
