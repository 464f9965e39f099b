//! Wire encoding of schema descriptors.
//!
//! A schema response carries the version, the column count and one entry per
//! column: name, type tag, scale, precision and a flags byte (bit 0 marks a
//! key column, bit 1 a colocation column).

use bytes::BytesMut;

use crate::error::{GridError, Result};
use crate::schema::{Column, Schema};
use crate::types::ColumnType;

use super::wire::{WireReader, WireWriter};

const FLAG_KEY: u8 = 0x1;
const FLAG_COLOCATION: u8 = 0x2;

/// Encodes a schema descriptor into the buffer.
pub fn encode_schema(dst: &mut BytesMut, schema: &Schema) {
    let mut w = WireWriter::new(dst);
    w.put_i32(schema.version());
    w.put_i32(schema.columns().len() as i32);
    for col in schema.columns() {
        w.put_string(&col.name);
        w.put_i8(col.column_type.tag());
        w.put_i32(col.scale);
        w.put_i32(col.precision);
        let mut flags = 0u8;
        if col.key {
            flags |= FLAG_KEY;
        }
        if col.colocation {
            flags |= FLAG_COLOCATION;
        }
        w.put_u8(flags);
    }
}

/// Decodes a schema descriptor, validating the resulting layout.
pub fn decode_schema(r: &mut WireReader<'_>) -> Result<Schema> {
    let version = r.read_i32()?;
    let count = r.read_i32()?;
    if count < 0 {
        return Err(GridError::Format(format!(
            "negative column count: {}",
            count
        )));
    }

    let mut columns = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = r.read_string()?;
        let column_type = ColumnType::from_tag(r.read_i8()?)?;
        let scale = r.read_i32()?;
        let precision = r.read_i32()?;
        let flags = r.read_u8()?;

        columns.push(Column {
            name,
            column_type,
            scale,
            precision,
            key: flags & FLAG_KEY != 0,
            colocation: flags & FLAG_COLOCATION != 0,
        });
    }

    Schema::new(version, columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        let mut amount = Column::new("amount", ColumnType::Decimal);
        amount.scale = 2;
        amount.precision = 18;
        Schema::new(
            3,
            vec![
                Column::key("id", ColumnType::Int64),
                amount,
                Column::new("note", ColumnType::String),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_schema_roundtrip() {
        let schema = sample_schema();
        let mut buf = BytesMut::new();
        encode_schema(&mut buf, &schema);

        let mut r = WireReader::new(&buf);
        let decoded = decode_schema(&mut r).unwrap();
        assert_eq!(decoded, schema);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_unknown_type_tag_rejected() {
        let mut buf = BytesMut::new();
        let mut w = WireWriter::new(&mut buf);
        w.put_i32(1);
        w.put_i32(1);
        w.put_string("id");
        w.put_i8(99);
        w.put_i32(0);
        w.put_i32(0);
        w.put_u8(FLAG_KEY);

        let mut r = WireReader::new(&buf);
        assert!(decode_schema(&mut r).is_err());
    }

    #[test]
    fn test_invalid_layout_rejected() {
        // Value column before the key column breaks the key-prefix rule.
        let mut buf = BytesMut::new();
        let mut w = WireWriter::new(&mut buf);
        w.put_i32(1);
        w.put_i32(2);
        w.put_string("note");
        w.put_i8(ColumnType::String.tag());
        w.put_i32(0);
        w.put_i32(0);
        w.put_u8(0);
        w.put_string("id");
        w.put_i8(ColumnType::Int64.tag());
        w.put_i32(0);
        w.put_i32(0);
        w.put_u8(FLAG_KEY);

        let mut r = WireReader::new(&buf);
        assert!(decode_schema(&mut r).is_err());
    }

    #[test]
    fn test_truncated_schema_fails() {
        let schema = sample_schema();
        let mut buf = BytesMut::new();
        encode_schema(&mut buf, &schema);
        let mut r = WireReader::new(&buf[..buf.len() - 3]);
        assert!(decode_schema(&mut r).is_err());
    }
}
