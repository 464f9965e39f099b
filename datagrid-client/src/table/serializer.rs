//! Record serializer: request bodies and response payloads for record ops.
//!
//! A record request body is `i32 table id`, `i64 transaction marker`,
//! `i32 schema version`, then one or more i32-length-prefixed binary tuples.
//! Batch bodies carry an `i32 count` between the header and the tuples; the
//! count slot is reserved up front and patched after streaming the tuples.

use std::sync::Arc;

use bytes::Bytes;

use datagrid_core::protocol::{WireReader, WireWriter};
use datagrid_core::{
    BinaryTupleBuilder, BinaryTupleReader, GridError, Result, Schema, SchemaSlice, TuplePart,
};

use crate::buffer::PooledBuffer;
use crate::table::codec::RecordCodec;
use crate::transaction::{tx_marker, Transaction};

/// Encodes records into request bodies and decodes record responses for one
/// table.
pub struct RecordSerializer<T> {
    table_id: i32,
    codec: Arc<dyn RecordCodec<T>>,
}

impl<T> RecordSerializer<T> {
    /// Creates a serializer backed by the given codec.
    pub fn new(table_id: i32, codec: Arc<dyn RecordCodec<T>>) -> Self {
        Self { table_id, codec }
    }

    /// Returns the codec this serializer writes and reads with.
    pub fn codec(&self) -> &Arc<dyn RecordCodec<T>> {
        &self.codec
    }

    /// Encodes a single-record request body. Returns the record's colocation
    /// hash, computed before anything is written.
    pub fn write(
        &self,
        buf: &mut PooledBuffer,
        tx: Option<&Transaction>,
        schema: &Schema,
        record: &T,
        part: TuplePart,
    ) -> Result<i32> {
        let hash = self.codec.colocation_hash(schema, record)?;
        self.write_header(buf, tx, schema);
        self.write_tuple(buf, schema.slice(part), record)?;
        Ok(hash)
    }

    /// Encodes a two-record request body (compare-and-set shapes). The hash
    /// comes from the first record; both records share the key.
    pub fn write_two(
        &self,
        buf: &mut PooledBuffer,
        tx: Option<&Transaction>,
        schema: &Schema,
        first: &T,
        second: &T,
        part: TuplePart,
    ) -> Result<i32> {
        let hash = self.codec.colocation_hash(schema, first)?;
        self.write_header(buf, tx, schema);
        self.write_tuple(buf, schema.slice(part), first)?;
        self.write_tuple(buf, schema.slice(part), second)?;
        Ok(hash)
    }

    /// Encodes a batch request body, streaming the records and patching the
    /// count slot afterwards. Returns the first record's colocation hash.
    ///
    /// An empty iterator is an error; the caller short-circuits empty
    /// batches before reaching the serializer.
    pub fn write_multiple<'a, I>(
        &self,
        buf: &mut PooledBuffer,
        tx: Option<&Transaction>,
        schema: &Schema,
        records: I,
        part: TuplePart,
    ) -> Result<i32>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        self.write_header(buf, tx, schema);
        let count_slot = buf.reserve_count();

        let mut hash = 0;
        let mut count = 0i32;
        for record in records {
            if count == 0 {
                hash = self.codec.colocation_hash(schema, record)?;
            }
            self.write_tuple(buf, schema.slice(part), record)?;
            count += 1;
        }

        if count == 0 {
            return Err(GridError::InvalidArgument(
                "record batch is empty".to_string(),
            ));
        }

        buf.patch_count(count_slot, count);
        Ok(hash)
    }

    /// Decodes an optional single-record response. A `None` schema means the
    /// server found no record, which is a success.
    ///
    /// The wire tuple carries the value part; key columns are taken from the
    /// record the request was keyed with.
    pub fn read_value(
        &self,
        reader: &mut WireReader<'_>,
        schema: Option<&Schema>,
        key: &T,
    ) -> Result<Option<T>> {
        let schema = match schema {
            Some(schema) => schema,
            None => return Ok(None),
        };

        let raw = Bytes::copy_from_slice(reader.read_binary()?);
        let tuple = BinaryTupleReader::new(raw, schema.value_column_count())?;
        self.codec.read_value_part(&tuple, schema, key).map(Some)
    }

    /// Decodes a counted list of records, preserving wire order. The caller
    /// supplies the collection: `factory(count)` builds it and `append` adds
    /// each decoded record.
    pub fn read_multiple<R>(
        &self,
        reader: &mut WireReader<'_>,
        schema: Option<&Schema>,
        part: TuplePart,
        factory: impl FnOnce(usize) -> R,
        mut append: impl FnMut(&mut R, T),
    ) -> Result<R> {
        let schema = match schema {
            Some(schema) => schema,
            None => return Ok(factory(0)),
        };

        let count = read_count(reader)?;
        let mut out = factory(count);
        for _ in 0..count {
            append(&mut out, self.read_tuple(reader, schema.slice(part))?);
        }
        Ok(out)
    }

    /// Like [`read_multiple`](RecordSerializer::read_multiple), with a
    /// present-flag byte per entry; a clear flag appends `None`, keeping the
    /// result aligned with the request order.
    pub fn read_multiple_nullable<R>(
        &self,
        reader: &mut WireReader<'_>,
        schema: Option<&Schema>,
        part: TuplePart,
        factory: impl FnOnce(usize) -> R,
        mut append: impl FnMut(&mut R, Option<T>),
    ) -> Result<R> {
        let schema = match schema {
            Some(schema) => schema,
            None => return Ok(factory(0)),
        };

        let count = read_count(reader)?;
        let mut out = factory(count);
        for _ in 0..count {
            let item = if reader.read_u8()? != 0 {
                Some(self.read_tuple(reader, schema.slice(part))?)
            } else {
                None
            };
            append(&mut out, item);
        }
        Ok(out)
    }

    fn write_header(&self, buf: &mut PooledBuffer, tx: Option<&Transaction>, schema: &Schema) {
        let mut w = WireWriter::new(buf);
        w.put_i32(self.table_id);
        w.put_i64(tx_marker(tx));
        w.put_i32(schema.version());
    }

    fn write_tuple(&self, buf: &mut PooledBuffer, slice: SchemaSlice<'_>, record: &T) -> Result<()> {
        let mut builder = BinaryTupleBuilder::new(slice.len());
        self.codec.write(&mut builder, slice, record)?;
        let tuple = builder.build()?;
        WireWriter::new(buf).put_binary(&tuple);
        Ok(())
    }

    fn read_tuple(&self, reader: &mut WireReader<'_>, slice: SchemaSlice<'_>) -> Result<T> {
        let raw = Bytes::copy_from_slice(reader.read_binary()?);
        let tuple = BinaryTupleReader::new(raw, slice.len())?;
        self.codec.read(&tuple, slice)
    }
}

impl<T> std::fmt::Debug for RecordSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSerializer")
            .field("table_id", &self.table_id)
            .finish()
    }
}

fn read_count(reader: &mut WireReader<'_>) -> Result<usize> {
    let count = reader.read_i32()?;
    if count < 0 {
        return Err(GridError::Format(format!(
            "negative record count: {}",
            count
        )));
    }
    Ok(count as usize)
}
