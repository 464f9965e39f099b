//! Record codecs: mapping user records onto schema-ordered tuples.

use std::collections::HashMap;
use std::sync::Arc;

use datagrid_core::{
    colocation_hash, BinaryTupleBuilder, BinaryTupleReader, GridError, GridTuple, Result, Schema,
    SchemaSlice, Slot, Value,
};

/// Maps records of type `T` to and from binary tuples.
///
/// Implementations provide per-column access and construction; writing and
/// colocation hashing are derived from [`value_of`](RecordCodec::value_of),
/// so a codec defines the column mapping exactly once.
pub trait RecordCodec<T>: Send + Sync {
    /// Returns the record's value for a column, or `None` when the record
    /// does not carry that column.
    fn value_of(&self, record: &T, column: &str) -> Option<Value>;

    /// Builds a record from a decoded tuple covering the given slice.
    ///
    /// Tuple index `i` corresponds to the slice's `i`-th column.
    fn read(&self, reader: &BinaryTupleReader, slice: SchemaSlice<'_>) -> Result<T>;

    /// Builds a full record from a value-part tuple, taking key columns from
    /// the record the caller supplied with the request.
    fn read_value_part(&self, reader: &BinaryTupleReader, schema: &Schema, key: &T) -> Result<T>;

    /// Appends the record's columns to a tuple builder in slice order.
    /// Columns the record does not carry are appended as absent.
    fn write(
        &self,
        builder: &mut BinaryTupleBuilder,
        slice: SchemaSlice<'_>,
        record: &T,
    ) -> Result<()> {
        for column in slice.columns() {
            match self.value_of(record, &column.name) {
                Some(value) => builder.append(column, &value)?,
                None => builder.append_no_value()?,
            }
        }
        Ok(())
    }

    /// Computes the record's colocation hash against the schema.
    fn colocation_hash(&self, schema: &Schema, record: &T) -> Result<i32> {
        colocation_hash(schema, |name| self.value_of(record, name))
    }
}

/// Decodes a slice of columns into a [`GridTuple`], preserving the
/// null/absent distinction.
fn read_into_tuple(
    reader: &BinaryTupleReader,
    slice: SchemaSlice<'_>,
    tuple: &mut GridTuple,
) -> Result<()> {
    for (i, column) in slice.columns().enumerate() {
        match reader.slot(i, column)? {
            Slot::NoValue => {}
            Slot::Null => tuple.put(column.name.clone(), Value::Null),
            Slot::Value(value) => tuple.put(column.name.clone(), value),
        }
    }
    Ok(())
}

/// Codec for dynamic [`GridTuple`] records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TupleCodec;

impl RecordCodec<GridTuple> for TupleCodec {
    fn value_of(&self, record: &GridTuple, column: &str) -> Option<Value> {
        record.get(column).cloned()
    }

    fn read(&self, reader: &BinaryTupleReader, slice: SchemaSlice<'_>) -> Result<GridTuple> {
        let mut tuple = GridTuple::with_capacity(slice.len());
        read_into_tuple(reader, slice, &mut tuple)?;
        Ok(tuple)
    }

    fn read_value_part(
        &self,
        reader: &BinaryTupleReader,
        schema: &Schema,
        key: &GridTuple,
    ) -> Result<GridTuple> {
        let mut tuple = GridTuple::with_capacity(schema.columns().len());
        for column in &schema.columns()[..schema.key_column_count()] {
            if let Some(value) = key.get(&column.name) {
                tuple.put(column.name.clone(), value.clone());
            }
        }
        read_into_tuple(reader, schema.slice(datagrid_core::TuplePart::Value), &mut tuple)?;
        Ok(tuple)
    }
}

type Getter<T> = Arc<dyn Fn(&T) -> Option<Value> + Send + Sync>;
type Builder<T> = Arc<dyn Fn(&GridTuple) -> Result<T> + Send + Sync>;

/// Codec for typed records with an explicitly registered field mapping.
///
/// Every mapped column is declared with a getter, and a constructor builds
/// the record back from a decoded [`GridTuple`]. There is no reflection; an
/// unmapped column is simply absent from written tuples.
pub struct MappedRecordCodec<T> {
    getters: HashMap<String, Getter<T>>,
    build: Builder<T>,
}

impl<T> MappedRecordCodec<T> {
    /// Starts registering a mapping.
    pub fn builder() -> MappedRecordCodecBuilder<T> {
        MappedRecordCodecBuilder {
            getters: HashMap::new(),
        }
    }
}

impl<T> std::fmt::Debug for MappedRecordCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRecordCodec")
            .field("columns", &self.getters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`MappedRecordCodec`].
pub struct MappedRecordCodecBuilder<T> {
    getters: HashMap<String, Getter<T>>,
}

impl<T> MappedRecordCodecBuilder<T> {
    /// Maps a column to a getter on the record.
    pub fn field<F>(mut self, column: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&T) -> Option<Value> + Send + Sync + 'static,
    {
        self.getters
            .insert(column.into().to_ascii_lowercase(), Arc::new(getter));
        self
    }

    /// Finishes the mapping with a constructor from a decoded tuple.
    pub fn build<F>(self, build: F) -> MappedRecordCodec<T>
    where
        F: Fn(&GridTuple) -> Result<T> + Send + Sync + 'static,
    {
        MappedRecordCodec {
            getters: self.getters,
            build: Arc::new(build),
        }
    }
}

impl<T: Send + Sync> RecordCodec<T> for MappedRecordCodec<T> {
    fn value_of(&self, record: &T, column: &str) -> Option<Value> {
        self.getters
            .get(&column.to_ascii_lowercase())
            .and_then(|getter| getter(record))
    }

    fn read(&self, reader: &BinaryTupleReader, slice: SchemaSlice<'_>) -> Result<T> {
        let mut tuple = GridTuple::with_capacity(slice.len());
        read_into_tuple(reader, slice, &mut tuple)?;
        (self.build)(&tuple)
    }

    fn read_value_part(&self, reader: &BinaryTupleReader, schema: &Schema, key: &T) -> Result<T> {
        let mut tuple = GridTuple::with_capacity(schema.columns().len());
        for column in &schema.columns()[..schema.key_column_count()] {
            if let Some(value) = self.value_of(key, &column.name) {
                tuple.put(column.name.clone(), value);
            }
        }
        read_into_tuple(reader, schema.slice(datagrid_core::TuplePart::Value), &mut tuple)?;
        (self.build)(&tuple)
    }
}
