//! Record view: the per-table key-value operation surface.
//!
//! Every operation follows the same shape: resolve the latest schema, encode
//! the request into a pooled buffer, route by the record's colocation hash,
//! then decode the response against the schema version the server answered
//! with.

use std::sync::Arc;

use datagrid_core::protocol::{OpCode, WireReader};
use datagrid_core::{GridError, GridTuple, Result, TuplePart};

use crate::connection::{PreferredNode, Response};
use crate::table::codec::RecordCodec;
use crate::table::serializer::RecordSerializer;
use crate::table::Table;
use crate::transaction::Transaction;

/// A dynamic view over [`GridTuple`] records.
pub type TupleView = RecordView<GridTuple>;

/// Typed key-value operations over one table.
#[derive(Debug)]
pub struct RecordView<T> {
    table: Arc<Table>,
    serializer: RecordSerializer<T>,
}

impl<T> RecordView<T> {
    pub(crate) fn new(table: Arc<Table>, codec: Arc<dyn RecordCodec<T>>) -> Self {
        let serializer = RecordSerializer::new(table.id(), codec);
        Self { table, serializer }
    }

    /// Returns the table this view operates on.
    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Gets the record for a key, or `None` when no record exists.
    pub async fn get(&self, tx: Option<&Transaction>, key: &T) -> Result<Option<T>> {
        let response = self
            .invoke_one(OpCode::TupleGet, tx, key, TuplePart::Key)
            .await?;
        self.read_optional(&response, key).await
    }

    /// Gets records for multiple keys. The result has one entry per key in
    /// request order; a missing record yields `None` at its key's index.
    pub async fn get_all(&self, tx: Option<&Transaction>, keys: &[T]) -> Result<Vec<Option<T>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .invoke_many(OpCode::TupleGetAll, tx, keys, TuplePart::Key)
            .await?;
        self.read_nullable_records(&response).await
    }

    /// Inserts or updates a record.
    pub async fn upsert(&self, tx: Option<&Transaction>, record: &T) -> Result<()> {
        self.invoke_one(OpCode::TupleUpsert, tx, record, TuplePart::KeyAndValue)
            .await?;
        Ok(())
    }

    /// Inserts or updates multiple records.
    pub async fn upsert_all(&self, tx: Option<&Transaction>, records: &[T]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.invoke_many(OpCode::TupleUpsertAll, tx, records, TuplePart::KeyAndValue)
            .await?;
        Ok(())
    }

    /// Inserts a record if no record with the same key exists. Returns true
    /// when the record was inserted.
    pub async fn insert(&self, tx: Option<&Transaction>, record: &T) -> Result<bool> {
        let response = self
            .invoke_one(OpCode::TupleInsert, tx, record, TuplePart::KeyAndValue)
            .await?;
        decode_bool(&response)
    }

    /// Inserts multiple records, skipping keys that already exist. Returns
    /// the records that were not inserted.
    pub async fn insert_all(&self, tx: Option<&Transaction>, records: &[T]) -> Result<Vec<T>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .invoke_many(OpCode::TupleInsertAll, tx, records, TuplePart::KeyAndValue)
            .await?;
        self.read_records(&response, TuplePart::KeyAndValue).await
    }

    /// Replaces an existing record. Returns true when a record with the same
    /// key existed and was replaced.
    pub async fn replace(&self, tx: Option<&Transaction>, record: &T) -> Result<bool> {
        let response = self
            .invoke_one(OpCode::TupleReplace, tx, record, TuplePart::KeyAndValue)
            .await?;
        decode_bool(&response)
    }

    /// Replaces a record only when the stored record equals `expected`.
    pub async fn replace_exact(
        &self,
        tx: Option<&Transaction>,
        expected: &T,
        new: &T,
    ) -> Result<bool> {
        let response = self
            .invoke_two(OpCode::TupleReplaceExact, tx, expected, new)
            .await?;
        decode_bool(&response)
    }

    /// Replaces an existing record and returns the previous record, or
    /// `None` when no record with that key existed.
    pub async fn get_and_replace(&self, tx: Option<&Transaction>, record: &T) -> Result<Option<T>> {
        let response = self
            .invoke_one(OpCode::TupleGetAndReplace, tx, record, TuplePart::KeyAndValue)
            .await?;
        self.read_optional(&response, record).await
    }

    /// Inserts or updates a record and returns the previous record, if any.
    pub async fn get_and_upsert(&self, tx: Option<&Transaction>, record: &T) -> Result<Option<T>> {
        let response = self
            .invoke_one(OpCode::TupleGetAndUpsert, tx, record, TuplePart::KeyAndValue)
            .await?;
        self.read_optional(&response, record).await
    }

    /// Deletes the record for a key. Returns true when a record was deleted.
    pub async fn delete(&self, tx: Option<&Transaction>, key: &T) -> Result<bool> {
        let response = self
            .invoke_one(OpCode::TupleDelete, tx, key, TuplePart::Key)
            .await?;
        decode_bool(&response)
    }

    /// Deletes a record only when the stored record equals `record`.
    pub async fn delete_exact(&self, tx: Option<&Transaction>, record: &T) -> Result<bool> {
        let response = self
            .invoke_one(OpCode::TupleDeleteExact, tx, record, TuplePart::KeyAndValue)
            .await?;
        decode_bool(&response)
    }

    /// Deletes the record for a key and returns it, or `None` when no record
    /// existed.
    pub async fn get_and_delete(&self, tx: Option<&Transaction>, key: &T) -> Result<Option<T>> {
        let response = self
            .invoke_one(OpCode::TupleGetAndDelete, tx, key, TuplePart::Key)
            .await?;
        self.read_optional(&response, key).await
    }

    /// Deletes records for multiple keys. Returns the keys that had no
    /// record to delete.
    pub async fn delete_all(&self, tx: Option<&Transaction>, keys: &[T]) -> Result<Vec<T>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .invoke_many(OpCode::TupleDeleteAll, tx, keys, TuplePart::Key)
            .await?;
        self.read_records(&response, TuplePart::Key).await
    }

    /// Deletes records that exactly equal the given records. Returns the
    /// records that did not match and were left in place.
    pub async fn delete_all_exact(&self, tx: Option<&Transaction>, records: &[T]) -> Result<Vec<T>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .invoke_many(OpCode::TupleDeleteAllExact, tx, records, TuplePart::KeyAndValue)
            .await?;
        self.read_records(&response, TuplePart::KeyAndValue).await
    }

    /// Returns true when a record exists for the key.
    pub async fn contains_key(&self, tx: Option<&Transaction>, key: &T) -> Result<bool> {
        let response = self
            .invoke_one(OpCode::TupleContainsKey, tx, key, TuplePart::Key)
            .await?;
        decode_bool(&response)
    }

    async fn invoke_one(
        &self,
        op: OpCode,
        tx: Option<&Transaction>,
        record: &T,
        part: TuplePart,
    ) -> Result<Response> {
        let schema = self.table.latest_schema().await?;
        let mut buf = self.table.pool().acquire();
        let hash = self.serializer.write(&mut buf, tx, &schema, record, part)?;
        self.send(op, buf.freeze(), hash).await
    }

    async fn invoke_two(
        &self,
        op: OpCode,
        tx: Option<&Transaction>,
        first: &T,
        second: &T,
    ) -> Result<Response> {
        let schema = self.table.latest_schema().await?;
        let mut buf = self.table.pool().acquire();
        let hash =
            self.serializer
                .write_two(&mut buf, tx, &schema, first, second, TuplePart::KeyAndValue)?;
        self.send(op, buf.freeze(), hash).await
    }

    async fn invoke_many(
        &self,
        op: OpCode,
        tx: Option<&Transaction>,
        records: &[T],
        part: TuplePart,
    ) -> Result<Response> {
        let schema = self.table.latest_schema().await?;
        let mut buf = self.table.pool().acquire();
        let hash = self
            .serializer
            .write_multiple(&mut buf, tx, &schema, records, part)?;
        self.send(op, buf.freeze(), hash).await
    }

    async fn send(&self, op: OpCode, payload: bytes::Bytes, hash: i32) -> Result<Response> {
        let response = self
            .table
            .manager()
            .invoke(op, payload, PreferredNode::ColocationHash(hash))
            .await?;
        self.table.note_response(&response);
        Ok(response)
    }

    async fn read_optional(&self, response: &Response, key: &T) -> Result<Option<T>> {
        let mut reader = WireReader::new(&response.payload);
        let schema = self.table.read_schema(&mut reader).await?;
        self.serializer.read_value(&mut reader, schema.as_deref(), key)
    }

    async fn read_records(&self, response: &Response, part: TuplePart) -> Result<Vec<T>> {
        let mut reader = WireReader::new(&response.payload);
        let schema = self.table.read_schema(&mut reader).await?;
        self.serializer.read_multiple(
            &mut reader,
            schema.as_deref(),
            part,
            Vec::with_capacity,
            Vec::push,
        )
    }

    async fn read_nullable_records(&self, response: &Response) -> Result<Vec<Option<T>>> {
        let mut reader = WireReader::new(&response.payload);
        let schema = self.table.read_schema(&mut reader).await?;
        self.serializer.read_multiple_nullable(
            &mut reader,
            schema.as_deref(),
            TuplePart::KeyAndValue,
            Vec::with_capacity,
            Vec::push,
        )
    }
}

fn decode_bool(response: &Response) -> Result<bool> {
    match response.payload.first() {
        Some(byte) => Ok(*byte != 0),
        None => Err(GridError::Format(
            "boolean response payload is empty".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn response(payload: &'static [u8]) -> Response {
        Response {
            payload: Bytes::from_static(payload),
            newer_schema_version: None,
        }
    }

    #[test]
    fn test_decode_bool() {
        assert!(decode_bool(&response(&[1])).unwrap());
        assert!(!decode_bool(&response(&[0])).unwrap());
        assert!(decode_bool(&response(&[])).is_err());
    }
}
