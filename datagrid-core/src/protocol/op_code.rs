//! Operation codes for client requests.

use crate::error::{GridError, Result};

/// Identifies one client operation on the wire.
///
/// Wire values are fixed by the protocol and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpCode {
    /// Liveness probe; empty payload.
    Heartbeat = 1,
    /// Resolves a table name to a table id.
    TableGet = 3,
    /// Fetches a schema version (or the latest) for a table.
    SchemaGet = 4,
    /// Gets a single record by key.
    TupleGet = 10,
    /// Gets multiple records by key.
    TupleGetAll = 11,
    /// Inserts or updates a record.
    TupleUpsert = 12,
    /// Inserts or updates multiple records.
    TupleUpsertAll = 13,
    /// Inserts a record if absent.
    TupleInsert = 14,
    /// Inserts multiple records, returning those that already existed.
    TupleInsertAll = 15,
    /// Replaces a record if present.
    TupleReplace = 16,
    /// Replaces a record only when the current value matches exactly.
    TupleReplaceExact = 17,
    /// Replaces a record and returns the previous value.
    TupleGetAndReplace = 18,
    /// Upserts a record and returns the previous value.
    TupleGetAndUpsert = 19,
    /// Deletes a record by key.
    TupleDelete = 20,
    /// Deletes a record only when key and value match exactly.
    TupleDeleteExact = 21,
    /// Deletes a record by key and returns the previous value.
    TupleGetAndDelete = 22,
    /// Deletes multiple records by key, returning the keys that were absent.
    TupleDeleteAll = 23,
    /// Deletes multiple records matching key and value exactly.
    TupleDeleteAllExact = 24,
    /// Checks whether a key exists.
    TupleContainsKey = 25,
}

impl OpCode {
    /// Returns the wire value of this op code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Resolves a wire value back into an op code.
    pub fn from_i32(v: i32) -> Result<Self> {
        Ok(match v {
            1 => OpCode::Heartbeat,
            3 => OpCode::TableGet,
            4 => OpCode::SchemaGet,
            10 => OpCode::TupleGet,
            11 => OpCode::TupleGetAll,
            12 => OpCode::TupleUpsert,
            13 => OpCode::TupleUpsertAll,
            14 => OpCode::TupleInsert,
            15 => OpCode::TupleInsertAll,
            16 => OpCode::TupleReplace,
            17 => OpCode::TupleReplaceExact,
            18 => OpCode::TupleGetAndReplace,
            19 => OpCode::TupleGetAndUpsert,
            20 => OpCode::TupleDelete,
            21 => OpCode::TupleDeleteExact,
            22 => OpCode::TupleGetAndDelete,
            23 => OpCode::TupleDeleteAll,
            24 => OpCode::TupleDeleteAllExact,
            25 => OpCode::TupleContainsKey,
            _ => return Err(GridError::Format(format!("unknown op code: {}", v))),
        })
    }

    /// Returns true if the transport may transparently resend this operation
    /// after a connection loss, when it is unknown whether the server
    /// observed the first attempt.
    ///
    /// Reads and unconditional full-row writes are safe to repeat;
    /// conditional writes and get-and-modify operations are not, since a
    /// repeat can observe its own first attempt.
    pub fn is_idempotent(self) -> bool {
        matches!(
            self,
            OpCode::Heartbeat
                | OpCode::TableGet
                | OpCode::SchemaGet
                | OpCode::TupleGet
                | OpCode::TupleGetAll
                | OpCode::TupleContainsKey
                | OpCode::TupleUpsert
                | OpCode::TupleUpsertAll
        )
    }
}
