//! Core types and wire protocol for the data grid client.

#![warn(missing_docs)]

pub mod binary_tuple;
pub mod colocation;
pub mod error;
pub mod protocol;
pub mod schema;
pub mod tuple;
pub mod types;

pub use binary_tuple::{BinaryTupleBuilder, BinaryTupleReader, Slot};
pub use colocation::{colocation_hash, hash32};
pub use error::{GridError, Result};
pub use protocol::{OpCode, RequestFrame, ResponseFrame};
pub use schema::{Column, Schema, SchemaSlice, TuplePart};
pub use tuple::GridTuple;
pub use types::{ColumnType, Value};
