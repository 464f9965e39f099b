//! Async client engine for a distributed tabular data grid.
//!
//! The crate layers the table operation surface on top of the protocol
//! primitives from `datagrid-core`: a multiplexed connection pool with
//! partition-aware routing, a versioned schema cache, and typed or dynamic
//! record views over server-side tables.

#![warn(missing_docs)]

pub mod buffer;
pub mod client;
pub mod config;
pub mod connection;
pub mod table;
pub mod transaction;

pub use buffer::BufferPool;
pub use client::GridClient;
pub use config::{ClientConfig, ClientConfigBuilder, RetryPolicy};
pub use connection::{ConnectionManager, PreferredNode, Response};
pub use table::codec::{MappedRecordCodec, RecordCodec, TupleCodec};
pub use table::record_view::{RecordView, TupleView};
pub use table::Table;
pub use transaction::Transaction;
