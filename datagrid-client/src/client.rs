//! Client entry point.

use std::sync::Arc;

use bytes::BytesMut;

use datagrid_core::protocol::constants::TABLE_ID_NONE;
use datagrid_core::protocol::{OpCode, WireReader, WireWriter};
use datagrid_core::{GridError, Result};

use crate::buffer::BufferPool;
use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, PreferredNode};
use crate::table::Table;

/// A client session against a data grid cluster.
#[derive(Debug)]
pub struct GridClient {
    manager: Arc<ConnectionManager>,
    pool: BufferPool,
}

impl GridClient {
    /// Creates a client and starts connection maintenance. Connections are
    /// established lazily on the first request per node.
    pub fn connect(config: ClientConfig) -> Self {
        let manager = ConnectionManager::new(config);
        manager.start();
        Self {
            manager,
            pool: BufferPool::new(),
        }
    }

    /// Resolves a table by name.
    pub async fn table(&self, name: &str) -> Result<Arc<Table>> {
        let mut buf = BytesMut::new();
        WireWriter::new(&mut buf).put_string(name);

        let response = self
            .manager
            .invoke(OpCode::TableGet, buf.freeze(), PreferredNode::Any)
            .await?;

        let id = WireReader::new(&response.payload).read_i32()?;
        if id == TABLE_ID_NONE {
            return Err(GridError::TableNotFound(name.to_string()));
        }

        tracing::debug!(table = %name, id, "resolved table");
        Ok(Table::new(
            id,
            name,
            Arc::clone(&self.manager),
            self.pool.clone(),
        ))
    }

    /// Closes all connections and stops background tasks.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }
}
