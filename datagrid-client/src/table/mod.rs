//! Table access: schema tracking, record codecs and the record view.

pub mod codec;
pub mod record_view;
pub mod schema_registry;
pub mod serializer;

use std::sync::Arc;

use datagrid_core::protocol::constants::SCHEMA_VERSION_NONE;
use datagrid_core::protocol::WireReader;
use datagrid_core::{GridTuple, Result, Schema};

use crate::buffer::BufferPool;
use crate::connection::{ConnectionManager, Response};
use crate::table::codec::{RecordCodec, TupleCodec};
use crate::table::record_view::{RecordView, TupleView};
use crate::table::schema_registry::SchemaRegistry;

/// A handle to one server-side table.
#[derive(Debug)]
pub struct Table {
    id: i32,
    name: String,
    manager: Arc<ConnectionManager>,
    registry: SchemaRegistry,
    pool: BufferPool,
}

impl Table {
    pub(crate) fn new(
        id: i32,
        name: impl Into<String>,
        manager: Arc<ConnectionManager>,
        pool: BufferPool,
    ) -> Arc<Self> {
        let name = name.into();
        let registry = SchemaRegistry::new(id, name.clone(), Arc::clone(&manager));
        Arc::new(Self {
            id,
            name,
            manager,
            registry,
            pool,
        })
    }

    /// Returns the server-assigned table id.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the latest schema known for this table.
    pub async fn latest_schema(&self) -> Result<Arc<Schema>> {
        self.registry.latest_schema().await
    }

    /// Opens a dynamic view over this table.
    pub fn tuple_view(self: &Arc<Self>) -> TupleView {
        self.record_view::<GridTuple>(Arc::new(TupleCodec))
    }

    /// Opens a typed view over this table with the given codec.
    pub fn record_view<T>(self: &Arc<Self>, codec: Arc<dyn RecordCodec<T>>) -> RecordView<T> {
        RecordView::new(Arc::clone(self), codec)
    }

    /// Reads the leading schema version of a record response and resolves it
    /// through the registry. The "none" sentinel means the server found no
    /// record.
    pub(crate) async fn read_schema(
        &self,
        reader: &mut WireReader<'_>,
    ) -> Result<Option<Arc<Schema>>> {
        let version = reader.read_i32()?;
        if version == SCHEMA_VERSION_NONE {
            return Ok(None);
        }
        self.registry.schema(version).await.map(Some)
    }

    /// Feeds a response's schema-updated hint into the registry.
    pub(crate) fn note_response(&self, response: &Response) {
        if let Some(version) = response.newer_schema_version {
            tracing::debug!(table = %self.name, version, "newer schema version observed");
            self.registry.observe_version(version);
        }
    }

    pub(crate) fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub(crate) fn pool(&self) -> &BufferPool {
        &self.pool
    }
}
