//! Per-table schema cache with single-flight fetching.
//!
//! Schemas are immutable once fetched and cached forever by version. At most
//! one fetch per version is in flight at a time; concurrent callers wait on
//! the leader's result instead of issuing duplicate requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::BytesMut;
use tokio::sync::oneshot;

use datagrid_core::protocol::constants::{
    ERR_CODE_TABLE_NOT_FOUND, ERR_CODE_UNKNOWN_SCHEMA_VERSION, ERR_GROUP_TABLE,
    SCHEMA_VERSION_NONE,
};
use datagrid_core::protocol::schema_io::decode_schema;
use datagrid_core::protocol::{OpCode, WireReader, WireWriter};
use datagrid_core::{GridError, Result, Schema};

use crate::connection::{ConnectionManager, PreferredNode};

type Waiter = oneshot::Sender<Result<Arc<Schema>>>;

#[derive(Debug, Default)]
struct RegistryState {
    schemas: HashMap<i32, Arc<Schema>>,
    latest_known: Option<i32>,
    stale: bool,
    in_flight: HashMap<i32, Vec<Waiter>>,
}

/// Versioned schema cache for one table.
#[derive(Debug)]
pub struct SchemaRegistry {
    table_id: i32,
    table_name: String,
    manager: Arc<ConnectionManager>,
    state: Mutex<RegistryState>,
}

/// Removes the in-flight entry when the leader is dropped before completing,
/// failing any waiters so they can retry rather than hang.
struct InFlightGuard<'a> {
    registry: &'a SchemaRegistry,
    key: i32,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let waiters = self
            .registry
            .lock_state()
            .in_flight
            .remove(&self.key)
            .unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(Err(GridError::SchemaFetch(
                "schema fetch was cancelled".to_string(),
            )));
        }
    }
}

impl SchemaRegistry {
    /// Creates an empty registry for the given table.
    pub fn new(table_id: i32, table_name: impl Into<String>, manager: Arc<ConnectionManager>) -> Self {
        Self {
            table_id,
            table_name: table_name.into(),
            manager,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Returns the schema for an exact version, fetching it on a cache miss.
    pub async fn schema(&self, version: i32) -> Result<Arc<Schema>> {
        {
            let state = self.lock_state();
            if let Some(schema) = state.schemas.get(&version) {
                return Ok(Arc::clone(schema));
            }
        }
        self.fetch(version).await
    }

    /// Returns the latest schema known to the cluster.
    ///
    /// Served from cache until a response marks the cache stale; then the
    /// next call refreshes from the server.
    pub async fn latest_schema(&self) -> Result<Arc<Schema>> {
        {
            let state = self.lock_state();
            if !state.stale {
                if let Some(schema) = state
                    .latest_known
                    .and_then(|v| state.schemas.get(&v))
                {
                    return Ok(Arc::clone(schema));
                }
            }
        }
        self.fetch(SCHEMA_VERSION_NONE).await
    }

    /// Records a server hint that a newer schema version exists. The next
    /// [`latest_schema`](SchemaRegistry::latest_schema) call refetches.
    pub fn observe_version(&self, version: i32) {
        let mut state = self.lock_state();
        if state.latest_known.map_or(true, |known| version > known) {
            state.stale = true;
        }
    }

    /// Fetches one version (or the latest, keyed by the sentinel), joining
    /// an in-flight fetch for the same key when one exists.
    async fn fetch(&self, key: i32) -> Result<Arc<Schema>> {
        let receiver = {
            let mut state = self.lock_state();

            // Re-check under the lock; another task may have finished while
            // this one was acquiring it.
            if key != SCHEMA_VERSION_NONE {
                if let Some(schema) = state.schemas.get(&key) {
                    return Ok(Arc::clone(schema));
                }
            } else if !state.stale {
                if let Some(schema) = state
                    .latest_known
                    .and_then(|v| state.schemas.get(&v))
                {
                    return Ok(Arc::clone(schema));
                }
            }

            match state.in_flight.get_mut(&key) {
                Some(waiters) => {
                    let (sender, receiver) = oneshot::channel();
                    waiters.push(sender);
                    Some(receiver)
                }
                None => {
                    state.in_flight.insert(key, Vec::new());
                    None
                }
            }
        };

        if let Some(receiver) = receiver {
            return match receiver.await {
                Ok(result) => result,
                Err(_) => Err(GridError::SchemaFetch(
                    "schema fetch was cancelled".to_string(),
                )),
            };
        }

        let mut guard = InFlightGuard {
            registry: self,
            key,
            armed: true,
        };

        let result = self.fetch_from_server(key).await;
        let waiters = self.apply_fetch_result(key, &result);
        guard.armed = false;

        for waiter in waiters {
            let _ = waiter.send(match &result {
                Ok(schema) => Ok(Arc::clone(schema)),
                Err(e) => Err(self.clone_error(e)),
            });
        }

        result
    }

    /// Folds a completed fetch into the cache and releases the in-flight
    /// entry. A successful fetch caches the schema; `TableNotFound` drops
    /// every cached version, and `UnknownSchemaVersion` evicts only the
    /// version the server no longer knows.
    fn apply_fetch_result(&self, key: i32, result: &Result<Arc<Schema>>) -> Vec<Waiter> {
        let mut state = self.lock_state();
        match result {
            Ok(schema) => {
                let version = schema.version();
                state.schemas.insert(version, Arc::clone(schema));
                if state.latest_known.map_or(true, |known| version > known) {
                    state.latest_known = Some(version);
                }
                if key == SCHEMA_VERSION_NONE {
                    state.stale = false;
                }
            }
            Err(GridError::TableNotFound(_)) => {
                state.schemas.clear();
                state.latest_known = None;
            }
            Err(GridError::UnknownSchemaVersion { version, .. }) => {
                state.schemas.remove(version);
            }
            Err(_) => {}
        }
        state.in_flight.remove(&key).unwrap_or_default()
    }

    async fn fetch_from_server(&self, key: i32) -> Result<Arc<Schema>> {
        let mut buf = BytesMut::new();
        let mut w = WireWriter::new(&mut buf);
        w.put_i32(self.table_id);
        w.put_i32(key);

        tracing::debug!(
            table = %self.table_name,
            version = key,
            "fetching schema"
        );

        let response = self
            .manager
            .invoke(OpCode::SchemaGet, buf.freeze(), PreferredNode::Any)
            .await
            .map_err(|e| self.map_fetch_error(e, key))?;

        let mut reader = WireReader::new(&response.payload);
        let schema = decode_schema(&mut reader)
            .map_err(|e| GridError::SchemaFetch(e.to_string()))?;

        if key != SCHEMA_VERSION_NONE && schema.version() != key {
            return Err(GridError::SchemaFetch(format!(
                "requested schema version {} but the server returned {}",
                key,
                schema.version()
            )));
        }

        Ok(Arc::new(schema))
    }

    fn map_fetch_error(&self, e: GridError, key: i32) -> GridError {
        match e {
            GridError::Server { group, code, .. }
                if group == ERR_GROUP_TABLE && code == ERR_CODE_TABLE_NOT_FOUND =>
            {
                GridError::TableNotFound(self.table_name.clone())
            }
            GridError::Server { group, code, .. }
                if group == ERR_GROUP_TABLE && code == ERR_CODE_UNKNOWN_SCHEMA_VERSION =>
            {
                GridError::UnknownSchemaVersion {
                    table_id: self.table_id,
                    version: key,
                }
            }
            GridError::Connection(_) | GridError::Timeout(_) | GridError::Io(_) => e,
            other => GridError::SchemaFetch(other.to_string()),
        }
    }

    /// Reconstructs a fan-out copy of a fetch error for each waiter. Variants
    /// that callers match on keep their shape; the rest degrade to
    /// [`GridError::SchemaFetch`] with the original message.
    fn clone_error(&self, e: &GridError) -> GridError {
        match e {
            GridError::TableNotFound(name) => GridError::TableNotFound(name.clone()),
            GridError::UnknownSchemaVersion { table_id, version } => {
                GridError::UnknownSchemaVersion {
                    table_id: *table_id,
                    version: *version,
                }
            }
            other => GridError::SchemaFetch(other.to_string()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
