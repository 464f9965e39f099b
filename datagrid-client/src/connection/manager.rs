//! Connection pool management and partition-aware request routing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tokio::sync::{watch, RwLock};
use tokio::time::interval;

use datagrid_core::protocol::OpCode;
use datagrid_core::Result;

use super::connection::{Connection, Response};
use crate::config::ClientConfig;

/// A routing hint for one request.
///
/// The transport maps a colocation hash onto the node list so that
/// requests land on the partition owner; `Any` round-robins across nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredNode {
    /// Any available node.
    Any,
    /// The node owning the partition for this colocation hash.
    ColocationHash(i32),
}

/// Calculates the next backoff duration with jitter applied.
fn backoff_with_jitter(
    current: Duration,
    multiplier: f64,
    max_backoff: Duration,
    jitter: f64,
) -> Duration {
    let base = current.as_secs_f64() * multiplier;

    let jitter_factor = if jitter > 0.0 {
        let mut rng = rand::thread_rng();
        1.0 + rng.gen_range(-jitter..=jitter)
    } else {
        1.0
    };

    std::cmp::min(Duration::from_secs_f64(base * jitter_factor), max_backoff)
}

/// Manages connections to cluster nodes and dispatches requests.
#[derive(Debug)]
pub struct ConnectionManager {
    config: Arc<ClientConfig>,
    connections: RwLock<HashMap<SocketAddr, Arc<Connection>>>,
    round_robin: AtomicUsize,
    shutdown: watch::Sender<bool>,
}

impl ConnectionManager {
    /// Creates a manager for the configured node addresses.
    pub fn new(config: ClientConfig) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            config: Arc::new(config),
            connections: RwLock::new(HashMap::new()),
            round_robin: AtomicUsize::new(0),
            shutdown,
        })
    }

    /// Starts background maintenance: periodic heartbeats on every pooled
    /// connection, dropping connections that stop responding.
    pub fn start(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(manager.config.heartbeat_interval());
            loop {
                tokio::select! {
                    _ = ticker.tick() => manager.heartbeat_round().await,
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    /// Sends one request, retrying idempotent operations on another node
    /// after retriable failures per the configured policy.
    pub async fn invoke(
        &self,
        op: OpCode,
        payload: Bytes,
        preferred: PreferredNode,
    ) -> Result<Response> {
        let retry = self.config.retry();
        let max_attempts = retry.max_attempts.max(1);
        let mut backoff = retry.initial_backoff;
        let mut address = self.pick_address(preferred);

        let mut attempt = 0;
        loop {
            attempt += 1;

            let result = match self.connection_to(address).await {
                Ok(conn) => conn.invoke(op, payload.clone()).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) => {
                    self.drop_dead_connection(address).await;

                    let may_retry =
                        e.is_retriable() && op.is_idempotent() && attempt < max_attempts;
                    if !may_retry {
                        return Err(e);
                    }

                    tracing::warn!(
                        op = ?op,
                        address = %address,
                        attempt,
                        error = %e,
                        "retrying on another node"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff_with_jitter(
                        backoff,
                        retry.multiplier,
                        retry.max_backoff,
                        retry.jitter,
                    );
                    address = self.next_address(address);
                }
            }
        }
    }

    /// Tears down all connections and stops background tasks.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let connections: Vec<_> = {
            let mut map = self.connections.write().await;
            map.drain().map(|(_, c)| c).collect()
        };
        for conn in connections {
            conn.close().await;
        }
    }

    fn pick_address(&self, preferred: PreferredNode) -> SocketAddr {
        let addresses = self.config.addresses();
        let index = match preferred {
            PreferredNode::ColocationHash(hash) => (hash as u32) as usize % addresses.len(),
            PreferredNode::Any => {
                self.round_robin.fetch_add(1, Ordering::Relaxed) % addresses.len()
            }
        };
        addresses[index]
    }

    fn next_address(&self, current: SocketAddr) -> SocketAddr {
        let addresses = self.config.addresses();
        let at = addresses.iter().position(|a| *a == current).unwrap_or(0);
        addresses[(at + 1) % addresses.len()]
    }

    async fn connection_to(&self, address: SocketAddr) -> Result<Arc<Connection>> {
        {
            let connections = self.connections.read().await;
            if let Some(conn) = connections.get(&address) {
                if conn.is_alive() {
                    return Ok(Arc::clone(conn));
                }
            }
        }

        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.get(&address) {
            if conn.is_alive() {
                return Ok(Arc::clone(conn));
            }
        }

        let conn = Arc::new(
            Connection::connect(
                address,
                self.config.connect_timeout(),
                self.config.request_timeout(),
            )
            .await?,
        );
        connections.insert(address, Arc::clone(&conn));
        Ok(conn)
    }

    async fn drop_dead_connection(&self, address: SocketAddr) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.get(&address) {
            if !conn.is_alive() {
                connections.remove(&address);
            }
        }
    }

    async fn heartbeat_round(&self) {
        let connections: Vec<_> = {
            let map = self.connections.read().await;
            map.values().cloned().collect()
        };

        for conn in connections {
            if let Err(e) = conn.invoke(OpCode::Heartbeat, Bytes::new()).await {
                tracing::warn!(address = %conn.address(), error = %e, "heartbeat failed");
                self.drop_dead_connection(conn.address()).await;
            }
        }
    }
}
