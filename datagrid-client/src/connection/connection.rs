//! A single multiplexed connection to a cluster node.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_util::codec::Decoder;

use datagrid_core::protocol::frame::decode_server_error;
use datagrid_core::protocol::{FrameCodec, OpCode, RequestFrame, ResponseFrame};
use datagrid_core::{GridError, Result};

/// A decoded, non-error response payload.
#[derive(Debug)]
pub struct Response {
    /// Operation-specific result bytes.
    pub payload: Bytes,
    /// Set when the server flagged that a newer schema version exists for
    /// the addressed table.
    pub newer_schema_version: Option<i32>,
}

type Waiter = oneshot::Sender<Result<ResponseFrame>>;

/// Pending requests keyed by request id; `None` once the connection died.
type Pending = Arc<Mutex<Option<HashMap<i64, Waiter>>>>;

fn lock_pending(pending: &Pending) -> MutexGuard<'_, Option<HashMap<i64, Waiter>>> {
    match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One TCP connection multiplexing any number of concurrent requests.
///
/// Writes go through an async mutex; a background reader task correlates
/// response frames to pending requests by request id. Connection loss fails
/// every pending request; the connection is then permanently dead and the
/// pool establishes a replacement.
#[derive(Debug)]
pub struct Connection {
    address: SocketAddr,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Pending,
    next_request_id: AtomicI64,
    request_timeout: Duration,
}

impl Connection {
    /// Establishes a connection and spawns its reader task.
    pub async fn connect(
        address: SocketAddr,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                GridError::Timeout(format!(
                    "connect to {} timed out after {:?}",
                    address, connect_timeout
                ))
            })?
            .map_err(|e| GridError::Connection(format!("failed to connect to {}: {}", address, e)))?;

        stream
            .set_nodelay(true)
            .map_err(|e| GridError::Connection(format!("failed to set TCP_NODELAY: {}", e)))?;

        let (read_half, write_half) = stream.into_split();
        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));

        tokio::spawn(read_loop(read_half, Arc::clone(&pending), address));

        tracing::debug!(address = %address, "established connection");
        Ok(Self {
            address,
            writer: tokio::sync::Mutex::new(write_half),
            pending,
            next_request_id: AtomicI64::new(1),
            request_timeout,
        })
    }

    /// Returns the remote address of this connection.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Returns true if the reader task is still serving responses.
    pub fn is_alive(&self) -> bool {
        lock_pending(&self.pending).is_some()
    }

    /// Sends one request and suspends until its response arrives.
    ///
    /// Server errors are decoded into [`GridError`]; a schema-updated flag
    /// is stripped from the payload and surfaced on the [`Response`].
    pub async fn invoke(&self, op: OpCode, payload: Bytes) -> Result<Response> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        {
            let mut pending = lock_pending(&self.pending);
            match pending.as_mut() {
                Some(map) => {
                    map.insert(request_id, sender);
                }
                None => {
                    return Err(GridError::Connection(format!(
                        "connection to {} is closed",
                        self.address
                    )))
                }
            }
        }

        let mut buf = BytesMut::new();
        RequestFrame {
            request_id,
            op,
            payload,
        }
        .write_to(&mut buf);

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.write_all(&buf).await {
                self.forget(request_id);
                return Err(GridError::Connection(format!(
                    "failed to write to {}: {}",
                    self.address, e
                )));
            }
        }

        let frame = match timeout(self.request_timeout, receiver).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => {
                return Err(GridError::Connection(format!(
                    "connection to {} closed while awaiting response",
                    self.address
                )))
            }
            Err(_) => {
                self.forget(request_id);
                return Err(GridError::Timeout(format!(
                    "request {:?} to {} timed out after {:?}",
                    op, self.address, self.request_timeout
                )));
            }
        };

        decode_response(frame)
    }

    /// Closes the connection, failing any pending requests.
    pub async fn close(&self) {
        fail_all_pending(&self.pending, self.address, "connection closed by client");
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        tracing::debug!(address = %self.address, "connection closed");
    }

    fn forget(&self, request_id: i64) {
        if let Some(map) = lock_pending(&self.pending).as_mut() {
            map.remove(&request_id);
        }
    }
}

fn decode_response(frame: ResponseFrame) -> Result<Response> {
    if frame.is_error() {
        return Err(decode_server_error(&frame.payload));
    }

    let schema_updated = frame.is_schema_updated();
    let mut payload = frame.payload;
    let newer_schema_version = if schema_updated {
        if payload.len() < 4 {
            return Err(GridError::Format(
                "schema-updated response is missing the version field".to_string(),
            ));
        }
        Some(payload.get_i32())
    } else {
        None
    };

    Ok(Response {
        payload,
        newer_schema_version,
    })
}

async fn read_loop(mut read_half: OwnedReadHalf, pending: Pending, address: SocketAddr) {
    let mut codec = FrameCodec::new();
    let mut buffer = BytesMut::with_capacity(8192);

    let error = loop {
        match codec.decode(&mut buffer) {
            Ok(Some(frame)) => {
                let waiter = lock_pending(&pending)
                    .as_mut()
                    .and_then(|map| map.remove(&frame.request_id));
                match waiter {
                    // The waiter may be gone when the caller timed out or
                    // was cancelled; the response is simply dropped.
                    Some(sender) => {
                        let _ = sender.send(Ok(frame));
                    }
                    None => {
                        tracing::debug!(
                            address = %address,
                            request_id = frame.request_id,
                            "dropping response with no pending request"
                        );
                    }
                }
            }
            Ok(None) => match read_half.read_buf(&mut buffer).await {
                Ok(0) => break format!("connection to {} closed by peer", address),
                Ok(_) => {}
                Err(e) => break format!("failed to read from {}: {}", address, e),
            },
            Err(e) => break format!("protocol error on {}: {}", address, e),
        }
    };

    tracing::warn!(address = %address, error = %error, "connection lost");
    fail_all_pending(&pending, address, &error);
}

fn fail_all_pending(pending: &Pending, address: SocketAddr, reason: &str) {
    let map = lock_pending(pending).take();
    if let Some(map) = map {
        for (_, sender) in map {
            let _ = sender.send(Err(GridError::Connection(format!(
                "request to {} failed: {}",
                address, reason
            ))));
        }
    }
}
