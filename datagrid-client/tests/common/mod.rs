//! In-process grid node speaking the wire protocol against an in-memory
//! store. Enough of a server to exercise the client end to end.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use uuid::Uuid;

use datagrid_core::protocol::constants::{
    ERR_CODE_TABLE_NOT_FOUND, ERR_CODE_UNKNOWN_SCHEMA_VERSION, ERR_GROUP_TABLE,
    RESPONSE_FLAG_ERROR, RESPONSE_FLAG_SCHEMA_UPDATED, SCHEMA_VERSION_NONE, TABLE_ID_NONE,
};
use datagrid_core::protocol::frame::{encode_server_error, RequestFrame, ResponseFrame};
use datagrid_core::protocol::schema_io::encode_schema;
use datagrid_core::protocol::{OpCode, WireReader, WireWriter};
use datagrid_core::{
    BinaryTupleBuilder, BinaryTupleReader, GridTuple, Schema, Slot, TuplePart, Value,
};

pub const TABLE_ID: i32 = 11;

struct NodeState {
    table_name: String,
    schemas: Vec<Schema>,
    store: HashMap<Vec<u8>, GridTuple>,
    schema_fetches: usize,
    schema_fetch_delay: Duration,
    requests: usize,
    dropped: bool,
}

/// A single-node fake cluster bound to a loopback port.
pub struct FakeNode {
    addr: SocketAddr,
    state: Arc<Mutex<NodeState>>,
    accept_task: JoinHandle<()>,
}

impl FakeNode {
    pub async fn start(table_name: &str, schema: Schema) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(NodeState {
            table_name: table_name.to_string(),
            schemas: vec![schema],
            store: HashMap::new(),
            schema_fetches: 0,
            schema_fetch_delay: Duration::ZERO,
            requests: 0,
            dropped: false,
        }));

        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(serve_connection(stream, Arc::clone(&accept_state)));
            }
        });

        Self {
            addr,
            state,
            accept_task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Publishes a new schema version. Subsequent responses to requests sent
    /// with an older version carry the schema-updated flag.
    pub fn upgrade_schema(&self, schema: Schema) {
        self.state.lock().unwrap().schemas.push(schema);
    }

    pub fn schema_fetches(&self) -> usize {
        self.state.lock().unwrap().schema_fetches
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests
    }

    /// Slows schema responses down so that concurrent fetch attempts overlap.
    pub fn set_schema_fetch_delay(&self, delay: Duration) {
        self.state.lock().unwrap().schema_fetch_delay = delay;
    }

    /// Answers table and schema lookups as if the table had been dropped.
    pub fn drop_table(&self) {
        self.state.lock().unwrap().dropped = true;
    }

    /// Undoes [`drop_table`](FakeNode::drop_table).
    pub fn restore_table(&self) {
        self.state.lock().unwrap().dropped = false;
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(mut stream: TcpStream, state: Arc<Mutex<NodeState>>) {
    let mut buffer = BytesMut::with_capacity(8192);
    loop {
        let frame = loop {
            match RequestFrame::read_from(&mut buffer) {
                Ok(Some(frame)) => break frame,
                Ok(None) => match stream.read_buf(&mut buffer).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                },
                Err(_) => return,
            }
        };

        let response = handle_request(&state, frame).await;
        let mut out = BytesMut::new();
        response.write_to(&mut out);
        if stream.write_all(&out).await.is_err() {
            return;
        }
    }
}

async fn handle_request(state: &Arc<Mutex<NodeState>>, frame: RequestFrame) -> ResponseFrame {
    state.lock().unwrap().requests += 1;

    let result = match frame.op {
        OpCode::Heartbeat => Ok((0, Bytes::new())),
        OpCode::TableGet => handle_table_get(state, &frame.payload),
        OpCode::SchemaGet => handle_schema_get(state, &frame.payload).await,
        _ => handle_record_op(state, frame.op, &frame.payload),
    };

    match result {
        Ok((flags, payload)) => ResponseFrame {
            request_id: frame.request_id,
            flags,
            payload,
        },
        Err((group, code, message)) => {
            let mut body = BytesMut::new();
            encode_server_error(&mut body, Uuid::new_v4(), group, code, &message);
            ResponseFrame {
                request_id: frame.request_id,
                flags: RESPONSE_FLAG_ERROR,
                payload: body.freeze(),
            }
        }
    }
}

type HandlerResult = Result<(i32, Bytes), (i16, i16, String)>;

fn handle_table_get(state: &Arc<Mutex<NodeState>>, payload: &[u8]) -> HandlerResult {
    let mut r = WireReader::new(payload);
    let name = r.read_string().map_err(internal)?;

    let state = state.lock().unwrap();
    let mut body = BytesMut::new();
    let id = if !state.dropped && name == state.table_name {
        TABLE_ID
    } else {
        TABLE_ID_NONE
    };
    WireWriter::new(&mut body).put_i32(id);
    Ok((0, body.freeze()))
}

async fn handle_schema_get(state: &Arc<Mutex<NodeState>>, payload: &[u8]) -> HandlerResult {
    let mut r = WireReader::new(payload);
    let table_id = r.read_i32().map_err(internal)?;
    let version = r.read_i32().map_err(internal)?;

    let delay = {
        let mut state = state.lock().unwrap();
        state.schema_fetches += 1;
        state.schema_fetch_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let state = state.lock().unwrap();
    if state.dropped || table_id != TABLE_ID {
        return Err((
            ERR_GROUP_TABLE,
            ERR_CODE_TABLE_NOT_FOUND,
            format!("no table with id {}", table_id),
        ));
    }

    let schema = if version == SCHEMA_VERSION_NONE {
        state.schemas.last()
    } else {
        state.schemas.iter().find(|s| s.version() == version)
    };
    let Some(schema) = schema else {
        return Err((
            ERR_GROUP_TABLE,
            ERR_CODE_UNKNOWN_SCHEMA_VERSION,
            format!("unknown schema version {}", version),
        ));
    };

    let mut body = BytesMut::new();
    encode_schema(&mut body, schema);
    Ok((0, body.freeze()))
}

fn handle_record_op(state: &Arc<Mutex<NodeState>>, op: OpCode, payload: &[u8]) -> HandlerResult {
    let mut r = WireReader::new(payload);
    let _table_id = r.read_i32().map_err(internal)?;
    let _tx = r.read_i64().map_err(internal)?;
    let version = r.read_i32().map_err(internal)?;

    let mut state = state.lock().unwrap();
    let latest = state.schemas.last().unwrap().version();
    let Some(schema) = state
        .schemas
        .iter()
        .find(|s| s.version() == version)
        .cloned()
    else {
        return Err((
            ERR_GROUP_TABLE,
            ERR_CODE_UNKNOWN_SCHEMA_VERSION,
            format!("unknown schema version {}", version),
        ));
    };

    let mut body = BytesMut::new();
    {
        let mut w = WireWriter::new(&mut body);
        match op {
            OpCode::TupleGet => {
                let key = read_tuple(&mut r, &schema, TuplePart::Key)?;
                match state.store.get(&key_bytes(&schema, &key)) {
                    Some(row) => {
                        w.put_i32(schema.version());
                        w.put_binary(&encode_tuple(&schema, TuplePart::Value, row));
                    }
                    None => w.put_i32(SCHEMA_VERSION_NONE),
                }
            }
            OpCode::TupleGetAll => {
                let keys = read_tuples(&mut r, &schema, TuplePart::Key)?;
                w.put_i32(schema.version());
                w.put_i32(keys.len() as i32);
                for key in &keys {
                    match state.store.get(&key_bytes(&schema, key)) {
                        Some(row) => {
                            w.put_u8(1);
                            w.put_binary(&encode_tuple(&schema, TuplePart::KeyAndValue, row));
                        }
                        None => w.put_u8(0),
                    }
                }
            }
            OpCode::TupleUpsert => {
                let row = read_tuple(&mut r, &schema, TuplePart::KeyAndValue)?;
                state.store.insert(key_bytes(&schema, &row), row);
            }
            OpCode::TupleUpsertAll => {
                for row in read_tuples(&mut r, &schema, TuplePart::KeyAndValue)? {
                    state.store.insert(key_bytes(&schema, &row), row);
                }
            }
            OpCode::TupleInsert => {
                let row = read_tuple(&mut r, &schema, TuplePart::KeyAndValue)?;
                let key = key_bytes(&schema, &row);
                let inserted = if state.store.contains_key(&key) {
                    false
                } else {
                    state.store.insert(key, row);
                    true
                };
                w.put_u8(u8::from(inserted));
            }
            OpCode::TupleInsertAll => {
                let rows = read_tuples(&mut r, &schema, TuplePart::KeyAndValue)?;
                let mut skipped = Vec::new();
                for row in rows {
                    let key = key_bytes(&schema, &row);
                    if state.store.contains_key(&key) {
                        skipped.push(row);
                    } else {
                        state.store.insert(key, row);
                    }
                }
                w.put_i32(schema.version());
                w.put_i32(skipped.len() as i32);
                for row in &skipped {
                    w.put_binary(&encode_tuple(&schema, TuplePart::KeyAndValue, row));
                }
            }
            OpCode::TupleReplace => {
                let row = read_tuple(&mut r, &schema, TuplePart::KeyAndValue)?;
                let key = key_bytes(&schema, &row);
                let replaced = state.store.contains_key(&key);
                if replaced {
                    state.store.insert(key, row);
                }
                w.put_u8(u8::from(replaced));
            }
            OpCode::TupleReplaceExact => {
                let expected = read_tuple(&mut r, &schema, TuplePart::KeyAndValue)?;
                let new = read_tuple(&mut r, &schema, TuplePart::KeyAndValue)?;
                let key = key_bytes(&schema, &expected);
                let matches = state
                    .store
                    .get(&key)
                    .map(|row| rows_equal(&schema, row, &expected))
                    .unwrap_or(false);
                if matches {
                    state.store.insert(key, new);
                }
                w.put_u8(u8::from(matches));
            }
            OpCode::TupleGetAndReplace => {
                let row = read_tuple(&mut r, &schema, TuplePart::KeyAndValue)?;
                let key = key_bytes(&schema, &row);
                match state.store.get(&key).cloned() {
                    Some(old) => {
                        state.store.insert(key, row);
                        w.put_i32(schema.version());
                        w.put_binary(&encode_tuple(&schema, TuplePart::Value, &old));
                    }
                    None => w.put_i32(SCHEMA_VERSION_NONE),
                }
            }
            OpCode::TupleGetAndUpsert => {
                let row = read_tuple(&mut r, &schema, TuplePart::KeyAndValue)?;
                let key = key_bytes(&schema, &row);
                match state.store.insert(key, row) {
                    Some(old) => {
                        w.put_i32(schema.version());
                        w.put_binary(&encode_tuple(&schema, TuplePart::Value, &old));
                    }
                    None => w.put_i32(SCHEMA_VERSION_NONE),
                }
            }
            OpCode::TupleDelete => {
                let key = read_tuple(&mut r, &schema, TuplePart::Key)?;
                let removed = state.store.remove(&key_bytes(&schema, &key)).is_some();
                w.put_u8(u8::from(removed));
            }
            OpCode::TupleDeleteExact => {
                let row = read_tuple(&mut r, &schema, TuplePart::KeyAndValue)?;
                let key = key_bytes(&schema, &row);
                let matches = state
                    .store
                    .get(&key)
                    .map(|stored| rows_equal(&schema, stored, &row))
                    .unwrap_or(false);
                if matches {
                    state.store.remove(&key);
                }
                w.put_u8(u8::from(matches));
            }
            OpCode::TupleGetAndDelete => {
                let key = read_tuple(&mut r, &schema, TuplePart::Key)?;
                match state.store.remove(&key_bytes(&schema, &key)) {
                    Some(old) => {
                        w.put_i32(schema.version());
                        w.put_binary(&encode_tuple(&schema, TuplePart::Value, &old));
                    }
                    None => w.put_i32(SCHEMA_VERSION_NONE),
                }
            }
            OpCode::TupleDeleteAll => {
                let keys = read_tuples(&mut r, &schema, TuplePart::Key)?;
                let mut missing = Vec::new();
                for key in keys {
                    if state.store.remove(&key_bytes(&schema, &key)).is_none() {
                        missing.push(key);
                    }
                }
                w.put_i32(schema.version());
                w.put_i32(missing.len() as i32);
                for key in &missing {
                    w.put_binary(&encode_tuple(&schema, TuplePart::Key, key));
                }
            }
            OpCode::TupleDeleteAllExact => {
                let rows = read_tuples(&mut r, &schema, TuplePart::KeyAndValue)?;
                let mut unmatched = Vec::new();
                for row in rows {
                    let key = key_bytes(&schema, &row);
                    let matches = state
                        .store
                        .get(&key)
                        .map(|stored| rows_equal(&schema, stored, &row))
                        .unwrap_or(false);
                    if matches {
                        state.store.remove(&key);
                    } else {
                        unmatched.push(row);
                    }
                }
                w.put_i32(schema.version());
                w.put_i32(unmatched.len() as i32);
                for row in &unmatched {
                    w.put_binary(&encode_tuple(&schema, TuplePart::KeyAndValue, row));
                }
            }
            OpCode::TupleContainsKey => {
                let key = read_tuple(&mut r, &schema, TuplePart::Key)?;
                let present = state.store.contains_key(&key_bytes(&schema, &key));
                w.put_u8(u8::from(present));
            }
            OpCode::Heartbeat | OpCode::TableGet | OpCode::SchemaGet => unreachable!(),
        }
    }

    let mut flags = 0;
    let payload = if latest > version {
        flags |= RESPONSE_FLAG_SCHEMA_UPDATED;
        let mut flagged = BytesMut::new();
        WireWriter::new(&mut flagged).put_i32(latest);
        flagged.extend_from_slice(&body);
        flagged.freeze()
    } else {
        body.freeze()
    };
    Ok((flags, payload))
}

fn internal<E: std::fmt::Display>(e: E) -> (i16, i16, String) {
    (0, 0, format!("malformed request: {}", e))
}

fn read_tuple(
    r: &mut WireReader<'_>,
    schema: &Schema,
    part: TuplePart,
) -> Result<GridTuple, (i16, i16, String)> {
    let slice = schema.slice(part);
    let raw = Bytes::copy_from_slice(r.read_binary().map_err(internal)?);
    let reader = BinaryTupleReader::new(raw, slice.len()).map_err(internal)?;

    let mut tuple = GridTuple::with_capacity(slice.len());
    for (i, column) in slice.columns().enumerate() {
        match reader.slot(i, column).map_err(internal)? {
            Slot::NoValue => {}
            Slot::Null => tuple.put(column.name.clone(), Value::Null),
            Slot::Value(value) => tuple.put(column.name.clone(), value),
        }
    }
    Ok(tuple)
}

fn read_tuples(
    r: &mut WireReader<'_>,
    schema: &Schema,
    part: TuplePart,
) -> Result<Vec<GridTuple>, (i16, i16, String)> {
    let count = r.read_i32().map_err(internal)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(read_tuple(r, schema, part)?);
    }
    Ok(out)
}

fn encode_tuple(schema: &Schema, part: TuplePart, row: &GridTuple) -> Bytes {
    let slice = schema.slice(part);
    let mut builder = BinaryTupleBuilder::new(slice.len());
    for column in slice.columns() {
        match row.get(&column.name) {
            Some(value) => builder.append(column, value).unwrap(),
            None => builder.append_no_value().unwrap(),
        }
    }
    builder.build().unwrap()
}

fn key_bytes(schema: &Schema, row: &GridTuple) -> Vec<u8> {
    encode_tuple(schema, TuplePart::Key, row).to_vec()
}

fn rows_equal(schema: &Schema, a: &GridTuple, b: &GridTuple) -> bool {
    encode_tuple(schema, TuplePart::KeyAndValue, a)
        == encode_tuple(schema, TuplePart::KeyAndValue, b)
}
