//! Request and response frames.
//!
//! Every frame is prefixed with a u32 big-endian length covering the frame
//! body. A request body is `request id (i64) + op code (i32) + payload`; a
//! response body is `request id (i64) + flags (i32) + payload`. When the
//! error flag is set, the payload carries a server error: trace uuid (16
//! raw bytes), error group (i16), error code (i16) and a message string.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use super::constants::*;
use super::op_code::OpCode;
use crate::error::{GridError, Result};

/// A single client request on the wire.
#[derive(Debug, Clone)]
pub struct RequestFrame {
    /// Correlation id, unique per connection.
    pub request_id: i64,
    /// The operation to perform.
    pub op: OpCode,
    /// Operation-specific payload.
    pub payload: Bytes,
}

impl RequestFrame {
    /// Writes this frame, including the length prefix, to the buffer.
    pub fn write_to(&self, dst: &mut BytesMut) {
        let body_len = SIZE_OF_REQUEST_HEADER + self.payload.len();
        dst.reserve(SIZE_OF_FRAME_LENGTH_FIELD + body_len);
        dst.put_u32(body_len as u32);
        dst.put_i64(self.request_id);
        dst.put_i32(self.op.as_i32());
        dst.put_slice(&self.payload);
    }

    /// Reads a frame from the buffer, consuming it.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a full frame.
    pub fn read_from(src: &mut BytesMut) -> Result<Option<Self>> {
        let Some(mut body) = split_frame(src)? else {
            return Ok(None);
        };
        if body.len() < SIZE_OF_REQUEST_HEADER {
            return Err(GridError::Format(format!(
                "request frame body of {} bytes is too short",
                body.len()
            )));
        }
        let request_id = body.get_i64();
        let op = OpCode::from_i32(body.get_i32())?;
        Ok(Some(Self {
            request_id,
            op,
            payload: body,
        }))
    }
}

/// A single server response on the wire.
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    /// Correlation id echoed from the request.
    pub request_id: i64,
    /// Response flags, see [`RESPONSE_FLAG_ERROR`] and
    /// [`RESPONSE_FLAG_SCHEMA_UPDATED`].
    pub flags: i32,
    /// Result payload, or an error body when the error flag is set.
    pub payload: Bytes,
}

impl ResponseFrame {
    /// Writes this frame, including the length prefix, to the buffer.
    pub fn write_to(&self, dst: &mut BytesMut) {
        let body_len = SIZE_OF_RESPONSE_HEADER + self.payload.len();
        dst.reserve(SIZE_OF_FRAME_LENGTH_FIELD + body_len);
        dst.put_u32(body_len as u32);
        dst.put_i64(self.request_id);
        dst.put_i32(self.flags);
        dst.put_slice(&self.payload);
    }

    /// Reads a frame from the buffer, consuming it.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a full frame.
    pub fn read_from(src: &mut BytesMut) -> Result<Option<Self>> {
        let Some(mut body) = split_frame(src)? else {
            return Ok(None);
        };
        if body.len() < SIZE_OF_RESPONSE_HEADER {
            return Err(GridError::Format(format!(
                "response frame body of {} bytes is too short",
                body.len()
            )));
        }
        let request_id = body.get_i64();
        let flags = body.get_i32();
        Ok(Some(Self {
            request_id,
            flags,
            payload: body,
        }))
    }

    /// Returns true if the error flag is set.
    pub fn is_error(&self) -> bool {
        self.flags & RESPONSE_FLAG_ERROR != 0
    }

    /// Returns true if the server flagged a newer schema version.
    pub fn is_schema_updated(&self) -> bool {
        self.flags & RESPONSE_FLAG_SCHEMA_UPDATED != 0
    }
}

fn split_frame(src: &mut BytesMut) -> Result<Option<Bytes>> {
    if src.len() < SIZE_OF_FRAME_LENGTH_FIELD {
        return Ok(None);
    }
    let body_len = u32::from_be_bytes(src[0..4].try_into().unwrap()) as usize;
    if src.len() < SIZE_OF_FRAME_LENGTH_FIELD + body_len {
        return Ok(None);
    }
    src.advance(SIZE_OF_FRAME_LENGTH_FIELD);
    Ok(Some(src.split_to(body_len).freeze()))
}

/// Encodes a server error body.
pub fn encode_server_error(
    dst: &mut BytesMut,
    trace_id: Uuid,
    group: i16,
    code: i16,
    message: &str,
) {
    dst.put_slice(trace_id.as_bytes());
    dst.put_i16(group);
    dst.put_i16(code);
    dst.put_i32(message.len() as i32);
    dst.put_slice(message.as_bytes());
}

/// Decodes a server error body into a [`GridError::Server`].
pub fn decode_server_error(payload: &[u8]) -> GridError {
    let mut reader = super::wire::WireReader::new(payload);

    let parse = |reader: &mut super::wire::WireReader<'_>| -> Result<GridError> {
        let raw: [u8; 16] = reader.read_bytes(16)?.try_into().unwrap();
        let trace_id = Uuid::from_bytes(raw);
        let group = reader.read_i16()?;
        let code = reader.read_i16()?;
        let message = reader.read_string()?;
        Ok(GridError::Server {
            trace_id,
            group,
            code,
            message,
        })
    };

    match parse(&mut reader) {
        Ok(err) => err,
        Err(_) => GridError::Format("malformed server error body".to_string()),
    }
}
