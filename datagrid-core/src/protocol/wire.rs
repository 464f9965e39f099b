//! Primitive wire reads and writes.
//!
//! All multi-byte values are big-endian. Strings and binary blobs are
//! length-prefixed with an i32.

use bytes::{BufMut, BytesMut};

use crate::error::{GridError, Result};

/// Writes primitive values into a [`BytesMut`] in wire order.
#[derive(Debug)]
pub struct WireWriter<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> WireWriter<'a> {
    /// Wraps a buffer for writing.
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    /// Writes a single unsigned byte.
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    /// Writes an 8-bit signed integer.
    pub fn put_i8(&mut self, v: i8) {
        self.buf.put_i8(v);
    }

    /// Writes a 16-bit signed integer.
    pub fn put_i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }

    /// Writes a 32-bit signed integer.
    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    /// Writes a 64-bit signed integer.
    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    /// Writes an i32 length prefix followed by the raw bytes.
    pub fn put_binary(&mut self, v: &[u8]) {
        self.buf.put_i32(v.len() as i32);
        self.buf.put_slice(v);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn put_string(&mut self, v: &str) {
        self.put_binary(v.as_bytes());
    }
}

/// Bounds-checked reader over a received byte slice.
///
/// Every read fails with [`GridError::Format`] when the buffer is truncated.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Wraps a byte slice for reading.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Reads `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(GridError::Format(format!(
                "buffer truncated: wanted {} bytes, {} remaining",
                n,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Reads a single unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Reads an 8-bit signed integer.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_bytes(1)?[0] as i8)
    }

    /// Reads a 16-bit signed integer.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()))
    }

    /// Reads a 32-bit signed integer.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    /// Reads a 64-bit signed integer.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }

    /// Reads an i32 length prefix followed by the raw bytes.
    pub fn read_binary(&mut self) -> Result<&'a [u8]> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(GridError::Format(format!("negative binary length: {}", len)));
        }
        self.read_bytes(len as usize)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let raw = self.read_binary()?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| GridError::Format(format!("invalid UTF-8 string: {}", e)))
    }
}
