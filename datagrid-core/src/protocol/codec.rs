//! Codec for framed I/O on the client side of a connection.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use super::frame::{RequestFrame, ResponseFrame};
use crate::error::GridError;

/// Encodes requests and decodes responses for use with tokio's framed I/O.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Creates a new codec instance.
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<RequestFrame> for FrameCodec {
    type Error = GridError;

    fn encode(&mut self, item: RequestFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.write_to(dst);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = ResponseFrame;
    type Error = GridError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        ResponseFrame::read_from(src)
    }
}
