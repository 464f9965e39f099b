//! Wire protocol: primitives, framing and operation codes.

pub mod codec;
pub mod constants;
pub mod frame;
pub mod op_code;
pub mod schema_io;
pub mod wire;

pub use codec::FrameCodec;
pub use frame::{RequestFrame, ResponseFrame};
pub use op_code::OpCode;
pub use wire::{WireReader, WireWriter};
