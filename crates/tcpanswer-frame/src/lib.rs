//! Length-prefixed command framing for tcpanswer.
//!
//! Every message on the wire is a frame:
//! - A 2-byte little-endian magic flag (1102) for stream synchronization
//! - A 2-byte little-endian total length, header included
//! - A 2-byte little-endian command code
//! - `length - 6` bytes of payload
//!
//! [`FrameReader`] owns the receive buffer and reassembles partial reads, so
//! callers always get complete frames.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::AnswerCodec;
pub use codec::{
    decode_frame, encode_command, encode_frame, Frame, FrameConfig, HEADER_SIZE, MAGIC,
    MAX_FRAME_LEN, PREFIX_SIZE,
};
pub use command::{command_name, ECHO, EXIT, UNKNOWN};
pub use error::{FrameError, Result};
pub use reader::{is_timeout, FrameReader};
pub use writer::FrameWriter;
