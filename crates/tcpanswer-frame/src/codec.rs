use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + length (2) + command (2) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Bytes needed before the declared length can be read: magic + length.
pub const PREFIX_SIZE: usize = 4;

/// Magic flag identifying tcpanswer frames.
pub const MAGIC: u16 = 1102;

/// Largest frame the 16-bit length field can describe.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// One complete protocol message.
///
/// Frames are values: built once by the codec (or [`Frame::new`]) and never
/// mutated afterwards, so `length` always matches the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    length: u16,
    command: u16,
    payload: Bytes,
}

impl Frame {
    /// A frame carrying only a command code.
    pub fn command_only(command: u16) -> Self {
        Self {
            length: HEADER_SIZE as u16,
            command,
            payload: Bytes::new(),
        }
    }

    /// Create a frame with a payload.
    ///
    /// Fails if header plus payload does not fit the 16-bit length field.
    pub fn new(command: u16, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        let size = HEADER_SIZE + payload.len();
        if size > MAX_FRAME_LEN {
            return Err(FrameError::FrameTooLarge {
                size,
                max: MAX_FRAME_LEN,
            });
        }
        Ok(Self {
            length: size as u16,
            command,
            payload,
        })
    }

    /// Always [`MAGIC`]; frames with any other flag never decode.
    pub fn magic(&self) -> u16 {
        MAGIC
    }

    /// Total wire size, header included.
    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn command(&self) -> u16 {
        self.command
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// Encode a payload-less command frame. Always exactly [`HEADER_SIZE`] bytes.
pub fn encode_command(command: u16, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_u16_le(MAGIC);
    dst.put_u16_le(HEADER_SIZE as u16);
    dst.put_u16_le(command);
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────┬──────────────────┐
/// │ Magic (2B)   │ Length (2B)  │ Command (2B) │ Payload          │
/// │ 1102 LE      │ total, LE    │ LE           │ (Length-6 bytes) │
/// └──────────────┴──────────────┴──────────────┴──────────────────┘
/// ```
pub fn encode_frame(command: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let size = HEADER_SIZE + payload.len();
    if size > MAX_FRAME_LEN {
        return Err(FrameError::FrameTooLarge {
            size,
            max: MAX_FRAME_LEN,
        });
    }
    dst.reserve(size);
    dst.put_u16_le(MAGIC);
    dst.put_u16_le(size as u16);
    dst.put_u16_le(command);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet; in
/// that case nothing is consumed and the call can be repeated once more bytes
/// arrive. On success exactly one frame is consumed from the front, leaving
/// any following bytes in place.
pub fn decode_frame(src: &mut BytesMut, max_frame_len: usize) -> Result<Option<Frame>> {
    if src.len() < PREFIX_SIZE {
        return Ok(None); // Need more data
    }

    let magic = u16::from_le_bytes([src[0], src[1]]);
    if magic != MAGIC {
        return Err(FrameError::BadHeaderFlag(magic));
    }

    let length = u16::from_le_bytes([src[2], src[3]]);
    if (length as usize) < HEADER_SIZE {
        return Err(FrameError::BadHeaderLength(length));
    }
    if length as usize > max_frame_len {
        return Err(FrameError::FrameTooLarge {
            size: length as usize,
            max: max_frame_len,
        });
    }

    if src.len() < length as usize {
        return Ok(None); // Need more data
    }

    let mut raw = src.split_to(length as usize);
    raw.advance(PREFIX_SIZE);
    let command = raw.get_u16_le();

    Ok(Some(Frame {
        length,
        command,
        payload: raw.freeze(),
    }))
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum accepted frame length in bytes, header included. Default: 65535.
    pub max_frame_len: usize,
    /// Read timeout for blocking operations. Default: none.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations. Default: none.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
