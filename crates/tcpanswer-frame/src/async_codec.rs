//! `tokio_util` codec over the same wire format.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, HEADER_SIZE, MAX_FRAME_LEN};
use crate::error::FrameError;

/// Frame codec for `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct AnswerCodec {
    max_frame_len: usize,
}

impl AnswerCodec {
    pub fn new() -> Self {
        Self::with_max_frame_len(MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

impl Default for AnswerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AnswerCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_frame(src, self.max_frame_len)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Frame> for AnswerCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let size = HEADER_SIZE + item.payload().len();
        if size > self.max_frame_len {
            return Err(FrameError::FrameTooLarge {
                size,
                max: self.max_frame_len,
            });
        }
        encode_frame(item.command(), item.payload().as_ref(), dst)
    }
}

impl Encoder<u16> for AnswerCodec {
    type Error = FrameError;

    fn encode(&mut self, command: u16, dst: &mut BytesMut) -> Result<(), Self::Error> {
        crate::codec::encode_command(command, dst);
        Ok(())
    }
}
