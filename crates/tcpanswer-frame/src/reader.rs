use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tcpanswer_transport::AnswerStream;
use tracing::trace;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

/// Bytes requested from the stream per read.
const READ_CHUNK_SIZE: usize = 1024;

/// Reassembles frames from a byte stream.
///
/// This is the session's receive buffer. Bytes that do not yet form a whole
/// frame wait here across calls, and bytes past the end of a frame are kept
/// for the next one, so nothing is dropped or read twice.
pub struct FrameReader<T> {
    inner: T,
    recv: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            recv: BytesMut::with_capacity(READ_CHUNK_SIZE),
            config,
        }
    }

    /// Block until one complete frame is buffered and return it.
    ///
    /// End of stream, with or without a partial frame pending, is
    /// [`FrameError::ConnectionClosed`]. Protocol violations are returned as
    /// soon as the header shows them.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.recv, self.config.max_frame_len)? {
                trace!(
                    command = frame.command(),
                    length = frame.length(),
                    pending = self.recv.len(),
                    "decoded frame"
                );
                return Ok(frame);
            }
            if self.fill()? == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// Append one read's worth of bytes to the buffer.
    fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => {
                    self.recv.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// After Exit: `Ok(true)` if the peer closes (EOF or read error),
    /// `Ok(false)` if any byte arrives or is already sitting in the buffer.
    ///
    /// A read timeout means the close was never observed and is returned as
    /// an error rather than counted as closed.
    pub fn wait_closed(&mut self) -> Result<bool> {
        if !self.recv.is_empty() {
            return Ok(false);
        }
        match self.fill() {
            Ok(0) => Ok(true),
            Ok(_) => Ok(false),
            Err(FrameError::Io(err)) if is_timeout(&err) => Err(FrameError::Io(err)),
            Err(_) => Ok(true),
        }
    }

    /// Bytes received but not yet consumed as a frame.
    pub fn buffered(&self) -> usize {
        self.recv.len()
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Read timeouts surface as `WouldBlock` on Unix and `TimedOut` on Windows.
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

impl FrameReader<AnswerStream> {
    /// Wrap a TCP stream, applying `config.read_timeout` to the socket.
    pub fn with_config_stream(inner: AnswerStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
