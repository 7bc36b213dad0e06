use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tcpanswer_transport::AnswerStream;

use crate::codec::{encode_command, encode_frame, Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Encodes frames into a scratch buffer and pushes each one out whole.
///
/// Every send is flushed before returning, so a request is on the wire by the
/// time the caller starts waiting for its reply.
pub struct FrameWriter<T> {
    inner: T,
    scratch: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            scratch: BytesMut::with_capacity(HEADER_SIZE),
            config,
        }
    }

    /// Re-send a decoded frame unchanged.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.command(), frame.payload().as_ref())
    }

    /// Send a bare 6-byte command frame.
    pub fn send_command(&mut self, command: u16) -> Result<()> {
        self.scratch.clear();
        encode_command(command, &mut self.scratch);
        self.push()
    }

    /// Send `command` with `payload`, enforcing the configured frame limit.
    pub fn send(&mut self, command: u16, payload: &[u8]) -> Result<()> {
        let max = self.config.max_frame_len;
        let size = HEADER_SIZE + payload.len();
        if size > max {
            return Err(FrameError::FrameTooLarge { size, max });
        }

        self.scratch.clear();
        encode_frame(command, payload, &mut self.scratch)?;
        self.push()
    }

    fn push(&mut self) -> Result<()> {
        let mut pending = &self.scratch[..];
        while !pending.is_empty() {
            match self.inner.write(pending) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => pending = &pending[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                other => return other.map_err(FrameError::from),
            }
        }
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

impl FrameWriter<AnswerStream> {
    /// Wrap a TCP stream, applying `config.write_timeout` to the socket.
    pub fn with_config_stream(inner: AnswerStream, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{decode_frame, Frame, MAX_FRAME_LEN};
    use crate::command::{ECHO, EXIT};
    use crate::reader::FrameReader;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.into_inner().into_inner().as_slice())
    }

    /// A sink that misbehaves in one scripted way.
    #[derive(Default)]
    struct Sink {
        fault: Option<Fault>,
        data: Vec<u8>,
        flushes: usize,
        interrupted: bool,
    }

    #[derive(Clone, Copy)]
    enum Fault {
        OneByteAtATime,
        InterruptOnce,
        BrokenPipe,
        WritesZero,
    }

    impl Sink {
        fn with(fault: Fault) -> Self {
            Self {
                fault: Some(fault),
                ..Self::default()
            }
        }
    }

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match self.fault {
                Some(Fault::OneByteAtATime) => {
                    self.data.push(buf[0]);
                    return Ok(1);
                }
                Some(Fault::InterruptOnce) if !self.interrupted => {
                    self.interrupted = true;
                    return Err(ErrorKind::Interrupted.into());
                }
                Some(Fault::BrokenPipe) => return Err(ErrorKind::BrokenPipe.into()),
                Some(Fault::WritesZero) => return Ok(0),
                _ => {}
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            if matches!(self.fault, Some(Fault::InterruptOnce)) && self.flushes == 1 {
                return Err(ErrorKind::Interrupted.into());
            }
            Ok(())
        }
    }

    #[test]
    fn send_command_writes_six_bytes() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send_command(EXIT + 100).unwrap();

        let wire = written(writer);
        assert_eq!(wire.as_ref(), &[0x4E, 0x04, 0x06, 0x00, 0x66, 0x00]);
    }

    #[test]
    fn consecutive_sends_stay_in_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send_command(ECHO).unwrap();
        writer.send(ECHO, b"body").unwrap();
        writer.send_command(EXIT).unwrap();

        let mut wire = written(writer);
        let mut next = || decode_frame(&mut wire, MAX_FRAME_LEN).unwrap().unwrap();
        assert_eq!(next(), Frame::command_only(ECHO));
        assert_eq!(next().payload().as_ref(), b"body");
        assert_eq!(next(), Frame::command_only(EXIT));
        assert!(wire.is_empty());
    }

    #[test]
    fn write_frame_resends_decoded_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        let frame = Frame::new(ECHO, "abc").unwrap();
        writer.write_frame(&frame).unwrap();

        let mut wire = written(writer);
        assert_eq!(decode_frame(&mut wire, MAX_FRAME_LEN).unwrap(), Some(frame));
    }

    #[test]
    fn frame_over_configured_max_rejected() {
        let cfg = FrameConfig {
            max_frame_len: 8,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::new()), cfg);

        let err = writer.send(ECHO, b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 15, max: 8 }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn every_send_is_flushed() {
        let mut writer = FrameWriter::new(Sink::default());
        writer.send_command(ECHO).unwrap();
        writer.send(ECHO, b"x").unwrap();
        assert_eq!(writer.get_ref().flushes, 2);
    }

    #[test]
    fn short_writes_are_completed() {
        let mut writer = FrameWriter::new(Sink::with(Fault::OneByteAtATime));
        writer.send(ECHO, b"abc").unwrap();

        let mut wire = BytesMut::from(writer.into_inner().data.as_slice());
        let frame = decode_frame(&mut wire, MAX_FRAME_LEN).unwrap().unwrap();
        assert_eq!(frame.payload().as_ref(), b"abc");
    }

    #[test]
    fn interrupted_write_and_flush_are_retried() {
        let mut writer = FrameWriter::new(Sink::with(Fault::InterruptOnce));
        writer.send_command(ECHO).unwrap();

        let sink = writer.into_inner();
        assert_eq!(sink.data.len(), 6);
        assert_eq!(sink.flushes, 2);
    }

    #[test]
    fn broken_pipe_is_io_error() {
        let mut writer = FrameWriter::new(Sink::with(Fault::BrokenPipe));
        let err = writer.send_command(ECHO).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut writer = FrameWriter::new(Sink::with(Fault::WritesZero));
        let err = writer.send_command(ECHO).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn reader_decodes_what_writer_wrote() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send(ECHO, b"z").unwrap();

        let mut reader = FrameReader::new(Cursor::new(writer.into_inner().into_inner()));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.command(), ECHO);
        assert_eq!(frame.payload().as_ref(), b"z");
    }
}
