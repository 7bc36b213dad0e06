//! In-memory server stand-in for session and coordinator tests.
//!
//! Each connection is a pair of handles over one shared buffer. Writes are
//! decoded and answered immediately, so a read that follows a write always
//! finds its reply without threads or sockets.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use tcpanswer_frame::{
    decode_frame, encode_command, encode_frame, FrameReader, FrameWriter, ECHO, EXIT,
    MAX_FRAME_LEN, UNKNOWN,
};
use tcpanswer_transport::TransportError;

use crate::connector::Connector;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Correct,
    /// Correct answers, delivered at most this many bytes per read.
    Fragmented(usize),
    RefuseConnect,
    /// Answers Echo with the Exit code.
    WrongEcho,
    /// Echoes unknown commands instead of labelling them 666.
    EchoUnknown,
    /// Sends a frame after Exit instead of closing.
    ReplyToExit,
    /// Replies with a corrupted magic flag.
    BadFlag,
    /// Closes before answering anything.
    CloseImmediately,
    PanicOnConnect,
}

pub(crate) struct MockConnector {
    default: Behavior,
    overrides: Vec<(usize, Behavior)>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub(crate) fn new(default: Behavior) -> Self {
        Self {
            default,
            overrides: Vec::new(),
            connects: AtomicUsize::new(0),
        }
    }

    /// Use `behavior` for the listed sessions only.
    pub(crate) fn with_override(mut self, sessions: &[usize], behavior: Behavior) -> Self {
        self.overrides
            .extend(sessions.iter().map(|&session| (session, behavior)));
        self
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, session: usize) -> Behavior {
        self.overrides
            .iter()
            .find(|(id, _)| *id == session)
            .map(|(_, behavior)| *behavior)
            .unwrap_or(self.default)
    }
}

impl Connector for MockConnector {
    type Reader = MockStream;
    type Writer = MockStream;

    fn connect(
        &self,
        session: usize,
    ) -> Result<(FrameReader<MockStream>, FrameWriter<MockStream>)> {
        let behavior = self.behavior_for(session);
        match behavior {
            Behavior::RefuseConnect => {
                return Err(TransportError::Connect {
                    addr: ([127, 0, 0, 1], 1102).into(),
                    source: std::io::Error::from(ErrorKind::ConnectionRefused),
                }
                .into());
            }
            Behavior::PanicOnConnect => panic!("mock connector told to panic"),
            _ => {}
        }
        self.connects.fetch_add(1, Ordering::SeqCst);

        let stream = MockStream::new(behavior);
        Ok((FrameReader::new(stream.clone()), FrameWriter::new(stream)))
    }
}

#[derive(Clone)]
pub(crate) struct MockStream {
    inner: Arc<Mutex<MockInner>>,
}

struct MockInner {
    behavior: Behavior,
    received: BytesMut,
    pending: VecDeque<u8>,
    closed: bool,
}

impl MockStream {
    fn new(behavior: Behavior) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                behavior,
                received: BytesMut::new(),
                pending: VecDeque::new(),
                closed: behavior == Behavior::CloseImmediately,
            })),
        }
    }
}

impl MockInner {
    fn answer(&mut self) {
        while let Ok(Some(frame)) = decode_frame(&mut self.received, MAX_FRAME_LEN) {
            let mut out = BytesMut::new();
            let reply = match (frame.command(), self.behavior) {
                (ECHO, Behavior::WrongEcho) => Some(EXIT),
                (ECHO, _) => Some(ECHO),
                (EXIT, Behavior::ReplyToExit) => Some(ECHO),
                (EXIT, _) => None,
                (other, Behavior::EchoUnknown) => Some(other),
                (_, _) => Some(UNKNOWN),
            };

            match reply {
                Some(command) if self.behavior == Behavior::BadFlag => {
                    out.extend_from_slice(&[0xFF, 0xFF, 0x06, 0x00]);
                    out.extend_from_slice(&command.to_le_bytes());
                }
                Some(command) if command == frame.command() => {
                    let _ = encode_frame(command, frame.payload().as_ref(), &mut out);
                }
                Some(command) => encode_command(command, &mut out),
                None => self.closed = true,
            }
            self.pending.extend(out.iter().copied());
        }
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| std::io::Error::other("mock poisoned"))?;

        if inner.pending.is_empty() {
            if inner.closed {
                return Ok(0);
            }
            return Err(std::io::Error::from(ErrorKind::WouldBlock));
        }

        let limit = match inner.behavior {
            Behavior::Fragmented(n) => n.max(1),
            _ => usize::MAX,
        };
        let n = buf.len().min(limit).min(inner.pending.len());
        for slot in buf.iter_mut().take(n) {
            *slot = inner.pending.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| std::io::Error::other("mock poisoned"))?;
        // Like TCP, writes after the peer closed are accepted and discarded.
        if inner.closed {
            return Ok(buf.len());
        }
        inner.received.extend_from_slice(buf);
        inner.answer();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
