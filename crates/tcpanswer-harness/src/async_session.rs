//! Tokio variant of the session runner and coordinator.
//!
//! Sessions run as tasks instead of threads, with the same scripts, the same
//! completion guard and the same failure policies as the blocking path.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tcpanswer_frame::{is_timeout, AnswerCodec, Frame, FrameConfig, FrameError};
use tcpanswer_transport::TransportError;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::coordinator::{
    Completion, CompletionGuard, CompletionSink, Coordinator, RunReport, Tally,
};
use crate::error::{HarnessError, Result, SessionError};
use crate::script::{Expectation, Script};

impl CompletionSink for mpsc::UnboundedSender<Completion> {
    fn publish(&self, completion: Completion) {
        let _ = self.send(completion);
    }
}

type AnswerFramed = Framed<TcpStream, AnswerCodec>;

/// Connect to `addr` and run the whole script for one session.
pub async fn run_session_async(
    id: usize,
    addr: SocketAddr,
    script: Arc<Script>,
    config: FrameConfig,
) -> Result<()> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| TransportError::Connect { addr, source })?;
    stream.set_nodelay(true).map_err(TransportError::Io)?;

    let codec = AnswerCodec::with_max_frame_len(config.max_frame_len);
    let mut framed = Framed::new(stream, codec);

    for (index, step) in script.steps().iter().enumerate() {
        if step.payload.is_empty() {
            framed.send(step.command).await?;
        } else {
            framed
                .send(Frame::new(step.command, step.payload.clone())?)
                .await?;
        }

        match step.expect {
            Expectation::Reply(expected) => {
                let frame = match next_frame(&mut framed, config.read_timeout).await {
                    Some(Ok(frame)) => frame,
                    Some(Err(err)) => return Err(err.into()),
                    None => return Err(FrameError::ConnectionClosed.into()),
                };
                if frame.command() != expected {
                    return Err(SessionError::UnexpectedReply {
                        step: index,
                        expected,
                        actual: frame.command(),
                    });
                }
            }
            Expectation::Close => {
                if !wait_closed(&mut framed, config.read_timeout).await? {
                    return Err(SessionError::UnexpectedResponseToExit { step: index });
                }
            }
        }
    }

    debug!(session = id, "session finished");
    Ok(())
}

async fn next_frame(
    framed: &mut AnswerFramed,
    timeout: Option<Duration>,
) -> Option<std::result::Result<Frame, FrameError>> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, framed.next()).await {
            Ok(next) => next,
            Err(_) => Some(Err(FrameError::Io(ErrorKind::TimedOut.into()))),
        },
        None => framed.next().await,
    }
}

/// After Exit: `Ok(true)` on EOF or a read error, `Ok(false)` as soon as a
/// single byte shows up, buffered or fresh. Hitting `timeout` is an error.
async fn wait_closed(
    framed: &mut AnswerFramed,
    timeout: Option<Duration>,
) -> std::result::Result<bool, FrameError> {
    if !framed.read_buffer().is_empty() {
        return Ok(false);
    }

    let mut byte = [0u8; 1];
    let read = framed.get_mut().read(&mut byte);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| FrameError::Io(ErrorKind::TimedOut.into()))?,
        None => read.await,
    };

    match result {
        Ok(0) => Ok(true),
        Ok(_) => Ok(false),
        Err(err) if is_timeout(&err) => Err(FrameError::Io(err)),
        Err(_) => Ok(true),
    }
}

impl Coordinator {
    /// Run `config.sessions` sessions as tokio tasks against `addr`.
    ///
    /// Same joining and failure-policy semantics as [`Coordinator::run`].
    pub async fn run_async(
        &self,
        addr: SocketAddr,
        script: Arc<Script>,
        frame_config: FrameConfig,
    ) -> std::result::Result<RunReport, HarnessError> {
        let sessions = self.config().sessions;
        let policy = self.config().policy;
        info!(sessions, ?policy, %addr, "async run started");

        let start = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
        let mut tally = Tally::new(sessions, policy);

        for id in 0..sessions {
            let guard = CompletionGuard::new(id, tx.clone());
            let script = Arc::clone(&script);
            let frame_config = frame_config.clone();
            tokio::spawn(async move {
                guard.complete(run_session_async(id, addr, script, frame_config).await);
            });
        }
        drop(tx);

        while !tally.is_done() {
            match rx.recv().await {
                Some(completion) => tally.record(completion)?,
                None => return Err(tally.lost()),
            }
        }

        Ok(tally.finish(start.elapsed()))
    }
}
