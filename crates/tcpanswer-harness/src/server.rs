use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tcpanswer_frame::{
    command_name, is_timeout, FrameConfig, FrameError, FrameReader, FrameWriter, ECHO, EXIT,
    UNKNOWN,
};
use tcpanswer_transport::{AnswerStream, Result, TcpTransport, TransportError};
use tracing::{debug, info, warn};

/// Configuration for [`AnswerServer`].
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Close connections that send nothing for this long. Default: never.
    pub idle_timeout: Option<Duration>,
    /// Frame limits applied to every connection.
    pub frame: FrameConfig,
}

/// Why a served connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hangup {
    /// The client sent Exit.
    Exit,
    /// The client closed the connection.
    PeerClosed,
    /// Nothing arrived within the idle timeout.
    Idle,
}

/// Reference server answering the tcpanswer protocol.
///
/// Echo is answered with the same command and payload, Exit closes the
/// connection without a reply, and every other command is answered with
/// [`UNKNOWN`]. Each accepted connection is served on its own thread.
pub struct AnswerServer {
    transport: TcpTransport,
    config: ServerConfig,
    next_session: AtomicU64,
}

impl AnswerServer {
    /// Bind to `addr` (`ip:port`, `host:port` or `:port`).
    pub fn bind(addr: &str, config: ServerConfig) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        Ok(Self {
            transport,
            config,
            next_session: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accept one connection and serve it on a new thread.
    pub fn accept_one(&self) -> Result<JoinHandle<()>> {
        let stream = self.transport.accept()?;
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let config = self.config.clone();

        thread::Builder::new()
            .name(format!("answer-{session}"))
            .spawn(move || serve_connection(session, stream, &config))
            .map_err(TransportError::Io)
    }

    /// Accept connections until `running` is cleared.
    ///
    /// `accept` blocks, so whoever clears the flag must also wake the
    /// listener with a connection (see [`ServerHandle::stop`]).
    pub fn serve(&self, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            match self.accept_one() {
                Ok(_) => {}
                Err(TransportError::Accept(err)) if is_transient_accept(&err) => {
                    warn!(error = %err, "accept failed, continuing");
                }
                Err(err) => return Err(err),
            }
        }
        info!(addr = %self.local_addr(), "answer server stopped");
        Ok(())
    }

    /// Serve on a background thread until the returned handle is stopped.
    pub fn spawn(self) -> Result<ServerHandle> {
        let addr = self.local_addr();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("answer-server".to_string())
            .spawn(move || {
                if let Err(err) = self.serve(&flag) {
                    warn!(error = %err, "answer server failed");
                }
            })
            .map_err(TransportError::Io)?;

        Ok(ServerHandle {
            addr,
            running,
            thread: Some(thread),
        })
    }
}

/// Handle to an [`AnswerServer`] running on a background thread.
pub struct ServerHandle {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and wait for the accept loop to exit.
    /// Connections already being served run to completion.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        wake_listener(&self.running, self.addr);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Clear `running` and unblock an accept loop listening on `addr`.
pub fn wake_listener(running: &AtomicBool, addr: SocketAddr) {
    running.store(false, Ordering::SeqCst);
    let _ = TcpTransport::connect(wake_addr(addr));
}

fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}

fn is_transient_accept(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}

fn serve_connection(session: u64, stream: AnswerStream, config: &ServerConfig) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(session, %peer, "session opened");

    let frame_config = FrameConfig {
        read_timeout: config.idle_timeout,
        ..config.frame.clone()
    };
    let halves = stream.try_clone().map_err(FrameError::from).and_then(|reader| {
        let reader = FrameReader::with_config_stream(reader, frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream, frame_config)?;
        Ok((reader, writer))
    });

    let result = halves.and_then(|(mut reader, mut writer)| {
        let hangup = answer(&mut reader, &mut writer);
        writer.get_ref().shutdown();
        hangup
    });

    match result {
        Ok(hangup) => info!(session, %peer, ?hangup, "session closed"),
        Err(err) => warn!(session, %peer, error = %err, "session closed on error"),
    }
}

/// Answer frames until the client exits, hangs up or goes idle.
pub(crate) fn answer<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
) -> std::result::Result<Hangup, FrameError> {
    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => return Ok(Hangup::PeerClosed),
            Err(FrameError::Io(err)) if is_timeout(&err) => return Ok(Hangup::Idle),
            Err(err) => return Err(err),
        };

        debug!(
            command = frame.command(),
            name = command_name(frame.command()),
            length = frame.length(),
            "answering frame"
        );

        match frame.command() {
            ECHO => writer.write_frame(&frame)?,
            EXIT => return Ok(Hangup::Exit),
            _ => writer.send_command(UNKNOWN)?,
        }
    }
}
