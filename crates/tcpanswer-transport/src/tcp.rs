use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info};

use crate::addr::resolve_addr;
use crate::error::{Result, TransportError};
use crate::stream::AnswerStream;

/// TCP listener for tcpanswer sessions.
///
/// Provides blocking bind/accept/connect. Accepted and connected streams have
/// Nagle disabled since every exchange is a handful of bytes.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr` (see [`resolve_addr`] for accepted forms).
    pub fn bind(addr: &str) -> Result<Self> {
        let addr = resolve_addr(addr)?;
        Self::bind_addr(addr)
    }

    /// Bind and listen on an already-resolved address.
    pub fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<AnswerStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        let _ = stream.set_nodelay(true);
        debug!(%peer, "accepted connection");
        Ok(AnswerStream::from_tcp(stream))
    }

    /// Connect to a listening tcpanswer server (blocking).
    pub fn connect(addr: SocketAddr) -> Result<AnswerStream> {
        let stream =
            TcpStream::connect(addr).map_err(|source| TransportError::Connect { addr, source })?;
        let _ = stream.set_nodelay(true);
        debug!(%addr, "connected");
        Ok(AnswerStream::from_tcp(stream))
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use std::io::{ErrorKind, Read, Write};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn bind_accept_connect_roundtrip() {
        let transport = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = transport.local_addr();
        assert_ne!(addr.port(), 0);

        let server = thread::spawn(move || {
            let mut stream = transport.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let mut client = TcpTransport::connect(addr).unwrap();
        client.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        server.join().unwrap();
    }

    #[test]
    fn connect_refused_is_connect_error() {
        // Bind then drop to get a port nobody is listening on.
        let addr = TcpTransport::bind("127.0.0.1:0").unwrap().local_addr();

        let err = TcpTransport::connect(addr).unwrap_err();
        match err {
            TransportError::Connect { addr: failed, source } => {
                assert_eq!(failed, addr);
                assert_eq!(source.kind(), ErrorKind::ConnectionRefused);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bind_rejects_invalid_address() {
        let err = TcpTransport::bind("nonsense").err().unwrap();
        assert!(matches!(err, TransportError::InvalidAddress(_)));
    }

    #[test]
    fn bind_twice_is_bind_error() {
        let first = TcpTransport::bind("127.0.0.1:0").unwrap();
        let err = TcpTransport::bind_addr(first.local_addr()).err().unwrap();
        assert!(matches!(err, TransportError::Bind { .. }));
    }

    #[test]
    fn read_timeout_applies() {
        let transport = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = transport.local_addr();
        let server = thread::spawn(move || transport.accept().unwrap());

        let mut client = TcpTransport::connect(addr).unwrap();
        let _held = server.join().unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut buf = [0u8; 1];
        let err = client.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::WouldBlock | ErrorKind::TimedOut
        ));
    }

    #[test]
    fn shutdown_signals_eof_to_peer() {
        let transport = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = transport.local_addr();
        let server = thread::spawn(move || {
            let stream = transport.accept().unwrap();
            stream.shutdown();
        });

        let mut client = TcpTransport::connect(addr).unwrap();
        server.join().unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn clone_shares_connection() {
        let transport = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = transport.local_addr();
        let server = thread::spawn(move || {
            let mut stream = transport.accept().unwrap();
            stream.write_all(b"x").unwrap();
        });

        let client = TcpTransport::connect(addr).unwrap();
        let mut reader = client.try_clone().unwrap();
        assert_eq!(client.peer_addr().unwrap(), addr);
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
        server.join().unwrap();
    }
}
