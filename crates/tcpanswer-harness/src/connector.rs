use std::io::{Read, Write};
use std::net::SocketAddr;

use tcpanswer_frame::{FrameConfig, FrameReader, FrameWriter};
use tcpanswer_transport::{resolve_addr, AnswerStream, TcpTransport};

use crate::error::Result;

/// Opens the connection a session runs over.
///
/// The coordinator shares one connector between all sessions, so it must be
/// usable from many threads at once.
pub trait Connector: Send + Sync {
    type Reader: Read + Send;
    type Writer: Write + Send;

    /// Connect on behalf of `session`, returning the framed read and write halves.
    fn connect(
        &self,
        session: usize,
    ) -> Result<(FrameReader<Self::Reader>, FrameWriter<Self::Writer>)>;
}

/// Connects every session to one fixed TCP address.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: SocketAddr,
    frame_config: FrameConfig,
}

impl TcpConnector {
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_config(addr, FrameConfig::default())
    }

    pub fn with_config(addr: SocketAddr, frame_config: FrameConfig) -> Self {
        Self { addr, frame_config }
    }

    /// Resolve `addr` once up front; see [`resolve_addr`].
    pub fn resolve(addr: &str, frame_config: FrameConfig) -> Result<Self> {
        Ok(Self::with_config(resolve_addr(addr)?, frame_config))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn frame_config(&self) -> &FrameConfig {
        &self.frame_config
    }
}

impl Connector for TcpConnector {
    type Reader = AnswerStream;
    type Writer = AnswerStream;

    fn connect(
        &self,
        _session: usize,
    ) -> Result<(FrameReader<AnswerStream>, FrameWriter<AnswerStream>)> {
        let stream = TcpTransport::connect(self.addr)?;
        let reader_stream = stream.try_clone()?;

        let reader = FrameReader::with_config_stream(reader_stream, self.frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream, self.frame_config.clone())?;
        Ok((reader, writer))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tcpanswer_frame::ECHO;
    use tcpanswer_transport::TransportError;

    use super::*;
    use crate::error::SessionError;

    #[test]
    fn connect_yields_working_halves() {
        let transport = TcpTransport::bind("127.0.0.1:0").unwrap();
        let connector = TcpConnector::new(transport.local_addr());

        let server = thread::spawn(move || {
            let stream = transport.accept().unwrap();
            let mut reader = FrameReader::new(stream.try_clone().unwrap());
            let mut writer = FrameWriter::new(stream);
            let frame = reader.read_frame().unwrap();
            writer.write_frame(&frame).unwrap();
        });

        let (mut reader, mut writer) = connector.connect(0).unwrap();
        writer.send_command(ECHO).unwrap();
        assert_eq!(reader.read_frame().unwrap().command(), ECHO);
        server.join().unwrap();
    }

    #[test]
    fn refused_connect_is_transport_error() {
        let addr = TcpTransport::bind("127.0.0.1:0").unwrap().local_addr();
        let connector = TcpConnector::new(addr);

        let err = connector.connect(3).err().unwrap();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Connect { .. })
        ));
    }

    #[test]
    fn resolve_rejects_bad_address() {
        let err = TcpConnector::resolve("not an address", FrameConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::InvalidAddress(_))
        ));
    }
}
