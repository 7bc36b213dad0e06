use tcpanswer_transport::TransportError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header does not start with the protocol magic.
    #[error("bad header flag (got {0}, expected 1102)")]
    BadHeaderFlag(u16),

    /// The declared frame length is smaller than the header itself.
    #[error("bad header length ({0} bytes, minimum 6)")]
    BadHeaderLength(u16),

    /// The frame exceeds the configured or representable maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for framing violations that mean the byte stream is unusable.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            FrameError::BadHeaderFlag(_)
                | FrameError::BadHeaderLength(_)
                | FrameError::FrameTooLarge { .. }
        )
    }
}

impl From<TransportError> for FrameError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                FrameError::Io(source)
            }
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
