use std::fmt;
use std::io;

use tcpanswer_frame::FrameError;
use tcpanswer_harness::{HarnessError, SessionError};
use tcpanswer_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::InvalidInput => USAGE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::InvalidAddress(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other if other.is_protocol() => {
            CliError::new(DATA_INVALID, format!("{context}: {other}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::UnexpectedReply { .. } | SessionError::UnexpectedResponseToExit { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        SessionError::Spawn(_) | SessionError::Panicked => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
    }
}

pub fn harness_error(context: &str, err: HarnessError) -> CliError {
    match err {
        HarnessError::Aborted { session, source } => {
            session_error(&format!("{context}: session {session} aborted the run"), source)
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_violations_are_data_invalid() {
        let err = frame_error("recv", FrameError::BadHeaderFlag(7));
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("recv: bad header flag"));
    }

    #[test]
    fn refused_connect_is_transport_error() {
        let err = session_error(
            "connect",
            SessionError::Transport(TransportError::Connect {
                addr: ([127, 0, 0, 1], 1102).into(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn read_timeout_maps_to_timeout() {
        let err = frame_error("recv", FrameError::Io(io::ErrorKind::WouldBlock.into()));
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn bad_address_is_usage() {
        let err = transport_error("bind", TransportError::InvalidAddress("x".into()));
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn abort_keeps_cause_code() {
        let err = harness_error(
            "run",
            HarnessError::Aborted {
                session: 4,
                source: SessionError::UnexpectedResponseToExit { step: 2 },
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.contains("session 4"));
    }
}
