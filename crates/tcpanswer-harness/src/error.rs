use tcpanswer_frame::FrameError;
use tcpanswer_transport::TransportError;

/// Errors that end a single session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Connect or socket setup failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Reading or writing frames failed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The reply carried a different command code than the step expects.
    #[error("step {step}: expected reply command {expected}, got {actual}")]
    UnexpectedReply { step: usize, expected: u16, actual: u16 },

    /// Bytes arrived after Exit instead of the connection closing.
    #[error("step {step}: unexpected response to exit")]
    UnexpectedResponseToExit { step: usize },

    /// The session thread could not be started.
    #[error("failed to spawn session: {0}")]
    Spawn(std::io::Error),

    /// The session panicked before reporting a result.
    #[error("session panicked")]
    Panicked,
}

/// Coarse classification of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Connect, read or write failure.
    Transport,
    /// Bad magic, bad length or oversized frame.
    Protocol,
    /// The server answered, but not as expected.
    Assertion,
    /// Harness-side failure (spawn, panic).
    Internal,
}

impl SessionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SessionError::Transport(_) => FailureKind::Transport,
            SessionError::Frame(err) if err.is_protocol() => FailureKind::Protocol,
            SessionError::Frame(_) => FailureKind::Transport,
            SessionError::UnexpectedReply { .. } | SessionError::UnexpectedResponseToExit { .. } => {
                FailureKind::Assertion
            }
            SessionError::Spawn(_) | SessionError::Panicked => FailureKind::Internal,
        }
    }
}

/// Errors building a [`Script`](crate::Script).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScriptError {
    /// A close expectation ends the connection, so nothing may follow it.
    #[error("step {index} expects the connection to close but is not the last step")]
    CloseNotLast { index: usize },
}

/// Errors that end a whole run.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// A session failed under [`FailurePolicy::Abort`](crate::FailurePolicy::Abort).
    #[error("run aborted: session {session} failed: {source}")]
    Aborted {
        session: usize,
        #[source]
        source: SessionError,
    },

    /// Every sender went away before all signals arrived.
    #[error("completion channel closed after {received} of {expected} signals")]
    SignalLost { expected: usize, received: usize },
}

pub type Result<T> = std::result::Result<T, SessionError>;
