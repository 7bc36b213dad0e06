//! Concurrent session harness for tcpanswer servers.
//!
//! A [`Session`] runs a fixed [`Script`] of request/response exchanges over one
//! connection. A [`Coordinator`] fans out many sessions at once and joins on
//! exactly one completion signal per session. [`AnswerServer`] is a reference
//! server that answers the protocol correctly, for local runs and tests.

#[cfg(feature = "async")]
pub mod async_session;
pub mod connector;
pub mod coordinator;
pub mod error;
pub mod script;
pub mod server;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(feature = "async")]
pub use async_session::run_session_async;
pub use connector::{Connector, TcpConnector};
pub use coordinator::{
    Completion, Coordinator, CoordinatorConfig, FailurePolicy, RunReport, SessionFailure,
};
pub use error::{FailureKind, HarnessError, Result, ScriptError, SessionError};
pub use script::{Expectation, Script, Step};
pub use server::{AnswerServer, ServerConfig, ServerHandle};
pub use session::{Outcome, Session, SessionState};
