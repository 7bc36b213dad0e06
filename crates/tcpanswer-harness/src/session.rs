use std::sync::Arc;

use tcpanswer_frame::{FrameReader, FrameWriter};
use tracing::{debug, trace};

use crate::connector::Connector;
use crate::error::{Result, SessionError};
use crate::script::{Expectation, Script, Step};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

/// Where a session is in its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection yet.
    Connecting,
    /// Connected; the next exchange to run is the script step at this index.
    Exchanging(usize),
    /// Connection released. Terminal.
    Closed(Outcome),
}

type Link<C> = (
    FrameReader<<C as Connector>::Reader>,
    FrameWriter<<C as Connector>::Writer>,
);

/// One scripted conversation over one connection.
///
/// The session exclusively owns its connection and receive buffer; both are
/// dropped as soon as the session reaches [`SessionState::Closed`].
pub struct Session<C: Connector> {
    id: usize,
    connector: Arc<C>,
    script: Arc<Script>,
    state: SessionState,
    link: Option<Link<C>>,
}

impl<C: Connector> Session<C> {
    pub fn new(id: usize, connector: Arc<C>, script: Arc<Script>) -> Self {
        Self {
            id,
            connector,
            script,
            state: SessionState::Connecting,
            link: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Advance by one transition and return the new state.
    ///
    /// Any error moves the session to `Closed(Error)` and releases the
    /// connection. Calling `step` on a closed session is a no-op.
    pub fn step(&mut self) -> Result<SessionState> {
        let next = match self.state {
            SessionState::Connecting => self.connect(),
            SessionState::Exchanging(index) => self.exchange(index),
            SessionState::Closed(_) => return Ok(self.state),
        };

        match next {
            Ok(state) => {
                trace!(session = self.id, from = ?self.state, to = ?state, "session transition");
                self.state = state;
                if let SessionState::Closed(_) = state {
                    self.link = None;
                }
                Ok(state)
            }
            Err(err) => {
                debug!(session = self.id, state = ?self.state, error = %err, "session failed");
                self.state = SessionState::Closed(Outcome::Error);
                self.link = None;
                Err(err)
            }
        }
    }

    /// Run every remaining transition until the session closes.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if let SessionState::Closed(_) = self.step()? {
                return Ok(());
            }
        }
    }

    fn connect(&mut self) -> Result<SessionState> {
        self.link = Some(self.connector.connect(self.id)?);
        Ok(SessionState::Exchanging(0))
    }

    fn exchange(&mut self, index: usize) -> Result<SessionState> {
        let Some(step) = self.script.steps().get(index) else {
            return Ok(SessionState::Closed(Outcome::Success));
        };
        let Some((reader, writer)) = self.link.as_mut() else {
            return Err(SessionError::Frame(
                tcpanswer_frame::FrameError::ConnectionClosed,
            ));
        };

        send_step(writer, step)?;

        match step.expect {
            Expectation::Reply(expected) => {
                let frame = reader.read_frame()?;
                if frame.command() != expected {
                    return Err(SessionError::UnexpectedReply {
                        step: index,
                        expected,
                        actual: frame.command(),
                    });
                }
                if index + 1 == self.script.len() {
                    Ok(SessionState::Closed(Outcome::Success))
                } else {
                    Ok(SessionState::Exchanging(index + 1))
                }
            }
            Expectation::Close => {
                if !reader.wait_closed()? {
                    return Err(SessionError::UnexpectedResponseToExit { step: index });
                }
                Ok(SessionState::Closed(Outcome::Success))
            }
        }
    }
}

fn send_step<W: std::io::Write>(writer: &mut FrameWriter<W>, step: &Step) -> Result<()> {
    if step.payload.is_empty() {
        writer.send_command(step.command)?;
    } else {
        writer.send(step.command, step.payload.as_ref())?;
    }
    Ok(())
}

/// Connect and run the whole script for one session.
pub fn run_session<C: Connector>(id: usize, connector: Arc<C>, script: Arc<Script>) -> Result<()> {
    Session::new(id, connector, script).run()
}
