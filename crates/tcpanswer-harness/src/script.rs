use bytes::Bytes;
use tcpanswer_frame::{ECHO, EXIT, UNKNOWN};

use crate::error::ScriptError;

/// What a step expects back after sending its command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// One reply frame carrying this command code.
    Reply(u16),
    /// The server closes the connection without replying.
    Close,
}

/// One request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub command: u16,
    pub payload: Bytes,
    pub expect: Expectation,
}

impl Step {
    pub fn new(command: u16, expect: Expectation) -> Self {
        Self {
            command,
            payload: Bytes::new(),
            expect,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }
}

/// An ordered list of exchanges run over one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    /// Build a script. [`Expectation::Close`] is only allowed on the last step.
    pub fn new(steps: Vec<Step>) -> Result<Self, ScriptError> {
        if let Some(index) = steps
            .iter()
            .position(|step| step.expect == Expectation::Close)
        {
            if index + 1 != steps.len() {
                return Err(ScriptError::CloseNotLast { index });
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for Script {
    /// Echo, then a command the server must not recognize, then Exit.
    fn default() -> Self {
        Self {
            steps: vec![
                Step::new(ECHO, Expectation::Reply(ECHO)),
                Step::new(EXIT + 100, Expectation::Reply(UNKNOWN)),
                Step::new(EXIT, Expectation::Close),
            ],
        }
    }
}
