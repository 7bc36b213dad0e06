use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::connector::Connector;
use crate::error::{FailureKind, HarnessError, SessionError};
use crate::script::Script;
use crate::session::run_session;

/// What the coordinator does when a session fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and keep waiting for the other sessions.
    #[default]
    Isolate,
    /// Stop waiting and fail the run on the first failed session.
    /// Sessions already in flight are left to finish on their own.
    Abort,
}

/// Configuration for one coordinated run.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Number of concurrent sessions. Default: 1000.
    pub sessions: usize,
    /// Default: [`FailurePolicy::Isolate`].
    pub policy: FailurePolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            sessions: 1000,
            policy: FailurePolicy::default(),
        }
    }
}

/// The one signal every session publishes when it ends.
#[derive(Debug)]
pub struct Completion {
    pub session: usize,
    pub result: Result<(), SessionError>,
}

/// A session that ended in error.
#[derive(Debug)]
pub struct SessionFailure {
    pub session: usize,
    pub error: SessionError,
}

/// Aggregated result of a run.
#[derive(Debug)]
pub struct RunReport {
    pub sessions: usize,
    pub succeeded: usize,
    /// Sorted by session id.
    pub failures: Vec<SessionFailure>,
    /// Wall-clock time from first spawn to last completion signal.
    pub elapsed: Duration,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures
            .iter()
            .filter(|failure| failure.error.kind() == kind)
            .count()
    }
}

pub(crate) trait CompletionSink {
    fn publish(&self, completion: Completion);
}

impl CompletionSink for mpsc::Sender<Completion> {
    fn publish(&self, completion: Completion) {
        // The receiver is gone only after an abort; nobody is listening then.
        let _ = self.send(completion);
    }
}

/// Publishes exactly one [`Completion`] when dropped, on every exit path.
///
/// If the session never called [`CompletionGuard::complete`] (it panicked),
/// the published result is [`SessionError::Panicked`].
pub(crate) struct CompletionGuard<S: CompletionSink> {
    session: usize,
    sink: S,
    result: Option<Result<(), SessionError>>,
}

impl<S: CompletionSink> CompletionGuard<S> {
    pub(crate) fn new(session: usize, sink: S) -> Self {
        Self {
            session,
            sink,
            result: None,
        }
    }

    pub(crate) fn complete(mut self, result: Result<(), SessionError>) {
        self.result = Some(result);
    }
}

impl<S: CompletionSink> Drop for CompletionGuard<S> {
    fn drop(&mut self) {
        let result = self.result.take().unwrap_or(Err(SessionError::Panicked));
        self.sink.publish(Completion {
            session: self.session,
            result,
        });
    }
}

/// Counts completion signals and applies the failure policy.
pub(crate) struct Tally {
    expected: usize,
    policy: FailurePolicy,
    received: usize,
    succeeded: usize,
    failures: Vec<SessionFailure>,
}

impl Tally {
    pub(crate) fn new(expected: usize, policy: FailurePolicy) -> Self {
        Self {
            expected,
            policy,
            received: 0,
            succeeded: 0,
            failures: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, completion: Completion) -> Result<(), HarnessError> {
        self.received += 1;
        match completion.result {
            Ok(()) => self.succeeded += 1,
            Err(error) => {
                warn!(session = completion.session, kind = ?error.kind(), %error, "session failed");
                if self.policy == FailurePolicy::Abort {
                    return Err(HarnessError::Aborted {
                        session: completion.session,
                        source: error,
                    });
                }
                self.failures.push(SessionFailure {
                    session: completion.session,
                    error,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn is_done(&self) -> bool {
        self.received >= self.expected
    }

    pub(crate) fn lost(&self) -> HarnessError {
        HarnessError::SignalLost {
            expected: self.expected,
            received: self.received,
        }
    }

    pub(crate) fn finish(mut self, elapsed: Duration) -> RunReport {
        self.failures.sort_by_key(|failure| failure.session);
        info!(
            sessions = self.expected,
            succeeded = self.succeeded,
            failed = self.failures.len(),
            ?elapsed,
            "run finished"
        );
        RunReport {
            sessions: self.expected,
            succeeded: self.succeeded,
            failures: self.failures,
            elapsed,
        }
    }
}

/// Fans out sessions and joins on their completion signals.
#[derive(Debug, Clone, Default)]
pub struct Coordinator {
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run `config.sessions` sessions, one thread each, and wait for all of them.
    ///
    /// Returns once exactly one completion signal per session has arrived,
    /// or on the first failure under [`FailurePolicy::Abort`].
    pub fn run<C>(&self, connector: Arc<C>, script: Arc<Script>) -> Result<RunReport, HarnessError>
    where
        C: Connector + 'static,
    {
        let sessions = self.config.sessions;
        info!(sessions, policy = ?self.config.policy, "run started");

        let start = Instant::now();
        let (tx, rx) = mpsc::channel::<Completion>();
        let mut tally = Tally::new(sessions, self.config.policy);

        for id in 0..sessions {
            let tx = tx.clone();
            let connector = Arc::clone(&connector);
            let script = Arc::clone(&script);

            let spawned = thread::Builder::new()
                .name(format!("session-{id}"))
                .spawn(move || {
                    let guard = CompletionGuard::new(id, tx);
                    guard.complete(run_session(id, connector, script));
                });

            if let Err(err) = spawned {
                tally.record(Completion {
                    session: id,
                    result: Err(SessionError::Spawn(err)),
                })?;
            }

            while let Ok(completion) = rx.try_recv() {
                tally.record(completion)?;
            }
        }
        drop(tx);

        while !tally.is_done() {
            match rx.recv() {
                Ok(completion) => tally.record(completion)?,
                Err(_) => return Err(tally.lost()),
            }
        }

        Ok(tally.finish(start.elapsed()))
    }
}
