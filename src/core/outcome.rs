//! # Sticky run outcome.
//!
//! Correlates the child's state notifications (and supervisor-side failures)
//! into one [`RunOutcome`].
//!
//! ```text
//! Pending ──browserStarted──► Started ──browserFinished──► Finished{success, message}
//!    │                           │
//!    └──────── failure ──────────┴──────────────────────► Failed(cause)
//! ```
//!
//! ## Rules
//! - The first terminal state wins; later notifications are logged and ignored.
//! - A repeated `browserStarted` is an anomaly and is ignored.
//! - Readers can await a state through [`OutcomeTracker::wait_for`].

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{ProtocolError, RunError};
use crate::protocol::ChildState;

/// Why a run failed outside of the child's own `browserFinished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The child reported `browserFailed`.
    BrowserFailed(String),
    /// The child exited without a terminal state (exit code if any).
    ChildExited(Option<i32>),
    /// No `browserStarted` within the configured startup timeout.
    StartupTimeout(Duration),
    /// The child wrote a JSON frame the host does not understand.
    ProtocolViolation(String),
    /// The host aborted the run (step failure, protocol error, signal).
    Aborted(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::BrowserFailed(e) => write!(f, "browser failed: {e}"),
            FailureCause::ChildExited(Some(code)) => {
                write!(f, "sandbox exited with code {code} before finishing")
            }
            FailureCause::ChildExited(None) => write!(f, "sandbox was terminated before finishing"),
            FailureCause::StartupTimeout(d) => write!(f, "sandbox did not start within {d:?}"),
            FailureCause::ProtocolViolation(why) => write!(f, "protocol violation: {why}"),
            FailureCause::Aborted(why) => write!(f, "run aborted: {why}"),
        }
    }
}

/// State of a supervised run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunOutcome {
    #[default]
    Pending,
    Started { url: Option<String> },
    Finished { success: bool, message: String },
    Failed(FailureCause),
}

impl RunOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunOutcome::Finished { .. } | RunOutcome::Failed(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Finished { success: true, .. })
    }

    /// `Ok(message)` for a successful finish, the matching [`RunError`] otherwise.
    ///
    /// Non-terminal outcomes are reported as a child failure.
    pub fn into_result(self) -> Result<String, RunError> {
        match self {
            RunOutcome::Finished { success: true, message } => Ok(message),
            RunOutcome::Finished { success: false, message } => {
                Err(RunError::ChildProcessFailure(message))
            }
            RunOutcome::Failed(FailureCause::StartupTimeout(d)) => Err(RunError::StartupTimeout(d)),
            RunOutcome::Failed(FailureCause::ProtocolViolation(why)) => {
                Err(RunError::Protocol(ProtocolError::Violation(why)))
            }
            RunOutcome::Failed(cause) => Err(RunError::ChildProcessFailure(cause.to_string())),
            RunOutcome::Pending | RunOutcome::Started { .. } => {
                Err(RunError::ChildProcessFailure("run did not finish".into()))
            }
        }
    }
}

/// Thread-safe holder of the current [`RunOutcome`].
pub struct OutcomeTracker {
    tx: watch::Sender<RunOutcome>,
}

impl OutcomeTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(RunOutcome::Pending);
        Self { tx }
    }

    pub fn current(&self) -> RunOutcome {
        self.tx.borrow().clone()
    }

    /// Applies a child notification. Returns `true` if the outcome changed.
    pub fn apply(&self, state: &ChildState) -> bool {
        let next = match state {
            ChildState::BrowserStarted { url } => RunOutcome::Started { url: url.clone() },
            ChildState::BrowserFinished { message, success } => RunOutcome::Finished {
                success: *success,
                message: message.clone(),
            },
            ChildState::BrowserFailed { error } => {
                RunOutcome::Failed(FailureCause::BrowserFailed(error.clone()))
            }
        };
        self.transition(next)
    }

    /// Records a supervisor-side failure. Returns `true` if it became the outcome.
    pub fn fail(&self, cause: FailureCause) -> bool {
        self.transition(RunOutcome::Failed(cause))
    }

    /// Fails with `StartupTimeout` only if the child never started.
    pub fn expire_startup(&self, after: Duration) -> bool {
        self.tx.send_if_modified(|current| {
            if *current != RunOutcome::Pending {
                return false;
            }
            warn!(?after, "startup timeout");
            *current = RunOutcome::Failed(FailureCause::StartupTimeout(after));
            true
        })
    }

    /// Waits until `pred` holds for the outcome and returns it.
    pub async fn wait_for(&self, pred: impl FnMut(&RunOutcome) -> bool) -> RunOutcome {
        let mut rx = self.tx.subscribe();
        let outcome = match rx.wait_for(pred).await {
            Ok(outcome) => outcome.clone(),
            // the sender lives in `self`
            Err(_) => self.current(),
        };
        outcome
    }

    fn transition(&self, next: RunOutcome) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_terminal() {
                warn!(current = ?current, ignored = ?next, "late notification after terminal state");
                return false;
            }
            if matches!((&*current, &next), (RunOutcome::Started { .. }, RunOutcome::Started { .. })) {
                warn!("duplicate browserStarted ignored");
                return false;
            }
            info!(from = ?current, to = ?next, "run outcome");
            *current = next;
            true
        })
    }
}

impl Default for OutcomeTracker {
    fn default() -> Self {
        Self::new()
    }
}
