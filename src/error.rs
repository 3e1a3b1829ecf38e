//! Error types used across the sandrun runtime.
//!
//! Errors are split by the layer that raises them:
//!
//! - [`CollectionError`]: container misuse (`InvalidValue`, `Underflow`).
//! - [`BusError`]: closed-vocabulary violations on an [`EventBus`](crate::EventBus).
//! - [`ProtocolError`]: malformed or unknown messages crossing the bridge.
//! - [`StepError`]: rejected step definitions.
//! - [`SandboxError`]: failures inside the sandboxed runner.
//! - [`RunError`]: run-level failures that terminate a test run.
//!
//! Container and bus errors are local to the calling operation. Protocol and
//! run errors end the run and are reported once through `testsuiteFinished`.
//! Nothing here is retried automatically.
//!
//! Every enum provides `as_label` (stable snake_case, for logs).

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the containers in [`collections`](crate::collections).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// Attempt to store an empty (null-like) value in a unique container.
    #[error("invalid value: cannot store an empty value")]
    InvalidValue,

    /// Dequeue on an empty mailbox outside the polling path.
    #[error("mailbox underflow")]
    Underflow,
}

impl CollectionError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use sandrun::CollectionError;
    ///
    /// assert_eq!(CollectionError::Underflow.as_label(), "mailbox_underflow");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CollectionError::InvalidValue => "invalid_value",
            CollectionError::Underflow => "mailbox_underflow",
        }
    }
}

/// # Errors produced by an event bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Dispatch or subscribe referenced a name outside the bus vocabulary.
    #[error("unknown event {event:?} on bus {owner:?}")]
    UnknownEvent {
        /// Owner label of the bus.
        owner: String,
        /// The rejected event name.
        event: String,
    },

    /// The vocabulary could not be updated.
    #[error("invalid vocabulary: {0}")]
    Vocabulary(#[from] CollectionError),
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::UnknownEvent { .. } => "bus_unknown_event",
            BusError::Vocabulary(_) => "bus_invalid_vocabulary",
        }
    }
}

/// # Errors raised while decoding bridge and control messages.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Message missing a required discriminator or carrying an unknown type.
    #[error("protocol violation: {0}")]
    Violation(String),

    /// Payload could not be (de)serialized.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProtocolError::Violation(_) => "protocol_violation",
            ProtocolError::Json(_) => "protocol_json",
        }
    }
}

/// # Errors raised when registering step definitions.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StepError {
    /// The step pattern is not a valid regular expression.
    #[error("invalid step pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The handler descriptor has the wrong shape.
    #[error("invalid step descriptor: {0}")]
    InvalidDescriptor(String),
}

impl StepError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StepError::InvalidPattern { .. } => "step_invalid_pattern",
            StepError::InvalidDescriptor(_) => "step_invalid_descriptor",
        }
    }
}

/// # Errors produced inside the sandboxed runner.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SandboxError {
    /// A sandbox option value appeared without a preceding `--name`.
    #[error("unassigned command line parameter: {0:?}")]
    UnassignedParameter(String),

    /// `run` was requested before any `open`.
    #[error("run requested before a target url was opened")]
    NotOpened,

    /// The rendering engine reported a failure.
    #[error("renderer failure: {0}")]
    Renderer(String),

    /// A script in the page threw and nothing caught it.
    #[error("JavaScript execution error: {0}")]
    Script(String),

    /// The host callback channel is gone or broken.
    #[error("host callback failed: {0}")]
    Callback(String),

    /// A script path could not be added to the inject list.
    #[error("invalid inject file: {0}")]
    Inject(#[from] CollectionError),

    /// An incoming message was not understood.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl SandboxError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SandboxError::UnassignedParameter(_) => "sandbox_unassigned_parameter",
            SandboxError::NotOpened => "sandbox_not_opened",
            SandboxError::Renderer(_) => "sandbox_renderer",
            SandboxError::Script(_) => "sandbox_script",
            SandboxError::Callback(_) => "sandbox_callback",
            SandboxError::Inject(_) => "sandbox_inject",
            SandboxError::Protocol(_) => "sandbox_protocol",
        }
    }
}

/// # Errors that terminate a test run.
///
/// `StepFailure` aborts remaining steps, scenarios and features.
/// `ChildProcessFailure` and `StartupTimeout` come from the supervised sandbox.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunError {
    /// A step's completion reported failure (or never fired).
    #[error("step failed: {step:?}: {reason}")]
    StepFailure {
        /// Raw step text.
        step: String,
        /// Failure reason reported by the interpreter.
        reason: String,
    },

    /// The sandboxed process reported `browserFailed` or exited abnormally.
    #[error("sandbox process failed: {0}")]
    ChildProcessFailure(String),

    /// The sandboxed process never confirmed startup.
    #[error("sandbox did not start within {0:?}")]
    StartupTimeout(Duration),

    /// A bridge message violated the protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lifecycle dispatch referenced an unknown event.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Spawning or talking to the child process failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use sandrun::RunError;
    /// use std::time::Duration;
    ///
    /// let err = RunError::StartupTimeout(Duration::from_secs(1));
    /// assert_eq!(err.as_label(), "run_startup_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RunError::StepFailure { .. } => "run_step_failure",
            RunError::ChildProcessFailure(_) => "run_child_failure",
            RunError::StartupTimeout(_) => "run_startup_timeout",
            RunError::Protocol(_) => "run_protocol",
            RunError::Bus(_) => "run_bus",
            RunError::Io(_) => "run_io",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RunError::StepFailure { step, reason } => format!("step {step:?}: {reason}"),
            RunError::ChildProcessFailure(cause) => format!("sandbox: {cause}"),
            RunError::StartupTimeout(d) => format!("startup timeout: {d:?}"),
            other => other.to_string(),
        }
    }

    /// Indicates whether the error was caused by the test itself
    /// rather than by the runner infrastructure.
    pub fn is_test_failure(&self) -> bool {
        matches!(self, RunError::StepFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(CollectionError::InvalidValue.as_label(), "invalid_value");
        let e = BusError::UnknownEvent {
            owner: "public-api".into(),
            event: "nope".into(),
        };
        assert_eq!(e.as_label(), "bus_unknown_event");
        assert_eq!(
            SandboxError::UnassignedParameter("x".into()).as_label(),
            "sandbox_unassigned_parameter"
        );
    }

    #[test]
    fn step_failure_is_test_failure() {
        let e = RunError::StepFailure {
            step: "click enter".into(),
            reason: "no handler".into(),
        };
        assert!(e.is_test_failure());
        assert!(e.as_message().contains("click enter"));
        assert!(!RunError::ChildProcessFailure("boom".into()).is_test_failure());
    }
}
