//! Supervision of the sandbox process.
//!
//! - [`config`]: run settings;
//! - [`supervisor`]: spawns the sandbox and pumps its stdio through the bridge;
//! - [`outcome`]: sticky run outcome correlated from child notifications;
//! - [`shutdown`]: termination signals that abort a run.

mod config;
mod outcome;
mod shutdown;
mod supervisor;

pub use config::Config;
pub use outcome::{FailureCause, OutcomeTracker, RunOutcome};
pub use supervisor::{RunReport, SupervisedRun, Supervisor};

#[cfg(all(test, unix))]
pub(crate) use supervisor::shell_config;
