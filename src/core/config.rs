//! # Run configuration.
//!
//! Provides [`Config`], the settings shared by the [`Supervisor`](crate::Supervisor),
//! the [`Executor`](crate::exec::Executor) and the [`Session`](crate::Session).
//!
//! ## Sentinel values
//! - `startup_timeout = 0s` → wait for `browserStarted` forever
//! - `step_timeout = 0s` → steps may take as long as they like
//! - `grace = 0s` → kill the child as soon as the outcome is terminal

use std::path::PathBuf;
use std::time::Duration;

/// Settings of one test run.
///
/// ## Field semantics
/// - `program`, `args`: the sandbox runner executable and its fixed arguments
/// - `poll_interval`: forwarded to the sandbox as `--pollInterval <ms>`
/// - `startup_timeout`: limit for the first `browserStarted` (`0s` = none)
/// - `step_timeout`: limit for one step's completion (`0s` = none)
/// - `grace`: how long the child may linger after a terminal outcome
/// - `open_delay`, `run_delay`: pauses before sending `open` and `run`
/// - `inject_files`: extra scripts sent with `open`, in order
/// - `start_url`: URL opened when no `given` step names one
#[derive(Clone, Debug)]
pub struct Config {
    /// Sandbox runner executable.
    pub program: PathBuf,

    /// Arguments always passed to `program`, before the sandbox options.
    pub args: Vec<String>,

    /// Interval between two sandbox polls.
    pub poll_interval: Duration,

    /// Maximum wait for `browserStarted`.
    ///
    /// - `Duration::ZERO` = no limit
    /// - `> 0` = the run fails with `StartupTimeout` and the child is killed
    pub startup_timeout: Duration,

    /// Maximum wait for one step's completion (`Duration::ZERO` = no limit).
    pub step_timeout: Duration,

    /// Maximum wait for the child to exit once the outcome is known.
    pub grace: Duration,

    /// Pause before `open` is sent.
    pub open_delay: Duration,

    /// Pause between `open` and `run`.
    pub run_delay: Duration,

    /// Extra scripts to inject, after the runner's built-in ones.
    pub inject_files: Vec<PathBuf>,

    /// URL used when no step sets one.
    pub start_url: String,
}

impl Config {
    /// Startup timeout as an `Option` (`None` = wait forever).
    #[inline]
    pub fn startup_timeout(&self) -> Option<Duration> {
        non_zero(self.startup_timeout)
    }

    /// Step timeout as an `Option` (`None` = no limit).
    #[inline]
    pub fn step_timeout(&self) -> Option<Duration> {
        non_zero(self.step_timeout)
    }

    /// Poll interval in whole milliseconds, at least 1.
    #[inline]
    pub fn poll_interval_ms(&self) -> u64 {
        u64::try_from(self.poll_interval.as_millis()).unwrap_or(u64::MAX).max(1)
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    if d == Duration::ZERO {
        None
    } else {
        Some(d)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `program = "sandrun-sandbox"`, no extra `args`
    /// - `poll_interval = 300ms`
    /// - `startup_timeout = 30s`
    /// - `step_timeout = 0s` (no limit)
    /// - `grace = 5s`
    /// - `open_delay = run_delay = 0s`
    /// - `start_url = "about:blank"`
    fn default() -> Self {
        Self {
            program: PathBuf::from("sandrun-sandbox"),
            args: Vec::new(),
            poll_interval: Duration::from_millis(300),
            startup_timeout: Duration::from_secs(30),
            step_timeout: Duration::ZERO,
            grace: Duration::from_secs(5),
            open_delay: Duration::ZERO,
            run_delay: Duration::ZERO,
            inject_files: Vec::new(),
            start_url: "about:blank".to_string(),
        }
    }
}
