//! # Supervisor: spawns the sandbox and turns its notifications into an outcome.
//!
//! ## Architecture
//! ```text
//! Supervisor::launch(url, testsuite, options, bridge)
//!   │
//!   ├─► spawn child (program args.. --option value..), stdio piped
//!   │
//!   ├─► control task:  sleep(open_delay) → {"action":"open"} → sleep(run_delay) → {"action":"run"}
//!   │
//!   ├─► pump task (child stdout, one line at a time):
//!   │      {"call": env}   ──► Bridge::receive(env) ──► {"reply": env|null} ──► writer
//!   │      {"state": ...}  ──► OutcomeTracker::apply
//!   │      other JSON      ──► Failed(ProtocolViolation), kill
//!   │      anything else   ──► logged as sandbox console output
//!   │
//!   ├─► writer task:   frames ──► child stdin
//!   │
//!   ├─► reaper task:   stdout closed or kill requested ──► child.wait()
//!   │                   └─► no terminal state yet → Failed(ChildExited)
//!   │
//!   └─► startup timer:  no browserStarted in time → Failed(StartupTimeout), kill
//! ```
//!
//! ## Rules
//! - `open` is always sent before `run`.
//! - The first terminal outcome wins ([`OutcomeTracker`]).
//! - Child output is read as bytes; invalid UTF-8 is replaced, never fatal.
//! - [`SupervisedRun::wait`] gives the child `grace` to exit after the outcome
//!   is known, then kills it.
//! - Exit code is 0 only for a successful finish followed by a clean exit.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::Config;
use super::outcome::{FailureCause, OutcomeTracker, RunOutcome};
use super::shutdown;
use crate::bridge::Bridge;
use crate::error::RunError;
use crate::protocol::{decode_child_line, encode_line, ChildFrame, ChildLine, ControlMessage, HostFrame};
use crate::sandbox::SandboxOptions;

/// Upper bound for reading the child's remaining output after it exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct Exited(Option<i32>);

/// Spawns and watches sandbox processes.
pub struct Supervisor {
    cfg: Config,
}

impl Supervisor {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Spawns the sandbox, sends `open` and `run`, and starts pumping its
    /// stdio through `bridge`. An empty `url` falls back to `Config::start_url`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn launch(
        &self,
        url: &str,
        testsuite: Value,
        options: &SandboxOptions,
        bridge: Arc<Bridge>,
    ) -> Result<SupervisedRun, RunError> {
        let url = if url.is_empty() { self.cfg.start_url.as_str() } else { url };
        let mut options = options.clone();
        if options.get("pollInterval").is_none() {
            options.set("pollInterval", Value::from(self.cfg.poll_interval_ms()));
        }

        let mut child = Command::new(&self.cfg.program)
            .args(&self.cfg.args)
            .args(options.to_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(RunError::Io(std::io::Error::other("sandbox stdio not captured")));
        };
        info!(program = %self.cfg.program.display(), pid = ?child.id(), %url, "sandbox spawned");

        let tracker = Arc::new(OutcomeTracker::new());
        let kill = CancellationToken::new();
        let (frames, outbox) = mpsc::unbounded_channel();
        let (exit_tx, exited) = watch::channel(None);

        let open = ControlMessage::Open {
            url: url.to_string(),
            inject_files: self.cfg.inject_files.clone(),
        };
        let run = ControlMessage::Run { testsuite };

        tokio::spawn(write_frames(stdin, outbox));
        tokio::spawn(send_control(frames.clone(), [open, run], [self.cfg.open_delay, self.cfg.run_delay]));
        let pump = tokio::spawn(pump(stdout, bridge, Arc::clone(&tracker), frames, kill.clone()));
        tokio::spawn(reap(child, pump, kill.clone(), Arc::clone(&tracker), exit_tx));
        let timer = self
            .cfg
            .startup_timeout()
            .map(|after| tokio::spawn(startup_timer(after, Arc::clone(&tracker), kill.clone())));

        Ok(SupervisedRun { tracker, kill, exited, grace: self.cfg.grace, timer })
    }

    /// Launches with a private bridge and waits for the report.
    ///
    /// A termination signal received meanwhile aborts the run.
    pub async fn start(
        &self,
        url: &str,
        testsuite: Value,
        options: &SandboxOptions,
    ) -> Result<RunReport, RunError> {
        let run = self.launch(url, testsuite, options, Arc::new(Bridge::new()))?;
        tokio::select! {
            report = run.wait() => Ok(report),
            Ok(signal) = shutdown::interrupted() => {
                run.abort(format!("interrupted by {signal}"));
                Ok(run.wait().await)
            }
        }
    }
}

/// Handle to one running sandbox.
pub struct SupervisedRun {
    tracker: Arc<OutcomeTracker>,
    kill: CancellationToken,
    exited: watch::Receiver<Option<Exited>>,
    grace: Duration,
    timer: Option<JoinHandle<()>>,
}

impl SupervisedRun {
    /// Resolves once the child confirmed startup, or with the failure that
    /// prevented it.
    pub async fn started(&self) -> Result<(), RunError> {
        let outcome = self.tracker.wait_for(|o| *o != RunOutcome::Pending).await;
        match outcome {
            RunOutcome::Started { .. } | RunOutcome::Finished { success: true, .. } => Ok(()),
            other => other.into_result().map(|_| ()),
        }
    }

    /// Current outcome.
    pub fn outcome(&self) -> RunOutcome {
        self.tracker.current()
    }

    /// Fails the run (unless it already ended) and kills the child.
    pub fn abort(&self, cause: impl Into<String>) {
        let cause = cause.into();
        if self.tracker.fail(FailureCause::Aborted(cause.clone())) {
            warn!(%cause, "run aborted");
        }
        self.kill.cancel();
    }

    /// Waits for a terminal outcome and for the child to exit.
    pub async fn wait(&self) -> RunReport {
        let outcome = self.tracker.wait_for(RunOutcome::is_terminal).await;
        if let Some(timer) = &self.timer {
            timer.abort();
        }

        let mut exited = self.exited.clone();
        let within_grace = time::timeout(self.grace, exited.wait_for(Option::is_some))
            .await
            .ok()
            .and_then(|r| r.ok().map(|e| *e));
        let exit = match within_grace {
            Some(exit) => exit,
            None => {
                warn!(grace = ?self.grace, "sandbox still running, killing it");
                self.kill.cancel();
                exited.wait_for(Option::is_some).await.ok().and_then(|e| *e)
            }
        };

        RunReport { outcome, exit_status: exit.and_then(|Exited(code)| code) }
    }
}

/// Final state of a supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Child exit code; `None` if it was killed by a signal.
    pub exit_status: Option<i32>,
}

impl RunReport {
    /// Process exit status for the host program.
    ///
    /// # Example
    /// ```
    /// use sandrun::{RunOutcome, RunReport};
    ///
    /// let ok = RunReport {
    ///     outcome: RunOutcome::Finished { success: true, message: "done".into() },
    ///     exit_status: Some(0),
    /// };
    /// assert_eq!(ok.exit_code(), 0);
    ///
    /// let crashed = RunReport { outcome: RunOutcome::Pending, exit_status: Some(3) };
    /// assert_eq!(crashed.exit_code(), 3);
    /// ```
    pub fn exit_code(&self) -> i32 {
        match (self.outcome.is_success(), self.exit_status) {
            (true, Some(0)) => 0,
            (_, Some(code)) if code != 0 => code,
            _ => 1,
        }
    }
}

async fn send_control(
    frames: mpsc::UnboundedSender<HostFrame>,
    messages: [ControlMessage; 2],
    delays: [Duration; 2],
) {
    for (message, delay) in messages.into_iter().zip(delays) {
        if !delay.is_zero() {
            time::sleep(delay).await;
        }
        debug!(?message, "control");
        if frames.send(HostFrame::Control(message)).is_err() {
            warn!("sandbox stdin closed before control was sent");
            return;
        }
    }
}

async fn write_frames(mut stdin: ChildStdin, mut outbox: mpsc::UnboundedReceiver<HostFrame>) {
    while let Some(frame) = outbox.recv().await {
        let line = match encode_line(&frame) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "frame not encodable");
                continue;
            }
        };
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        };
        if let Err(e) = written.await {
            debug!(error = %e, "sandbox stdin closed");
            return;
        }
    }
}

async fn pump(
    stdout: ChildStdout,
    bridge: Arc<Bridge>,
    tracker: Arc<OutcomeTracker>,
    frames: mpsc::UnboundedSender<HostFrame>,
    kill: CancellationToken,
) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "reading sandbox output failed");
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        match decode_child_line(&line) {
            Ok(ChildLine::Console(text)) => info!(target: "sandrun::sandbox", "{text}"),
            Ok(ChildLine::Frame(ChildFrame::State(state))) => {
                tracker.apply(&state);
            }
            Ok(ChildLine::Frame(ChildFrame::Call { call })) => {
                let reply = bridge.receive(call);
                if frames.send(HostFrame::Reply { reply }).is_err() {
                    warn!("reply dropped, sandbox stdin closed");
                }
            }
            Err(e) => {
                error!(error = %e, "sandbox broke the protocol, stopping it");
                tracker.fail(FailureCause::ProtocolViolation(e.to_string()));
                kill.cancel();
            }
        }
    }
    debug!("sandbox stdout closed");
}

async fn reap(
    mut child: Child,
    mut pump: JoinHandle<()>,
    kill: CancellationToken,
    tracker: Arc<OutcomeTracker>,
    exited: watch::Sender<Option<Exited>>,
) {
    let mut drained = false;
    tokio::select! {
        _ = &mut pump => drained = true,
        _ = kill.cancelled() => {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "kill failed");
            }
        }
    }

    let code = match child.wait().await {
        Ok(status) => {
            info!(%status, "sandbox exited");
            status.code()
        }
        Err(e) => {
            warn!(error = %e, "waiting for sandbox failed");
            None
        }
    };
    if !drained && time::timeout(DRAIN_TIMEOUT, &mut pump).await.is_err() {
        pump.abort();
    }

    if !tracker.current().is_terminal() {
        tracker.fail(FailureCause::ChildExited(code));
    }
    exited.send_replace(Some(Exited(code)));
}

async fn startup_timer(after: Duration, tracker: Arc<OutcomeTracker>, kill: CancellationToken) {
    tokio::select! {
        _ = time::sleep(after) => {
            if tracker.expire_startup(after) {
                kill.cancel();
            }
        }
        _ = tracker.wait_for(|o| *o != RunOutcome::Pending) => {}
    }
}

/// Spawns `/bin/sh -c <script>` as a sandbox.
#[cfg(all(test, unix))]
pub(crate) fn shell_config(script: &str) -> Config {
    Config {
        program: std::path::PathBuf::from("/bin/sh"),
        args: vec!["-c".into(), script.into(), "sandbox".into()],
        grace: Duration::from_secs(2),
        ..Config::default()
    }
}
