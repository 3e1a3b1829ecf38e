//! # sandrun-sandbox
//!
//! Sandboxed side of a run, speaking JSON lines over stdin/stdout.
//! The page is a dry run: every page operation is logged to stderr and every
//! expectation evaluates as passed. Handy as the `Config::program` of a
//! smoke run and as a reference for wiring a real engine behind [`Renderer`].
//!
//! ## Flow
//! ```text
//! stdin ──► LineCallback::next_control ──► SandboxRunner::serve
//!                                               ├─► open: remember url
//!                                               └─► run: browserStarted
//!                                                        poll ◄──► host (stdout/stdin)
//!                                                        finish ──► browserFinished
//! exit 0 after a successful finish, 1 otherwise
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --bin sandrun-sandbox -- --pollInterval 50
//! ```
//!
//! `LineCallback` blocks on stdin, so the runtime must be multi-threaded:
//! the polling task and the control loop each hold a thread while waiting.

use std::io::{self, BufReader};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info};

use sandrun::bridge::LineCallback;
use sandrun::{ChildState, Renderer, SandboxError, SandboxOptions, SandboxPeer, SandboxRunner};

/// Page without an engine behind it.
struct DryRun;

#[async_trait]
impl Renderer for DryRun {
    async fn navigate(&self, url: &str) -> Result<(), SandboxError> {
        info!(%url, "navigate");
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, SandboxError> {
        info!(%script, "evaluate");
        Ok(json!({"success": true}))
    }

    async fn inject_script(&self, path: &Path) -> Result<(), SandboxError> {
        info!(path = %path.display(), "inject");
        Ok(())
    }

    async fn screenshot(&self, file: &str) -> Result<(), SandboxError> {
        info!(%file, "screenshot");
        Ok(())
    }

    async fn send_event(&self, event: &str, params: &[Value]) -> Result<(), SandboxError> {
        info!(%event, ?params, "input event");
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    #[cfg(feature = "logging")]
    sandrun::telemetry::init("info").ok();

    let options = match SandboxOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            error!(error = %e, "bad command line");
            return ExitCode::from(2);
        }
    };

    let callback = LineCallback::new(BufReader::new(io::stdin()), io::stdout());
    let peer = Arc::new(SandboxPeer::new(callback));
    let mut runner = SandboxRunner::new(DryRun, Arc::clone(&peer), options);

    match runner.serve(|| peer.with_callback(|c| c.next_control())).await {
        Ok(Some(ChildState::BrowserFinished { success: true, .. })) => ExitCode::SUCCESS,
        Ok(Some(state)) => {
            info!(?state, "run did not succeed");
            ExitCode::FAILURE
        }
        Ok(None) => {
            info!("host closed the control stream before a run");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, label = e.as_label(), "sandbox failed");
            ExitCode::FAILURE
        }
    }
}
