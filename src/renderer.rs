//! # Rendering engine seam.
//!
//! The sandbox runner drives a page only through [`Renderer`]. A real engine
//! (headless browser, webview, ...) lives outside this crate.
//!
//! What the page does on its own (console output, uncaught errors, load
//! progress) flows the other way, as [`PageEvent`]s pushed into the channel
//! handed to [`SandboxRunner::with_page_events`](crate::SandboxRunner::with_page_events).

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::SandboxError;

/// Page operations available inside the sandbox.
///
/// Implementations report engine failures as [`SandboxError::Renderer`].
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Loads `url` and resolves once the page finished loading.
    async fn navigate(&self, url: &str) -> Result<(), SandboxError>;

    /// Evaluates `script` in the page and returns its JSON result.
    async fn evaluate(&self, script: &str) -> Result<Value, SandboxError>;

    /// Injects the script file at `path` into the page.
    async fn inject_script(&self, path: &Path) -> Result<(), SandboxError>;

    /// Renders the page into `file`.
    async fn screenshot(&self, file: &str) -> Result<(), SandboxError>;

    /// Sends a synthetic input event (`click`, `keydown`, ...).
    async fn send_event(&self, event: &str, params: &[Value]) -> Result<(), SandboxError>;
}

/// Something the page reported without being asked.
///
/// An uncaught [`PageEvent::Error`] fails the running testsuite; every other
/// event is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// `console.*` output.
    Console {
        message: String,
        line: Option<u32>,
        source: Option<String>,
    },
    /// `window.alert` text.
    Alert(String),
    /// Uncaught script error, with its stack trace lines.
    Error { message: String, trace: Vec<String> },
    LoadStarted,
    /// Page load completed with `status` (`success`, `fail`).
    LoadFinished { status: String },
    UrlChanged(String),
    /// A subresource could not be loaded.
    ResourceError { url: String, error: String },
    ResourceTimeout { url: String },
}

/// Sending half of the page event channel, held by the engine.
pub type PageEvents = mpsc::UnboundedSender<PageEvent>;

/// Creates a page event channel: the sender goes to the engine, the receiver
/// to the runner.
pub fn page_events() -> (PageEvents, mpsc::UnboundedReceiver<PageEvent>) {
    mpsc::unbounded_channel()
}
