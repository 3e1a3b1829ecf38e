//! Control loop of the sandboxed process.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Applied, MessageDriver, SandboxOptions};
use crate::bridge::{HostCallback, SandboxPeer, INTERACTION, REPORT, TESTSUITE};
use crate::collections::OrderedSet;
use crate::error::{ProtocolError, SandboxError};
use crate::protocol::{ChildState, ControlMessage, Message, Progress, TestBody};
use crate::renderer::{PageEvent, Renderer};

/// Default interval between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Handles `open`/`run` and drives the renderer until `finish`.
///
/// ### Rules
/// - `open` must precede `run`; a second `open` replaces the URL and adds
///   inject files.
/// - Scripts are injected in first-insertion order, built-ins first.
/// - Every `run` ends with exactly one terminal state sent to the host.
/// - An uncaught page error during `run` ends it with `browserFailed`.
pub struct SandboxRunner<R, C> {
    driver: MessageDriver<R>,
    peer: Arc<SandboxPeer<C>>,
    inbox: mpsc::UnboundedReceiver<Value>,
    page_events: Option<mpsc::UnboundedReceiver<PageEvent>>,
    options: SandboxOptions,
    poll_interval: Duration,
    url: Option<String>,
    inject: OrderedSet<PathBuf>,
}

impl<R, C> SandboxRunner<R, C>
where
    R: Renderer,
    C: HostCallback + 'static,
{
    /// Builds a runner; `pollInterval` (ms) in `options` overrides the default.
    pub fn new(renderer: R, peer: Arc<SandboxPeer<C>>, options: SandboxOptions) -> Self {
        let (tx, inbox) = mpsc::unbounded_channel();
        let interaction = peer.register_receiver(INTERACTION);
        if let Err(e) = interaction.on_message(move |payload| {
            // the runner is gone; nothing left to drive
            let _ = tx.send(payload.clone());
        }) {
            error!(error = %e, "interaction channel unavailable");
        }
        let poll_interval = options
            .integer("pollInterval")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        Self {
            driver: MessageDriver::new(renderer),
            peer,
            inbox,
            page_events: None,
            options,
            poll_interval,
            url: None,
            inject: OrderedSet::new(),
        }
    }

    /// Scripts injected before any file named by `open`.
    pub fn with_builtin_scripts<I>(mut self, scripts: I) -> Result<Self, SandboxError>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.inject.extend(scripts)?;
        Ok(self)
    }

    /// Listens to what the page reports on its own while a run is active.
    pub fn with_page_events(mut self, events: mpsc::UnboundedReceiver<PageEvent>) -> Self {
        self.page_events = Some(events);
        self
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }

    pub fn driver(&self) -> &MessageDriver<R> {
        &self.driver
    }

    /// Scripts to inject, in order.
    pub fn inject_files(&self) -> Vec<PathBuf> {
        self.inject.iter().cloned().collect()
    }

    /// Reads control messages from `next` until the input ends or a run completed.
    pub async fn serve<F>(&mut self, mut next: F) -> Result<Option<ChildState>, SandboxError>
    where
        F: FnMut() -> Result<Option<ControlMessage>, SandboxError>,
    {
        while let Some(control) = next()? {
            if let Some(state) = self.handle_control(control).await? {
                return Ok(Some(state));
            }
        }
        debug!("control input closed");
        Ok(None)
    }

    /// Applies one control message. `run` returns the terminal state it reported.
    pub async fn handle_control(
        &mut self,
        control: ControlMessage,
    ) -> Result<Option<ChildState>, SandboxError> {
        match control {
            ControlMessage::Open { url, inject_files } => {
                info!(%url, extra = inject_files.len(), "open");
                self.inject.extend(inject_files)?;
                self.url = Some(url);
                Ok(None)
            }
            ControlMessage::Run { testsuite } => {
                let url = self.url.clone().ok_or(SandboxError::NotOpened)?;
                self.peer.notify(ChildState::BrowserStarted { url: Some(url.clone()) })?;

                let state = match self.execute(&url, &testsuite).await {
                    Ok(true) => ChildState::BrowserFinished {
                        message: "testsuite finished".into(),
                        success: true,
                    },
                    Ok(false) => ChildState::BrowserFinished {
                        message: "testsuite finished with error".into(),
                        success: false,
                    },
                    Err(e) => {
                        error!(error = %e, label = e.as_label(), "run failed");
                        ChildState::BrowserFailed { error: e.to_string() }
                    }
                };
                self.peer.notify(state.clone())?;
                Ok(Some(state))
            }
        }
    }

    async fn execute(&mut self, url: &str, testsuite: &Value) -> Result<bool, SandboxError> {
        for script in self.inject.iter() {
            self.driver.renderer().inject_script(script).await?;
        }
        self.driver.renderer().navigate(url).await?;
        if !testsuite.is_null() {
            let script = format!("window.testsuiteBus.send({testsuite})");
            self.driver.renderer().evaluate(&script).await?;
        }
        self.progress(Progress::Started)?;

        let token = CancellationToken::new();
        let _stop_polling = token.clone().drop_guard();
        let mut poller = tokio::spawn({
            let (peer, interval) = (Arc::clone(&self.peer), self.poll_interval);
            async move { peer.run_polling(interval, token).await }
        });

        loop {
            tokio::select! {
                biased;
                Some(event) = next_page_event(&mut self.page_events) => observe(event)?,
                payload = self.inbox.recv() => {
                    let Some(payload) = payload else {
                        return Err(SandboxError::Callback("interaction channel closed".into()));
                    };
                    let message = Message::parse(&payload)?;
                    let applied = AssertUnwindSafe(self.driver.apply(&message))
                        .catch_unwind()
                        .await
                        .map_err(|panic| SandboxError::Renderer(panic_message(panic.as_ref())))??;
                    match applied {
                        Applied::Done => {}
                        Applied::Checked(assertion) => {
                            let report = Message::Test { test: TestBody::Outcome(assertion) };
                            self.peer.send_object(REPORT, report.to_value())?;
                        }
                        Applied::Finished => {
                            let success = self.driver.failed() == 0;
                            self.progress(Progress::Finished { success })?;
                            return Ok(success);
                        }
                    }
                }
                polled = &mut poller => {
                    return match polled {
                        Ok(Ok(())) => Err(SandboxError::Callback("polling stopped".into())),
                        Ok(Err(e)) => Err(e),
                        Err(join) => Err(SandboxError::Callback(format!("polling task failed: {join}"))),
                    };
                }
            }
        }
    }

    fn progress(&self, progress: Progress) -> Result<(), SandboxError> {
        let payload = serde_json::to_value(&progress).map_err(ProtocolError::from)?;
        self.peer.send_object(TESTSUITE, payload)
    }
}

async fn next_page_event(
    events: &mut Option<mpsc::UnboundedReceiver<PageEvent>>,
) -> Option<PageEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Logs one page event; an uncaught script error ends the run.
fn observe(event: PageEvent) -> Result<(), SandboxError> {
    match event {
        PageEvent::Console { message, line, source } => {
            info!(target: "sandrun::page", ?line, ?source, "{message}");
        }
        PageEvent::Alert(text) => warn!(target: "sandrun::page", "alert: {text}"),
        PageEvent::Error { message, trace } => {
            error!(target: "sandrun::page", trace = %trace.join("\n"), "{message}");
            return Err(SandboxError::Script(message));
        }
        PageEvent::LoadStarted => debug!(target: "sandrun::page", "load started"),
        PageEvent::LoadFinished { status } => debug!(target: "sandrun::page", %status, "load finished"),
        PageEvent::UrlChanged(url) => debug!(target: "sandrun::page", %url, "url changed"),
        PageEvent::ResourceError { url, error } => {
            warn!(target: "sandrun::page", %url, %error, "resource failed");
        }
        PageEvent::ResourceTimeout { url } => warn!(target: "sandrun::page", %url, "resource timed out"),
    }
    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        format!("renderer panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("renderer panicked: {msg}")
    } else {
        warn!("renderer panicked with a non-string payload");
        "renderer panicked".to_string()
    }
}
