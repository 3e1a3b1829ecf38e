//! # Sandbox side of the bridge.
//!
//! [`SandboxPeer`] lives inside the sandboxed process. It owns its own
//! channel table and reaches the host only through a [`HostCallback`]: every
//! outbound message is one synchronous call whose reply, if any, is routed to
//! the local receiver of the reply's channel.
//!
//! ```text
//! run_polling ── every interval ──► poll() ──► callback.call(["polling", null])
//!                                                       │
//!              PeerReceiver(channel) ◄── route(reply) ◄─┘
//! ```

use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{channel_bus, Envelope, MESSAGE_RECEIVED};
use crate::error::{BusError, SandboxError};
use crate::events::{EventBus, Invocations};
use crate::protocol::{decode_host_line, encode_line, ChildFrame, ChildState, ControlMessage, HostFrame};

/// The synchronous channel from the sandbox to the host.
pub trait HostCallback: Send {
    /// Delivers `envelope` and returns the host's reply.
    fn call(&mut self, envelope: Envelope) -> Result<Option<Envelope>, SandboxError>;

    /// Reports a process state change. No reply.
    fn notify(&mut self, state: ChildState) -> Result<(), SandboxError>;
}

/// Sandbox end of the bridge.
pub struct SandboxPeer<C> {
    callback: Mutex<C>,
    receivers: Mutex<HashMap<String, Arc<PeerReceiver>>>,
}

impl<C: HostCallback> SandboxPeer<C> {
    pub fn new(callback: C) -> Self {
        Self {
            callback: Mutex::new(callback),
            receivers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the receiver for `channel`, creating it on first use.
    pub fn register_receiver(&self, channel: &str) -> Arc<PeerReceiver> {
        self.receivers
            .lock()
            .entry(channel.to_string())
            .or_insert_with(|| {
                Arc::new(PeerReceiver {
                    channel: channel.to_string(),
                    bus: channel_bus(channel),
                })
            })
            .clone()
    }

    /// Sends `payload` to the host on `channel`.
    pub fn send_object(&self, channel: &str, payload: Value) -> Result<(), SandboxError> {
        self.exchange(Envelope::new(channel, payload)).map(|_| ())
    }

    /// Asks the host for the next queued message. Returns whether one arrived.
    pub fn poll(&self) -> Result<bool, SandboxError> {
        self.exchange(Envelope::polling())
    }

    pub fn notify(&self, state: ChildState) -> Result<(), SandboxError> {
        debug!(state = state.name(), "notify host");
        self.callback.lock().notify(state)
    }

    /// Gives direct access to the callback, e.g. to read queued control frames.
    pub fn with_callback<T>(&self, f: impl FnOnce(&mut C) -> T) -> T {
        let mut callback = self.callback.lock();
        f(&mut *callback)
    }

    /// Polls every `interval` until `token` is cancelled or a call fails.
    pub async fn run_polling(
        &self,
        interval: Duration,
        token: CancellationToken,
    ) -> Result<(), SandboxError> {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    if let Err(e) = self.poll() {
                        warn!(error = %e, label = e.as_label(), "polling stopped");
                        return Err(e);
                    }
                }
            }
        }
    }

    fn exchange(&self, envelope: Envelope) -> Result<bool, SandboxError> {
        trace!(channel = envelope.channel(), "call host");
        let reply = self.callback.lock().call(envelope)?;
        match reply {
            Some(reply) => {
                self.route(reply);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn route(&self, envelope: Envelope) {
        let Envelope(channel, payload) = envelope;
        let receiver = self.receivers.lock().get(&channel).cloned();
        match receiver {
            Some(r) => {
                if let Err(e) = r.bus.dispatch(MESSAGE_RECEIVED, &payload) {
                    warn!(%channel, error = %e, "reply not dispatched");
                }
            }
            None => warn!(%channel, %payload, "unroutable reply dropped"),
        }
    }
}

/// One logical channel inside the sandbox.
pub struct PeerReceiver {
    channel: String,
    bus: EventBus<Value>,
}

impl PeerReceiver {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn on_message<F>(&self, handler: F) -> Result<(), BusError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.bus.subscribe(MESSAGE_RECEIVED, handler, Invocations::Unlimited)
    }

    pub fn bus(&self) -> &EventBus<Value> {
        &self.bus
    }
}

/// [`HostCallback`] over a line-framed stream, normally the process's own
/// stdin (reader) and stdout (writer).
///
/// Control frames that arrive while a reply is awaited are queued and handed
/// out by [`next_control`](LineCallback::next_control).
///
/// # Blocking
/// Reads are plain blocking I/O and happen while the peer's callback lock is
/// held, from [`SandboxPeer::run_polling`] among others. Run it on a
/// multi-threaded tokio runtime (as the `sandrun-sandbox` binary does); on a
/// current-thread runtime a pending read stalls every other task.
pub struct LineCallback<R, W> {
    reader: R,
    writer: W,
    control: VecDeque<ControlMessage>,
}

impl<R: BufRead, W: Write> LineCallback<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer, control: VecDeque::new() }
    }

    /// Next control message, reading input if none is queued.
    /// `None` once the host closed the stream.
    pub fn next_control(&mut self) -> Result<Option<ControlMessage>, SandboxError> {
        if let Some(c) = self.control.pop_front() {
            return Ok(Some(c));
        }
        loop {
            match self.read_frame()? {
                Some(HostFrame::Control(c)) => return Ok(Some(c)),
                Some(HostFrame::Reply { .. }) => warn!("reply without a pending call ignored"),
                None => return Ok(None),
            }
        }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    fn write_frame(&mut self, frame: &ChildFrame) -> Result<(), SandboxError> {
        let line = encode_line(frame)?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| SandboxError::Callback(e.to_string()))
    }

    fn read_frame(&mut self) -> Result<Option<HostFrame>, SandboxError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .map_err(|e| SandboxError::Callback(e.to_string()))?;
            if n == 0 {
                return Ok(None);
            }
            if !line.trim().is_empty() {
                return Ok(Some(decode_host_line(&line)?));
            }
        }
    }
}

impl<R, W> HostCallback for LineCallback<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn call(&mut self, envelope: Envelope) -> Result<Option<Envelope>, SandboxError> {
        self.write_frame(&ChildFrame::Call { call: envelope })?;
        loop {
            match self.read_frame()? {
                Some(HostFrame::Reply { reply }) => return Ok(reply),
                Some(HostFrame::Control(c)) => self.control.push_back(c),
                None => return Err(SandboxError::Callback("host closed the channel".into())),
            }
        }
    }

    fn notify(&mut self, state: ChildState) -> Result<(), SandboxError> {
        self.write_frame(&ChildFrame::State(state))
    }
}
