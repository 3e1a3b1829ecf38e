//! Host side of the bridge.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use super::{channel_bus, Envelope, MESSAGE_RECEIVED};
use crate::collections::Mailbox;
use crate::error::BusError;
use crate::events::{EventBus, Invocations};

type SharedMailbox = Arc<Mutex<Mailbox<Envelope>>>;

/// Host end of the bridge: one bus per channel, one shared outbound mailbox.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Bridge {
    mailbox: SharedMailbox,
    receivers: Mutex<HashMap<String, Arc<Receiver>>>,
}

impl Bridge {
    pub fn new() -> Self {
        Self {
            mailbox: Arc::new(Mutex::new(Mailbox::new())),
            receivers: Mutex::new(HashMap::new()),
        }
    }

    /// Queues `payload` for `channel`. Nothing is pushed; the sandbox picks
    /// it up on its next callback.
    pub fn send_object(&self, channel: &str, payload: Value) {
        enqueue(&self.mailbox, Envelope::new(channel, payload));
    }

    /// Handles one callback from the sandbox and returns the reply.
    ///
    /// - `polling`: reply with the next queued envelope, if any.
    /// - registered channel: dispatch `messageReceived`, then piggyback the
    ///   next queued envelope.
    /// - anything else: warn and drop; reply `None`.
    pub fn receive(&self, envelope: Envelope) -> Option<Envelope> {
        let Envelope(channel, payload) = envelope;
        if channel == super::POLLING {
            let next = self.mailbox.lock().dequeue_or_none();
            debug!(reply = ?next.as_ref().map(Envelope::channel), "poll");
            return next;
        }

        let receiver = self.receivers.lock().get(&channel).cloned();
        let Some(receiver) = receiver else {
            warn!(%channel, %payload, "unroutable message dropped");
            return None;
        };
        debug!(%channel, "message received");
        if let Err(e) = receiver.bus.dispatch(MESSAGE_RECEIVED, &payload) {
            warn!(%channel, error = %e, label = e.as_label(), "message not dispatched");
        }
        self.mailbox.lock().dequeue_or_none()
    }

    /// Returns the receiver for `channel`, creating it on first use.
    pub fn register_receiver(&self, channel: &str) -> Arc<Receiver> {
        let mut receivers = self.receivers.lock();
        receivers
            .entry(channel.to_string())
            .or_insert_with(|| {
                Arc::new(Receiver {
                    channel: channel.to_string(),
                    bus: channel_bus(channel),
                    mailbox: Arc::clone(&self.mailbox),
                })
            })
            .clone()
    }

    pub fn is_registered(&self, channel: &str) -> bool {
        self.receivers.lock().contains_key(channel)
    }

    /// Takes every queued envelope, for transports that can push.
    pub fn drain(&self) -> Vec<Envelope> {
        self.mailbox.lock().drain()
    }

    /// Number of envelopes waiting for the sandbox.
    pub fn pending(&self) -> usize {
        self.mailbox.lock().len()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut channels: Vec<String> = self.receivers.lock().keys().cloned().collect();
        channels.sort_unstable();
        f.debug_struct("Bridge")
            .field("channels", &channels)
            .field("pending", &self.pending())
            .finish()
    }
}

/// One logical channel on the host.
pub struct Receiver {
    channel: String,
    bus: EventBus<Value>,
    mailbox: SharedMailbox,
}

impl Receiver {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Queues `payload` for the sandbox on this channel.
    pub fn send(&self, payload: Value) {
        enqueue(&self.mailbox, Envelope::new(self.channel.as_str(), payload));
    }

    /// Listens to every message arriving on this channel.
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

fn enqueue(mailbox: &SharedMailbox, envelope: Envelope) {
    debug!(channel = envelope.channel(), "enqueue");
    mailbox.lock().enqueue(envelope);
}
