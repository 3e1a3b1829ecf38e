//! # Mailbox bridge between the host and the poll-only sandbox.
//!
//! The sandboxed process cannot be called into. It can only invoke one
//! synchronous callback on the host, so every host → sandbox message waits in
//! a shared [`Mailbox`](crate::collections::Mailbox) until the sandbox asks
//! for it.
//!
//! ```text
//!  host                                         sandbox
//!  ────                                         ───────
//!  Receiver("interaction").send(msg) ─► Mailbox
//!                                         │
//!                   Bridge::receive ◄─────┼──── poll(): ["polling", null]
//!                          │              └───► reply: next envelope or None
//!                          │
//!  Receiver("report") ◄────┴─ messageReceived ◄─ send_object("report", payload)
//!                                          └───► reply: next envelope (piggyback)
//! ```
//!
//! ## Rules
//! - Channel `polling` is reserved; it only drains the mailbox.
//! - A message for a channel nobody registered is dropped with a warning.
//! - Locks are never held while handlers run.

mod envelope;
mod host;
pub mod peer;

pub use envelope::{Envelope, INTERACTION, MESSAGE_RECEIVED, POLLING, REPORT, TESTSUITE};
pub use host::{Bridge, Receiver};
pub use peer::{HostCallback, LineCallback, PeerReceiver, SandboxPeer};

use serde_json::Value;

use crate::events::EventBus;

/// Builds the per-channel bus (vocabulary `{messageReceived}`).
fn channel_bus(channel: &str) -> EventBus<Value> {
    match EventBus::new(format!("channel:{channel}"), [MESSAGE_RECEIVED]) {
        Ok(bus) => bus,
        Err(_) => unreachable!("messageReceived is a valid event name"),
    }
}
