//! Wire vocabulary between host, supervisor and sandbox.
//!
//! ## Contents
//! - [`Message`] bridge messages tagged by `type`: `action`, `test`, `finish`
//! - [`Action`] decoded `action` verbs
//! - [`Assertion`] a single assertion outcome
//! - [`ControlMessage`] host → child process control (`open`, `run`)
//! - [`ChildState`] child process → host notifications
//! - [`Progress`] testsuite progress on the `testsuite` channel
//! - [`ChildFrame`], [`HostFrame`] one-JSON-object-per-line stdio framing
//!
//! ## Quick wiring
//! ```text
//! host stdin ──► child:  HostFrame::Control(open | run)
//!                        HostFrame::Reply { reply: Envelope | null }
//! child stdout ──► host: ChildFrame::State(browserStarted | browserFinished | browserFailed)
//!                        ChildFrame::Call { call: Envelope }     (answered by one Reply)
//!                        anything that is not JSON → console output, logged
//! ```

mod control;
mod frame;
mod message;

pub use control::{ChildState, ControlMessage, Progress};
pub use frame::{decode_child_line, decode_host_line, encode_line, ChildFrame, ChildLine, HostFrame};
pub use message::{Action, Assertion, AssertionState, Message, TestBody, INPUT_EVENTS};
