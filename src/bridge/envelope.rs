use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved channel used by the sandbox to drain the host mailbox.
pub const POLLING: &str = "polling";
/// Host → sandbox instructions (`action`, `test`, `finish`).
pub const INTERACTION: &str = "interaction";
/// Testsuite progress reported by the page.
pub const TESTSUITE: &str = "testsuite";
/// Assertion outcomes reported by the sandbox.
pub const REPORT: &str = "report";

/// The only event of a channel bus.
pub const MESSAGE_RECEIVED: &str = "messageReceived";

/// A message addressed to a channel. On the wire: `[channel, payload]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope(pub String, pub Value);

impl Envelope {
    pub fn new(channel: impl Into<String>, payload: Value) -> Self {
        Self(channel.into(), payload)
    }

    /// A poll request.
    pub fn polling() -> Self {
        Self(POLLING.to_string(), Value::Null)
    }

    pub fn channel(&self) -> &str {
        &self.0
    }

    pub fn payload(&self) -> &Value {
        &self.1
    }

    pub fn is_polling(&self) -> bool {
        self.0 == POLLING
    }
}
