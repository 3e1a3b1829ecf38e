//! # Line framing over the child's stdio.
//!
//! One JSON document per line. The child's stdout also carries whatever the
//! renderer prints; lines that are not JSON are returned as
//! [`ChildLine::Console`] and only logged.

use serde::{Deserialize, Serialize};

use super::{ChildState, ControlMessage};
use crate::bridge::Envelope;
use crate::error::ProtocolError;

/// Frame written by the child on its stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildFrame {
    /// Process state notification; no reply expected.
    State(ChildState),
    /// Synchronous bridge call; the host answers with exactly one [`HostFrame::Reply`].
    Call { call: Envelope },
}

/// Frame written by the host on the child's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostFrame {
    Control(ControlMessage),
    Reply { reply: Option<Envelope> },
}

/// Classified child stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildLine {
    Frame(ChildFrame),
    Console(String),
}

/// Serializes `frame` as one newline-terminated line.
pub fn encode_line<T: Serialize>(frame: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(frame)?;
    line.push('\n');
    Ok(line)
}

/// Classifies one line of child output.
///
/// Non-JSON text is console output. JSON that is not a known frame is a
/// protocol violation.
pub fn decode_child_line(line: &str) -> Result<ChildLine, ProtocolError> {
    let trimmed = line.trim();
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return Ok(ChildLine::Console(trimmed.to_string()));
    };
    if !value.is_object() {
        return Ok(ChildLine::Console(trimmed.to_string()));
    }
    serde_json::from_value(value.clone())
        .map(ChildLine::Frame)
        .map_err(|_| ProtocolError::Violation(format!("unknown message received from child: {value}")))
}

/// Decodes one line written by the host.
pub fn decode_host_line(line: &str) -> Result<HostFrame, ProtocolError> {
    serde_json::from_str(line.trim()).map_err(|e| {
        ProtocolError::Violation(format!("unreadable host frame {:?}: {e}", line.trim()))
    })
}
