//! # Process-level control and state notifications.
//!
//! ```text
//! host ──► child   {"action":"open","url":"http://...","injectFiles":[...]}
//! host ──► child   {"action":"run","testsuite":{...}}
//! child ──► host   {"state":"browserStarted","url":"http://..."}
//! child ──► host   {"state":"browserFinished","message":"...","success":true}
//! child ──► host   {"state":"browserFailed","error":"..."}
//! ```
//!
//! `open` must precede `run`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Control message sent by the supervisor to the sandbox process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Remember the target URL and extra scripts to inject.
    Open {
        url: String,
        #[serde(default, rename = "injectFiles", skip_serializing_if = "Vec::is_empty")]
        inject_files: Vec<PathBuf>,
    },
    /// Start the browser with the given testsuite descriptor.
    Run {
        #[serde(default)]
        testsuite: Value,
    },
}

/// State notification reported by the sandbox process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ChildState {
    BrowserStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    BrowserFinished {
        #[serde(default)]
        message: String,
        #[serde(default = "finished_ok")]
        success: bool,
    },
    BrowserFailed {
        #[serde(default)]
        error: String,
    },
}

fn finished_ok() -> bool {
    true
}

impl ChildState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChildState::BrowserStarted { .. })
    }

    /// Wire name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            ChildState::BrowserStarted { .. } => "browserStarted",
            ChildState::BrowserFinished { .. } => "browserFinished",
            ChildState::BrowserFailed { .. } => "browserFailed",
        }
    }
}

/// Progress of the in-page testsuite, sent on the `testsuite` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Progress {
    Started,
    NextTestcase {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tc: Option<String>,
    },
    Finished {
        #[serde(default)]
        success: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_wire_shape() {
        let open = ControlMessage::Open { url: "http://example.test/".into(), inject_files: vec![] };
        assert_eq!(
            serde_json::to_value(&open).unwrap(),
            json!({"action": "open", "url": "http://example.test/"})
        );
        let run: ControlMessage =
            serde_json::from_value(json!({"action": "run", "testsuite": {"when": []}})).unwrap();
        assert_eq!(run, ControlMessage::Run { testsuite: json!({"when": []}) });
    }

    #[test]
    fn child_states_decode_with_defaults() {
        let s: ChildState = serde_json::from_value(json!({"state": "browserStarted"})).unwrap();
        assert_eq!(s, ChildState::BrowserStarted { url: None });
        assert!(!s.is_terminal());

        let f: ChildState =
            serde_json::from_value(json!({"state": "browserFinished", "message": "done"})).unwrap();
        assert_eq!(f, ChildState::BrowserFinished { message: "done".into(), success: true });
        assert!(f.is_terminal());

        let e: ChildState =
            serde_json::from_value(json!({"state": "browserFailed", "error": "crash"})).unwrap();
        assert_eq!(e.name(), "browserFailed");
    }

    #[test]
    fn progress_decodes() {
        let p: Progress = serde_json::from_value(json!({"state": "nextTestcase", "tc": "2"})).unwrap();
        assert_eq!(p, Progress::NextTestcase { tc: Some("2".into()) });
        let p: Progress = serde_json::from_value(json!({"state": "started"})).unwrap();
        assert_eq!(p, Progress::Started);
    }
}
