//! # Bridge message vocabulary.
//!
//! Every payload on the `interaction` and `report` channels is a JSON object
//! with a `type` discriminator:
//!
//! ```text
//! {"type":"action","action":["click", 10, 20]}
//! {"type":"test","test":{"expectExistence":["button","Search"]}}
//! {"type":"test","test":{"what":"button","expected":"Search","actual":null,"state":"ok"}}
//! {"type":"finish"}
//! ```
//!
//! ## Rules
//! - Missing `type` or an unknown `type` is a protocol violation (fatal).
//! - `screenshot` takes an optional suffix, defaulting to a millisecond timestamp.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Synthetic input events forwarded verbatim to the renderer.
pub const INPUT_EVENTS: [&str; 7] = [
    "mousemove", "click", "mousedown", "keydown", "mouseup", "keyup", "keypress",
];

const MESSAGE_TYPES: [&str; 3] = ["action", "test", "finish"];

/// Message exchanged over a bridge channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Something for the sandbox to do: `[verb, ...params]`.
    Action { action: Vec<Value> },
    /// An expectation to check, or the outcome of one.
    Test { test: TestBody },
    /// The run is complete.
    Finish,
}

/// Body of a `test` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestBody {
    /// A checked assertion.
    Outcome(Assertion),
    /// An opaque expectation descriptor, e.g. `{"expectExistence": [...]}`.
    Expectation(Map<String, Value>),
}

/// Verdict of one assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionState {
    Ok,
    Fail,
}

/// Outcome of one assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub what: String,
    pub expected: Value,
    #[serde(default)]
    pub actual: Option<Value>,
    pub state: AssertionState,
}

impl Assertion {
    pub fn passed(&self) -> bool {
        self.state == AssertionState::Ok
    }

    /// One-line description used in logs and failure reports.
    pub fn describe(&self) -> String {
        let verdict = match (&self.state, &self.actual) {
            (AssertionState::Ok, _) => "fine".to_string(),
            (AssertionState::Fail, Some(actual)) => format!("{actual}"),
            (AssertionState::Fail, None) => "missing".to_string(),
        };
        format!(
            "expected that {:?} is {} and this is {}",
            self.what, self.expected, verdict
        )
    }
}

impl Message {
    /// Decodes a bridge payload, enforcing the `type` discriminator.
    pub fn parse(payload: &Value) -> Result<Message, ProtocolError> {
        let Some(obj) = payload.as_object() else {
            return Err(ProtocolError::Violation(format!(
                "message is not an object: {payload}"
            )));
        };
        let kind = match obj.get("type") {
            Some(Value::String(kind)) => kind,
            _ => {
                return Err(ProtocolError::Violation(format!(
                    "invalid message received: {payload}"
                )))
            }
        };
        if !MESSAGE_TYPES.contains(&kind.as_str()) {
            return Err(ProtocolError::Violation(format!(
                "unknown message type received: {kind}"
            )));
        }
        Ok(serde_json::from_value(payload.clone())?)
    }

    /// Builds an `action` message from a verb and its parameters.
    pub fn action<I>(verb: &str, params: I) -> Message
    where
        I: IntoIterator<Item = Value>,
    {
        let mut action = vec![Value::String(verb.to_string())];
        action.extend(params);
        Message::Action { action }
    }

    /// Serializes into a bridge payload.
    pub fn to_value(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(v) => v,
            // enum of plain JSON values with string keys
            Err(_) => unreachable!("Message always serializes"),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Action { .. } => "action",
            Message::Test { .. } => "test",
            Message::Finish => "finish",
        }
    }
}

/// Decoded `action` verb.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Load a new URL (`navigate` or `open`).
    Navigate(String),
    /// Synthetic input event (`click`, `keydown`, ...), parameters verbatim.
    Input { event: String, params: Vec<Value> },
    /// Capture the page; `None` means "use a timestamp".
    Screenshot(Option<String>),
    /// Evaluate a script in the page.
    Evaluate(String),
    /// Inject a script file into the page.
    Inject(PathBuf),
}

impl Action {
    /// Decodes `[verb, ...params]`.
    pub fn from_parts(parts: &[Value]) -> Result<Action, ProtocolError> {
        let (verb, params) = match parts.split_first() {
            Some((Value::String(verb), params)) => (verb.as_str(), params),
            _ => {
                return Err(ProtocolError::Violation(format!(
                    "action without verb: {parts:?}"
                )))
            }
        };
        let text = |i: usize| -> Result<String, ProtocolError> {
            match params.get(i) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(other) => Ok(other.to_string()),
                None => Err(ProtocolError::Violation(format!(
                    "action {verb:?} is missing parameter {}",
                    i + 1
                ))),
            }
        };

        match verb {
            "navigate" | "open" => Ok(Action::Navigate(text(0)?)),
            "screenshot" => Ok(Action::Screenshot(match params.first() {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.is_empty() => None,
                Some(_) => Some(text(0)?),
            })),
            "evaluate" => Ok(Action::Evaluate(text(0)?)),
            "inject" => Ok(Action::Inject(PathBuf::from(text(0)?))),
            // shorthand for a key press
            "key" => Ok(Action::Input {
                event: "keypress".to_string(),
                params: params.to_vec(),
            }),
            v if INPUT_EVENTS.contains(&v) => Ok(Action::Input {
                event: v.to_string(),
                params: params.to_vec(),
            }),
            other => Err(ProtocolError::Violation(format!(
                "unknown action verb: {other}"
            ))),
        }
    }

    /// Screenshot file name for `suffix`, defaulting to the current time in ms.
    pub fn screenshot_file(suffix: Option<&str>) -> String {
        match suffix {
            Some(s) => format!("screenshot-{s}.png"),
            None => format!("screenshot-{}.png", chrono::Utc::now().timestamp_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_each_type() {
        let a = Message::parse(&json!({"type": "action", "action": ["key", "enter"]})).unwrap();
        assert_eq!(a, Message::action("key", [json!("enter")]));

        let t = Message::parse(&json!({"type": "test", "test": {"expectExistence": ["button", "Go"]}}))
            .unwrap();
        assert!(matches!(t, Message::Test { test: TestBody::Expectation(_) }));

        let o = Message::parse(&json!({
            "type": "test",
            "test": {"what": "title", "expected": "Go", "actual": "Stop", "state": "fail"}
        }))
        .unwrap();
        match o {
            Message::Test { test: TestBody::Outcome(a) } => {
                assert!(!a.passed());
                assert!(a.describe().contains("\"Stop\""));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(Message::parse(&json!({"type": "finish"})).unwrap(), Message::Finish);
    }

    #[test]
    fn missing_or_unknown_type_is_violation() {
        for bad in [json!({"action": ["click"]}), json!({"type": "explode"}), json!("finish"), json!({"type": 3})] {
            assert!(matches!(Message::parse(&bad), Err(ProtocolError::Violation(_))), "{bad}");
        }
        assert!(matches!(
            Message::parse(&json!({"type": "action"})),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn finish_round_trips_through_value() {
        assert_eq!(Message::Finish.to_value(), json!({"type": "finish"}));
    }

    #[test]
    fn decodes_verbs() {
        assert_eq!(
            Action::from_parts(&[json!("navigate"), json!("http://example.test/")]).unwrap(),
            Action::Navigate("http://example.test/".into())
        );
        assert_eq!(
            Action::from_parts(&[json!("click"), json!(10), json!(20)]).unwrap(),
            Action::Input { event: "click".into(), params: vec![json!(10), json!(20)] }
        );
        assert_eq!(Action::from_parts(&[json!("screenshot")]).unwrap(), Action::Screenshot(None));
        assert_eq!(
            Action::from_parts(&[json!("screenshot"), json!("home")]).unwrap(),
            Action::Screenshot(Some("home".into()))
        );
        assert_eq!(
            Action::from_parts(&[json!("key"), json!("enter")]).unwrap(),
            Action::Input { event: "keypress".into(), params: vec![json!("enter")] }
        );
        assert!(Action::from_parts(&[json!("fly")]).is_err());
        assert!(Action::from_parts(&[]).is_err());
        assert!(Action::from_parts(&[json!("navigate")]).is_err());
    }

    #[test]
    fn screenshot_file_defaults_to_timestamp() {
        assert_eq!(Action::screenshot_file(Some("x")), "screenshot-x.png");
        let name = Action::screenshot_file(None);
        let stamp = name.trim_start_matches("screenshot-").trim_end_matches(".png");
        assert!(stamp.parse::<i64>().is_ok(), "{name}");
    }
}
