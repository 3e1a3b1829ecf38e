use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::substitute;
use crate::bridge::{Bridge, INTERACTION};
use crate::error::{ProtocolError, StepError};
use crate::exec::{Completion, Step, StepInterpreter};
use crate::protocol::{Message, TestBody};

/// Which handler a definition registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Sets the target URL and navigates to it.
    Given,
    /// Sends an `action` message.
    When,
    /// Sends a `test` message carrying an expectation.
    Then,
}

#[derive(Debug)]
struct Definition {
    pattern: Regex,
    kind: StepKind,
    descriptor: Value,
}

/// Ordered step definitions forwarding to a host [`Bridge`].
///
/// Definitions are tried in registration order; the first pattern that
/// matches the step text handles it.
pub struct StepLibrary {
    bridge: Arc<Bridge>,
    definitions: Vec<Definition>,
    target: Mutex<Option<String>>,
}

impl StepLibrary {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge, definitions: Vec::new(), target: Mutex::new(None) }
    }

    /// Registers a target URL. `url_spec` may contain `$argN`.
    pub fn given(&mut self, pattern: &str, url_spec: &str) -> Result<&mut Self, StepError> {
        self.push(pattern, StepKind::Given, Value::String(url_spec.to_string()))
    }

    /// Registers an action: `{"action": [verb, ...]}` or the bare array.
    pub fn when(&mut self, pattern: &str, descriptor: Value) -> Result<&mut Self, StepError> {
        let descriptor = match descriptor {
            Value::Array(action) => {
                let mut map = Map::new();
                map.insert("action".into(), Value::Array(action));
                Value::Object(map)
            }
            Value::Object(map) if matches!(map.get("action"), Some(Value::Array(_))) => {
                Value::Object(map)
            }
            other => {
                return Err(StepError::InvalidDescriptor(format!(
                    "when-descriptor needs an action array, got {other}"
                )))
            }
        };
        self.push(pattern, StepKind::When, descriptor)
    }

    /// Registers an expectation: an object such as
    /// `{"expectExistence": ["button", "$arg1"]}`, or `[name, ...args]`.
    pub fn then(&mut self, pattern: &str, descriptor: Value) -> Result<&mut Self, StepError> {
        let expectation = match descriptor {
            Value::Object(map) if !map.is_empty() => Some(map),
            Value::Array(parts) => match parts.split_first() {
                Some((Value::String(name), args)) => Some(named(name, args.to_vec())),
                _ => None,
            },
            Value::String(name) if !name.is_empty() => Some(named(&name, Vec::new())),
            _ => None,
        };
        let Some(expectation) = expectation else {
            return Err(StepError::InvalidDescriptor(
                "then-descriptor needs a named expectation".into(),
            ));
        };
        self.push(pattern, StepKind::Then, Value::Object(expectation))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// URL set by the last matched `given` step.
    pub fn target_url(&self) -> Option<String> {
        self.target.lock().clone()
    }

    /// Resolves `text` into the message it would send, without sending it.
    pub fn render(&self, text: &str) -> Option<Result<(StepKind, Message), ProtocolError>> {
        let (def, args) = self.resolve(text)?;
        Some(build(def, &args).map(|(message, _)| (def.kind, message)))
    }

    fn push(&mut self, pattern: &str, kind: StepKind, descriptor: Value) -> Result<&mut Self, StepError> {
        let regex = Regex::new(pattern).map_err(|source| StepError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        debug!(pattern, ?kind, "step definition");
        self.definitions.push(Definition { pattern: regex, kind, descriptor });
        Ok(self)
    }

    fn resolve(&self, text: &str) -> Option<(&Definition, Vec<String>)> {
        self.definitions.iter().find_map(|def| {
            let caps = def.pattern.captures(text)?;
            let args = caps
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect();
            Some((def, args))
        })
    }
}

/// Substitutes `args` into the definition and builds its message.
/// For `given`, also returns the resolved URL.
fn build(def: &Definition, args: &[String]) -> Result<(Message, Option<String>), ProtocolError> {
    let mut descriptor = def.descriptor.clone();
    substitute(args, &mut descriptor);
    match (def.kind, descriptor) {
        (StepKind::Given, Value::String(url)) => Ok((
            Message::action("navigate", [Value::String(url.clone())]),
            Some(url),
        )),
        (StepKind::When, Value::Object(mut map)) => {
            map.insert("type".into(), Value::String("action".into()));
            Ok((Message::parse(&Value::Object(map))?, None))
        }
        (StepKind::Then, Value::Object(map)) => {
            Ok((Message::Test { test: TestBody::Expectation(map) }, None))
        }
        (kind, other) => Err(ProtocolError::Violation(format!(
            "descriptor {other} does not fit a {kind:?} step"
        ))),
    }
}

fn named(name: &str, args: Vec<Value>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(name.to_string(), Value::Array(args));
    map
}

impl StepInterpreter for StepLibrary {
    fn interpret(&self, step: &Step, done: Completion) {
        let Some((def, args)) = self.resolve(&step.text) else {
            warn!(step = %step.text, "no step definition matches");
            done.fail(format!("no step definition matches {:?}", step.text));
            return;
        };
        match build(def, &args) {
            Ok((message, target)) => {
                if let Some(url) = target {
                    *self.target.lock() = Some(url);
                }
                info!(step = %step.text, kind = ?def.kind, message = message.kind(), "step");
                self.bridge.send_object(INTERACTION, message.to_value());
                done.succeed();
            }
            Err(e) => done.fail(e.to_string()),
        }
    }
}

impl std::fmt::Debug for StepLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepLibrary")
            .field("definitions", &self.definitions)
            .field("target", &self.target_url())
            .finish()
    }
}
