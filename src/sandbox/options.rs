//! Sandbox command line options: `--name value` pairs.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SandboxError;

/// Options passed to the sandbox on its command line.
///
/// - `--name value` sets `name`; `--name` alone (or followed by another
///   `--option`) sets it to `true`.
/// - `true`/`false` become booleans, all-digit values integers, anything
///   else a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SandboxOptions(Map<String, Value>);

impl SandboxOptions {
    /// Parses `args`; a value without a preceding `--name` is rejected.
    ///
    /// # Example
    /// ```
    /// use sandrun::SandboxOptions;
    /// use serde_json::json;
    ///
    /// let opts = SandboxOptions::parse(["--webSecurityEnabled", "false", "--verbose"]).unwrap();
    /// assert_eq!(opts.get("webSecurityEnabled"), Some(&json!(false)));
    /// assert!(opts.flag("verbose"));
    /// ```
    pub fn parse<I, S>(args: I) -> Result<Self, SandboxError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Map::new();
        let mut pending: Option<String> = None;
        for arg in args {
            let arg = arg.as_ref();
            if let Some(name) = arg.strip_prefix("--") {
                if let Some(prev) = pending.replace(name.to_string()) {
                    map.insert(prev, Value::Bool(true));
                }
            } else {
                let Some(name) = pending.take() else {
                    return Err(SandboxError::UnassignedParameter(arg.to_string()));
                };
                map.insert(name, convert(arg));
            }
        }
        if let Some(name) = pending {
            map.insert(name, Value::Bool(true));
        }
        Ok(Self(map))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// True only for a boolean `true`.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(Value::Bool(true)))
    }

    pub fn integer(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(Value::as_u64)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders back into `--name value` arguments, for spawning a sandbox.
    pub fn to_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.0.len() * 2);
        for (name, value) in &self.0 {
            out.push(format!("--{name}"));
            match value {
                Value::String(s) => out.push(s.clone()),
                Value::Bool(true) => {}
                other => out.push(other.to_string()),
            }
        }
        out
    }
}

fn convert(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(digits.to_string())),
        other => Value::String(other.to_string()),
    }
}
