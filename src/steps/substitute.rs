use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"\$arg(\d+)") {
        Ok(re) => re,
        Err(_) => unreachable!("placeholder pattern is valid"),
    }
});

/// Replaces every `$argN` (1-based) in every string leaf of `value`.
///
/// Arrays and objects are walked recursively; numbers, booleans and null are
/// left alone. A placeholder past the end of `args` becomes the empty string.
/// Inserted text is not scanned again.
///
/// # Example
/// ```
/// use serde_json::json;
/// use sandrun::steps::substitute;
///
/// let mut v = json!({"action": ["click", "$arg1"], "n": 3});
/// substitute(&["enter".to_string()], &mut v);
/// assert_eq!(v, json!({"action": ["click", "enter"], "n": 3}));
/// ```
pub fn substitute(args: &[String], value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(replaced) = expand(args, s) {
                *s = replaced;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| substitute(args, v)),
        Value::Object(map) => map.values_mut().for_each(|v| substitute(args, v)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn expand(args: &[String], text: &str) -> Option<String> {
    if !PLACEHOLDER.is_match(text) {
        return None;
    }
    let replaced = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| args.get(i))
            .cloned()
            .unwrap_or_default()
    });
    Some(replaced.into_owned())
}
