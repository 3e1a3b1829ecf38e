//! # Step definitions.
//!
//! [`StepLibrary`] maps step text to bridge messages through regular
//! expressions. Capture groups become `$arg1`, `$arg2`, ... and are
//! [`substitute`]d into the registered descriptor before it is sent.
//!
//! ```text
//! given("open (.*)",            "http://$arg1/")                 ──► ["navigate", url]
//! when("click '(.*?)'",         {"action": ["click", "$arg1"]}) ──► {"type":"action", ...}
//! then("'(.*?)' button exists", ["expectExistence", "button", "$arg1"])
//!                                                               ──► {"type":"test","test":{...}}
//! ```

mod library;
mod substitute;

pub use library::{StepKind, StepLibrary};
pub use substitute::substitute;
