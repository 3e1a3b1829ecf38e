//! # Run lifecycle vocabulary.
//!
//! The seven events a test author can listen to, the [`Lifecycle`] payload
//! they carry and the final [`Report`].
//!
//! ```text
//! beforeFeature(F)
//!   beforeScenario(S1)
//!     beforeStep(s1a) afterStep(s1a)
//!     beforeStep(s1b) afterStep(s1b)
//!   afterScenario(S1)
//!   ...
//! afterFeature(F)
//! ...
//! testsuiteFinished(Report)          exactly once per run
//! ```

use serde::{Deserialize, Serialize};

use super::EventBus;
use crate::protocol::{Assertion, AssertionState};

pub const BEFORE_STEP: &str = "beforeStep";
pub const AFTER_STEP: &str = "afterStep";
pub const BEFORE_SCENARIO: &str = "beforeScenario";
pub const AFTER_SCENARIO: &str = "afterScenario";
pub const BEFORE_FEATURE: &str = "beforeFeature";
pub const AFTER_FEATURE: &str = "afterFeature";
pub const TESTSUITE_FINISHED: &str = "testsuiteFinished";

/// Every lifecycle event name.
pub const LIFECYCLE_EVENTS: [&str; 7] = [
    BEFORE_STEP,
    AFTER_STEP,
    BEFORE_SCENARIO,
    AFTER_SCENARIO,
    BEFORE_FEATURE,
    AFTER_FEATURE,
    TESTSUITE_FINISHED,
];

/// Payload of a lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum Lifecycle {
    /// `beforeFeature` / `afterFeature`.
    Feature { title: String },
    /// `beforeScenario` / `afterScenario`.
    Scenario { feature: String, title: String },
    /// `beforeStep` / `afterStep`.
    Step { scenario: String, text: String },
    /// `testsuiteFinished`.
    Finished(Report),
}

impl Lifecycle {
    /// Short human-readable subject (title, step text or verdict).
    pub fn subject(&self) -> &str {
        match self {
            Lifecycle::Feature { title } | Lifecycle::Scenario { title, .. } => title,
            Lifecycle::Step { text, .. } => text,
            Lifecycle::Finished(r) => {
                if r.ok {
                    "ok"
                } else {
                    "failed"
                }
            }
        }
    }
}

/// Builds an [`EventBus`] accepting exactly the lifecycle vocabulary.
pub fn lifecycle_bus(owner: &str) -> EventBus<Lifecycle> {
    match EventBus::new(owner, LIFECYCLE_EVENTS) {
        Ok(bus) => bus,
        // the vocabulary is a non-empty constant
        Err(_) => unreachable!("lifecycle vocabulary contains no empty names"),
    }
}

/// Final report of a run, delivered once through `testsuiteFinished`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Overall verdict.
    pub ok: bool,
    /// Features fully executed.
    pub features: usize,
    /// Scenarios fully executed.
    pub scenarios: usize,
    /// Steps whose completion fired successfully.
    pub steps: usize,
    /// Assertion outcomes reported by the sandbox.
    pub assertions: Vec<Assertion>,
    /// First failure cause, if any.
    pub failure: Option<String>,
    /// Status for the host process to exit with (0 only when `ok`).
    #[serde(default)]
    pub exit_code: i32,
}

impl Report {
    /// Number of failed assertions.
    pub fn failed_assertions(&self) -> usize {
        self.assertions
            .iter()
            .filter(|a| a.state == AssertionState::Fail)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_bus_accepts_all_seven() {
        let bus = lifecycle_bus("public-api");
        assert_eq!(bus.vocabulary().len(), 7);
        for name in LIFECYCLE_EVENTS {
            assert!(bus.accepts(name), "{name}");
        }
        assert!(!bus.accepts("browserStarted"));
    }

    #[test]
    fn subject_of_each_payload() {
        let f = Lifecycle::Feature { title: "Search".into() };
        let s = Lifecycle::Step { scenario: "x".into(), text: "click enter".into() };
        assert_eq!(f.subject(), "Search");
        assert_eq!(s.subject(), "click enter");
        assert_eq!(Lifecycle::Finished(Report::default()).subject(), "failed");
    }
}
