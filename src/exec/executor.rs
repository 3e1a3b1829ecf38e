//! # Sequential lifecycle executor.
//!
//! ## Event flow
//!
//! ```text
//! beforeFeature ─► [ beforeScenario ─► [ beforeStep ─► interpret ─► await ─► afterStep ]* ─► afterScenario ]* ─► afterFeature
//! ```
//!
//! ## Rules
//! - Exactly one before/after pair per entity; the after-event fires even
//!   when the body failed.
//! - The first failing step aborts every later step, scenario and feature.
//! - Awaiting a step's [`Completion`] is the only suspension point.
//! - With a step timeout, a step that does not complete in time fails.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time;
use tracing::{debug, info, warn};

use super::{Completion, Feature, Scenario, Step};
use crate::error::RunError;
use crate::events::lifecycle::{
    AFTER_FEATURE, AFTER_SCENARIO, AFTER_STEP, BEFORE_FEATURE, BEFORE_SCENARIO, BEFORE_STEP,
};
use crate::events::{EventBus, Lifecycle};

/// Turns step text into work and fires the completion when done.
///
/// The completion may be fired before `interpret` returns or handed to
/// another task and fired later.
pub trait StepInterpreter: Send + Sync {
    fn interpret(&self, step: &Step, done: Completion);
}

/// Where the executor currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Idle,
    RunningFeature,
    RunningScenario,
    RunningStep,
    Done,
    Aborted,
}

/// Counts of entities that ran to completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecSummary {
    pub features: usize,
    pub scenarios: usize,
    pub steps: usize,
}

#[derive(Debug)]
struct Tracker {
    state: ExecState,
    summary: ExecSummary,
}

/// Walks features and emits lifecycle events on `events`.
pub struct Executor {
    events: Arc<EventBus<Lifecycle>>,
    step_timeout: Option<Duration>,
    tracker: Mutex<Tracker>,
}

impl Executor {
    pub fn new(events: Arc<EventBus<Lifecycle>>) -> Self {
        Self {
            events,
            step_timeout: None,
            tracker: Mutex::new(Tracker { state: ExecState::Idle, summary: ExecSummary::default() }),
        }
    }

    /// Fails any step whose completion takes longer than `timeout`.
    /// `Duration::ZERO` disables the limit.
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout.filter(|d| *d > Duration::ZERO);
        self
    }

    pub fn state(&self) -> ExecState {
        self.tracker.lock().state
    }

    /// Entities completed so far; also meaningful after a failure.
    pub fn summary(&self) -> ExecSummary {
        self.tracker.lock().summary
    }

    /// Runs every feature in order.
    pub async fn run(
        &self,
        features: &[Feature],
        interpreter: &dyn StepInterpreter,
    ) -> Result<ExecSummary, RunError> {
        *self.tracker.lock() = Tracker { state: ExecState::Idle, summary: ExecSummary::default() };

        for feature in features {
            if let Err(e) = self.run_feature(feature, interpreter).await {
                self.set_state(ExecState::Aborted);
                warn!(feature = %feature.title, error = %e.as_message(), "run aborted");
                return Err(e);
            }
        }
        self.set_state(ExecState::Done);
        Ok(self.summary())
    }

    async fn run_feature(
        &self,
        feature: &Feature,
        interpreter: &dyn StepInterpreter,
    ) -> Result<(), RunError> {
        self.set_state(ExecState::RunningFeature);
        let payload = Lifecycle::Feature { title: feature.title.clone() };
        self.emit(BEFORE_FEATURE, &payload)?;

        let mut body = Ok(());
        for scenario in &feature.scenarios {
            body = self.run_scenario(feature, scenario, interpreter).await;
            if body.is_err() {
                break;
            }
        }

        self.emit(AFTER_FEATURE, &payload)?;
        body?;
        self.tracker.lock().summary.features += 1;
        Ok(())
    }

    async fn run_scenario(
        &self,
        feature: &Feature,
        scenario: &Scenario,
        interpreter: &dyn StepInterpreter,
    ) -> Result<(), RunError> {
        self.set_state(ExecState::RunningScenario);
        let payload = Lifecycle::Scenario {
            feature: feature.title.clone(),
            title: scenario.title.clone(),
        };
        self.emit(BEFORE_SCENARIO, &payload)?;

        let mut body = Ok(());
        for step in &scenario.steps {
            body = self.run_step(scenario, step, interpreter).await;
            if body.is_err() {
                break;
            }
        }

        self.emit(AFTER_SCENARIO, &payload)?;
        body?;
        self.tracker.lock().summary.scenarios += 1;
        Ok(())
    }

    async fn run_step(
        &self,
        scenario: &Scenario,
        step: &Step,
        interpreter: &dyn StepInterpreter,
    ) -> Result<(), RunError> {
        self.set_state(ExecState::RunningStep);
        let payload = Lifecycle::Step {
            scenario: scenario.title.clone(),
            text: step.text.clone(),
        };
        self.emit(BEFORE_STEP, &payload)?;

        let (done, pending) = Completion::pair();
        interpreter.interpret(step, done);

        let outcome = if let Some(dur) = self.step_timeout {
            match time::timeout(dur, pending.wait()).await {
                Ok(r) => r,
                Err(_elapsed) => Err(format!("step did not complete within {dur:?}")),
            }
        } else {
            pending.wait().await
        };

        self.emit(AFTER_STEP, &payload)?;
        match outcome {
            Ok(()) => {
                self.tracker.lock().summary.steps += 1;
                debug!(step = %step.text, "step done");
                Ok(())
            }
            Err(reason) => Err(RunError::StepFailure { step: step.text.clone(), reason }),
        }
    }

    fn emit(&self, event: &str, payload: &Lifecycle) -> Result<(), RunError> {
        let delivered = self.events.dispatch(event, payload)?;
        if !delivered {
            debug!(event, subject = payload.subject(), "no listener");
        }
        Ok(())
    }

    fn set_state(&self, state: ExecState) {
        let mut tracker = self.tracker.lock();
        if tracker.state != state {
            info!(from = ?tracker.state, to = ?state, "executor");
            tracker.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::lifecycle::{lifecycle_bus, LIFECYCLE_EVENTS};

    /// Fails steps whose text contains "broken", drops those containing "lost",
    /// holds those containing "stuck".
    struct Scripted {
        held: Mutex<Vec<Completion>>,
    }

    impl Scripted {
        fn new() -> Self {
            Self { held: Mutex::new(Vec::new()) }
        }
    }

    impl StepInterpreter for Scripted {
        fn interpret(&self, step: &Step, done: Completion) {
            if step.text.contains("broken") {
                done.fail("it broke");
            } else if step.text.contains("lost") {
                drop(done);
            } else if step.text.contains("stuck") {
                self.held.lock().push(done);
            } else {
                done.succeed();
            }
        }
    }

    fn recorded() -> (Arc<EventBus<Lifecycle>>, Arc<Mutex<Vec<String>>>) {
        let bus = Arc::new(lifecycle_bus("test"));
        let log = Arc::new(Mutex::new(Vec::new()));
        for event in LIFECYCLE_EVENTS {
            let log = Arc::clone(&log);
            bus.on(event, move |p: &Lifecycle| log.lock().push(format!("{event}:{}", p.subject())))
                .unwrap();
        }
        (bus, log)
    }

    fn feature(title: &str, scenarios: Vec<(&str, Vec<&str>)>) -> Feature {
        scenarios.into_iter().fold(Feature::new(title), |f, (s, steps)| {
            f.scenario(steps.into_iter().fold(Scenario::new(s), |sc, t| sc.step(t)))
        })
    }

    #[tokio::test]
    async fn emits_nested_lifecycle_in_order() {
        let (bus, log) = recorded();
        let exec = Executor::new(bus);
        let features = [feature("F", vec![("S1", vec!["a", "b"]), ("S2", vec!["c"])])];

        let summary = exec.run(&features, &Scripted::new()).await.unwrap();

        assert_eq!(summary, ExecSummary { features: 1, scenarios: 2, steps: 3 });
        assert_eq!(exec.state(), ExecState::Done);
        assert_eq!(
            *log.lock(),
            vec![
                "beforeFeature:F",
                "beforeScenario:S1",
                "beforeStep:a",
                "afterStep:a",
                "beforeStep:b",
                "afterStep:b",
                "afterScenario:S1",
                "beforeScenario:S2",
                "beforeStep:c",
                "afterStep:c",
                "afterScenario:S2",
                "afterFeature:F",
            ]
        );
    }

    #[tokio::test]
    async fn failure_stops_later_siblings_but_closes_open_entities() {
        let (bus, log) = recorded();
        let exec = Executor::new(bus);
        let features = [
            feature("F1", vec![("S1", vec!["a", "broken", "never"]), ("S2", vec!["never"])]),
            feature("F2", vec![("S3", vec!["never"])]),
        ];

        let err = exec.run(&features, &Scripted::new()).await.unwrap_err();

        assert!(matches!(&err, RunError::StepFailure { step, reason } if step == "broken" && reason == "it broke"));
        assert_eq!(exec.state(), ExecState::Aborted);
        assert_eq!(exec.summary(), ExecSummary { features: 0, scenarios: 0, steps: 1 });
        assert_eq!(
            *log.lock(),
            vec![
                "beforeFeature:F1",
                "beforeScenario:S1",
                "beforeStep:a",
                "afterStep:a",
                "beforeStep:broken",
                "afterStep:broken",
                "afterScenario:S1",
                "afterFeature:F1",
            ]
        );
    }

    #[tokio::test]
    async fn dropped_completion_fails_the_step() {
        let (bus, _) = recorded();
        let exec = Executor::new(bus);
        let err = exec
            .run(&[feature("F", vec![("S", vec!["lost"])])], &Scripted::new())
            .await
            .unwrap_err();
        assert!(err.is_test_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn step_timeout_fails_a_stuck_step() {
        let (bus, log) = recorded();
        let exec = Executor::new(bus).with_step_timeout(Some(Duration::from_secs(2)));
        let err = exec
            .run(&[feature("F", vec![("S", vec!["stuck"])])], &Scripted::new())
            .await
            .unwrap_err();
        assert!(err.as_message().contains("did not complete"));
        assert!(log.lock().contains(&"afterStep:stuck".to_string()));
    }

    #[tokio::test]
    async fn completion_fired_from_another_task() {
        struct Later;
        impl StepInterpreter for Later {
            fn interpret(&self, _: &Step, done: Completion) {
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    done.succeed();
                });
            }
        }
        let exec = Executor::new(Arc::new(lifecycle_bus("test")));
        let summary = exec
            .run(&[feature("F", vec![("S", vec!["x", "y"])])], &Later)
            .await
            .unwrap();
        assert_eq!(summary.steps, 2);
    }

    #[tokio::test]
    async fn empty_run_is_done() {
        let exec = Executor::new(Arc::new(lifecycle_bus("test")));
        assert_eq!(exec.state(), ExecState::Idle);
        assert_eq!(exec.run(&[], &Scripted::new()).await.unwrap(), ExecSummary::default());
        assert_eq!(exec.state(), ExecState::Done);
    }
}
