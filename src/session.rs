//! # Session: the test-author facade.
//!
//! A [`Session`] collects step definitions, injected scripts and features,
//! then drives one supervised sandbox through them.
//!
//! ```text
//! Session::run()
//!   ├─► report/testsuite channels registered on the Bridge
//!   ├─► Supervisor::launch ──► open ──► run
//!   ├─► SupervisedRun::started()
//!   ├─► Executor::run(features, StepLibrary)     lifecycle events
//!   │       └─► step ──► action/test message ──► mailbox ──► polled by the sandbox
//!   ├─► finish enqueued (or abort on failure)
//!   ├─► SupervisedRun::wait()
//!   └─► testsuiteFinished(Report), exactly once
//! ```
//!
//! `run` consumes the session: one run per session.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bridge::{Bridge, INTERACTION, REPORT, TESTSUITE};
use crate::collections::OrderedSet;
use crate::core::{Config, RunReport, Supervisor};
use crate::error::{BusError, CollectionError, ProtocolError, RunError, StepError};
use crate::events::lifecycle::{lifecycle_bus, TESTSUITE_FINISHED};
use crate::events::{EventBus, Invocations, Lifecycle, Report};
use crate::exec::{ExecSummary, Executor, Feature};
use crate::protocol::{Assertion, Message, Progress, TestBody};
use crate::sandbox::SandboxOptions;
use crate::steps::StepLibrary;
use crate::subscribers::{attach, Subscribe};

/// Assertions and protocol violations reported by the sandbox during a run.
#[derive(Default)]
struct Reported {
    assertions: Mutex<Vec<Assertion>>,
    violation: Mutex<Option<String>>,
    violated: CancellationToken,
}

/// Builder and driver of one test run.
///
/// # Example
/// ```no_run
/// use sandrun::{Config, Feature, Scenario, Session};
/// use serde_json::json;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = Session::new(Config::default());
/// session
///     .open_url(r"^I am on (\S+)$", "https://$arg1")?
///     .when(r"^I click at (\d+) (\d+)$", json!(["click", "$arg1", "$arg2"]))?
///     .then(r"^I see a (\w+) saying (.+)$", json!(["expectExistence", "$arg1", "$arg2"]))?;
/// session.source(
///     Feature::new("Search").scenario(
///         Scenario::new("Find it")
///             .step("I am on example.org")
///             .step("I click at 10 20")
///             .step("I see a button saying Search"),
///     ),
/// );
/// let report = session.run().await?;
/// std::process::exit(report.exit_code);
/// # }
/// ```
pub struct Session {
    cfg: Config,
    bridge: Arc<Bridge>,
    events: Arc<EventBus<Lifecycle>>,
    steps: StepLibrary,
    features: Vec<Feature>,
    inject: OrderedSet<PathBuf>,
    options: SandboxOptions,
}

impl Session {
    pub fn new(cfg: Config) -> Self {
        let bridge = Arc::new(Bridge::new());
        let mut inject = OrderedSet::new();
        for path in &cfg.inject_files {
            if let Err(e) = inject.add(path.clone()) {
                warn!(path = %path.display(), error = %e, "configured inject file skipped");
            }
        }
        Self {
            steps: StepLibrary::new(Arc::clone(&bridge)),
            events: Arc::new(lifecycle_bus("public-api")),
            bridge,
            features: Vec::new(),
            inject,
            options: SandboxOptions::default(),
            cfg,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The host bridge; extra channels can be registered before `run`.
    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    /// Adds a script the sandbox injects into the page. Duplicates are ignored.
    pub fn inject(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self, CollectionError> {
        self.inject.add(path.into())?;
        Ok(self)
    }

    /// Sets a `--name value` option for the sandbox process.
    pub fn option(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.options.set(name, value);
        self
    }

    /// Registers a `given` step navigating to `url_spec` (`$argN` substituted).
    pub fn open_url(&mut self, pattern: &str, url_spec: &str) -> Result<&mut Self, StepError> {
        self.steps.given(pattern, url_spec)?;
        Ok(self)
    }

    /// Registers a `when` step sending an action descriptor.
    pub fn when(&mut self, pattern: &str, descriptor: Value) -> Result<&mut Self, StepError> {
        self.steps.when(pattern, descriptor)?;
        Ok(self)
    }

    /// Registers a `then` step sending an expectation descriptor.
    pub fn then(&mut self, pattern: &str, descriptor: Value) -> Result<&mut Self, StepError> {
        self.steps.then(pattern, descriptor)?;
        Ok(self)
    }

    /// Appends a feature to run.
    pub fn source(&mut self, feature: Feature) -> &mut Self {
        self.features.push(feature);
        self
    }

    /// Listens to a lifecycle event.
    pub fn register<F>(
        &mut self,
        event: &str,
        handler: F,
        invocations: Invocations,
    ) -> Result<&mut Self, BusError>
    where
        F: Fn(&Lifecycle) + Send + Sync + 'static,
    {
        self.events.subscribe(event, handler, invocations)?;
        Ok(self)
    }

    /// Attaches a [`Subscribe`] implementation to the lifecycle events.
    pub fn subscribe(&mut self, sub: Arc<dyn Subscribe>) -> Result<&mut Self, BusError> {
        attach(&self.events, sub)?;
        Ok(self)
    }

    /// Runs every feature against a freshly spawned sandbox.
    ///
    /// Failures after the sandbox was requested end up in the returned
    /// [`Report`] (`ok == false`); `Err` is reserved for wiring errors on the
    /// event buses.
    pub async fn run(self) -> Result<Report, RunError> {
        let Session { mut cfg, bridge, events, steps, features, inject, options } = self;
        cfg.inject_files = inject.iter().cloned().collect();

        let reported = Arc::new(Reported::default());
        listen(&bridge, &reported)?;

        let testsuite = serde_json::to_value(&features).map_err(ProtocolError::from)?;
        let supervisor = Supervisor::new(cfg);
        let step_timeout = supervisor.config().step_timeout();

        let mut summary = ExecSummary::default();
        let mut failure: Option<RunError> = None;
        let mut exit_code = 1;

        match supervisor.launch("", testsuite, &options, Arc::clone(&bridge)) {
            Err(e) => {
                error!(error = %e, "sandbox could not be launched");
                failure = Some(e);
            }
            Ok(run) => {
                match run.started().await {
                    Err(e) => failure = Some(e),
                    Ok(()) => {
                        let executor = Executor::new(Arc::clone(&events)).with_step_timeout(step_timeout);
                        let executed = tokio::select! {
                            r = executor.run(&features, &steps) => r,
                            () = reported.violated.cancelled() => Err(reported.violation_error()),
                        };
                        summary = executor.summary();
                        match executed {
                            Ok(_) => {
                                debug!("all features executed, finishing");
                                bridge.send_object(INTERACTION, Message::Finish.to_value());
                            }
                            Err(e) => {
                                run.abort(e.as_message());
                                failure = Some(e);
                            }
                        }
                    }
                }

                let report = run.wait().await;
                exit_code = report.exit_code();
                if failure.is_none() && reported.violated.is_cancelled() {
                    failure = Some(reported.violation_error());
                }
                if failure.is_none() {
                    failure = verdict(report).err();
                }
            }
        }

        let assertions = std::mem::take(&mut *reported.assertions.lock());
        let mut report = Report {
            ok: false,
            features: summary.features,
            scenarios: summary.scenarios,
            steps: summary.steps,
            assertions,
            failure: failure.as_ref().map(RunError::as_message),
            exit_code,
        };
        report.ok = report.failure.is_none() && report.failed_assertions() == 0;
        if !report.ok && report.exit_code == 0 {
            report.exit_code = 1;
        }

        if report.ok {
            info!(steps = report.steps, assertions = report.assertions.len(), "testsuite passed");
        } else {
            warn!(
                failure = report.failure.as_deref().unwrap_or("assertions failed"),
                failed = report.failed_assertions(),
                "testsuite failed"
            );
        }
        events.dispatch(TESTSUITE_FINISHED, &Lifecycle::Finished(report.clone()))?;
        Ok(report)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("steps", &self.steps.len())
            .field("features", &self.features.len())
            .field("inject", &self.inject.len())
            .finish()
    }
}

impl Reported {
    fn violation_error(&self) -> RunError {
        let why = self
            .violation
            .lock()
            .clone()
            .unwrap_or_else(|| "unknown protocol violation".into());
        RunError::Protocol(ProtocolError::Violation(why))
    }
}

/// Wires the `report` and `testsuite` channels before the sandbox starts polling.
fn listen(bridge: &Bridge, reported: &Arc<Reported>) -> Result<(), BusError> {
    let sink = Arc::clone(reported);
    bridge.register_receiver(REPORT).on_message(move |payload: &Value| {
        match Message::parse(payload) {
            Ok(Message::Test { test: TestBody::Outcome(assertion) }) => {
                if assertion.passed() {
                    debug!(what = %assertion.what, "assertion passed");
                } else {
                    warn!(result = %assertion.describe(), "assertion failed");
                }
                sink.assertions.lock().push(assertion);
            }
            Ok(other) => debug!(kind = other.kind(), "report message ignored"),
            Err(e) => {
                error!(error = %e, "invalid report message");
                sink.violation.lock().get_or_insert_with(|| e.to_string());
                sink.violated.cancel();
            }
        }
    })?;

    bridge.register_receiver(TESTSUITE).on_message(|payload: &Value| {
        match serde_json::from_value::<Progress>(payload.clone()) {
            Ok(Progress::Started) => info!("testsuite started"),
            Ok(Progress::NextTestcase { tc }) => info!(testcase = ?tc, "next testcase"),
            Ok(Progress::Finished { success }) => info!(success, "testsuite finished"),
            Err(_) => debug!(%payload, "testsuite progress"),
        }
    })?;
    Ok(())
}

/// Turns the supervised outcome into the run's failure, if any.
fn verdict(report: RunReport) -> Result<(), RunError> {
    let code = report.exit_code();
    report.outcome.into_result()?;
    if code != 0 {
        return Err(RunError::ChildProcessFailure(format!("sandbox exited with code {code}")));
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::bridge::Envelope;
    use crate::core::shell_config;
    use crate::events::lifecycle::{AFTER_STEP, BEFORE_FEATURE};
    use crate::exec::Scenario;
    use crate::subscribers::ReportCollector;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Polls until `finish`, reporting one assertion per expectation.
    /// A reply to the report call may carry the next message.
    const SANDBOX: &str = r#"
read open; read run
echo '{"state":"browserStarted"}'
reply=''
while :; do
  case "$reply" in
    *finish*) break ;;
    *expectExistence*)
      echo '{"call":["report",{"type":"test","test":{"what":"button","expected":"Search","actual":"Search","state":"ok"}}]}'
      read reply
      continue ;;
  esac
  echo '{"call":["polling",null]}'
  read reply
done
echo '{"state":"browserFinished","message":"testsuite finished","success":true}'
"#;

    fn session(script: &str) -> Session {
        let mut session = Session::new(shell_config(script));
        session
            .open_url(r"^I am on (\S+)$", "https://$arg1")
            .unwrap()
            .when(r"^I click at (\d+) (\d+)$", json!(["click", "$arg1", "$arg2"]))
            .unwrap()
            .then(r"^I see a (\w+) saying (.+)$", json!(["expectExistence", "$arg1", "$arg2"]))
            .unwrap();
        session
    }

    fn search() -> Feature {
        Feature::new("Search").scenario(
            Scenario::new("Find it")
                .step("I am on example.org")
                .step("I click at 10 20")
                .step("I see a button saying Search"),
        )
    }

    #[tokio::test]
    async fn full_run_reports_once() {
        let mut session = session(SANDBOX);
        session.source(search());

        let steps = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&steps);
        session
            .register(AFTER_STEP, move |_| { s.fetch_add(1, Ordering::SeqCst); }, Invocations::Unlimited)
            .unwrap();
        let collector = Arc::new(ReportCollector::new());
        session.subscribe(collector.clone()).unwrap();

        let report = session.run().await.unwrap();
        assert!(report.ok, "{report:?}");
        assert_eq!(report.exit_code, 0);
        assert_eq!((report.features, report.scenarios, report.steps), (1, 1, 3));
        assert_eq!(report.assertions.len(), 1);
        assert_eq!(steps.load(Ordering::SeqCst), 3);
        assert_eq!(collector.deliveries(), 1);
        assert_eq!(collector.report(), Some(report));
    }

    #[tokio::test]
    async fn unmatched_step_fails_the_run() {
        let mut session = session(SANDBOX);
        session.source(Feature::new("Broken").scenario(
            Scenario::new("nope").step("I dance").step("I click at 1 2"),
        ));
        let features = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&features);
        session
            .register(BEFORE_FEATURE, move |_| { f.fetch_add(1, Ordering::SeqCst); }, Invocations::ONCE)
            .unwrap();

        let report = session.run().await.unwrap();
        assert!(!report.ok);
        assert_ne!(report.exit_code, 0);
        assert_eq!(report.steps, 0);
        assert!(report.failure.unwrap().contains("I dance"));
        assert_eq!(features.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_assertion_marks_report() {
        let script = SANDBOX.replace(r#""state":"ok""#, r#""state":"fail""#);
        let mut session = session(&script);
        session.source(search());

        let report = session.run().await.unwrap();
        assert!(!report.ok);
        assert!(report.failure.is_none());
        assert_eq!(report.failed_assertions(), 1);
        assert_eq!(report.exit_code, 1);
    }

    #[tokio::test]
    async fn browser_failure_reaches_report() {
        let script = r#"read open; read run; echo '{"state":"browserFailed","error":"no gpu"}'; exit 4"#;
        let mut session = session(script);
        session.source(search());

        let report = session.run().await.unwrap();
        assert!(!report.ok);
        assert_eq!(report.exit_code, 4);
        assert!(report.failure.unwrap().contains("no gpu"));
    }

    #[tokio::test]
    async fn missing_program_still_reports() {
        let mut cfg = Config::default();
        cfg.program = std::path::PathBuf::from("/nonexistent/sandrun-sandbox");
        let collector = Arc::new(ReportCollector::new());
        let mut session = Session::new(cfg);
        session.subscribe(collector.clone()).unwrap();

        let report = session.run().await.unwrap();
        assert!(!report.ok);
        assert_eq!(report.exit_code, 1);
        assert_eq!(collector.deliveries(), 1);
    }

    #[test]
    fn progress_and_reports_are_consumed_without_reply() {
        let bridge = Bridge::new();
        let reported = Arc::new(Reported::default());
        listen(&bridge, &reported).unwrap();

        for progress in [
            json!({"state": "started"}),
            json!({"state": "nextTestcase", "tc": "2"}),
            json!({"state": "nextTestcase"}),
            json!({"state": "finished", "success": true}),
        ] {
            assert_eq!(bridge.receive(Envelope::new(TESTSUITE, progress)), None);
        }
        assert!(!reported.violated.is_cancelled());

        let outcome = json!({"type": "test", "test": {"what": "title", "expected": "Home", "actual": "Home", "state": "ok"}});
        assert_eq!(bridge.receive(Envelope::new(REPORT, outcome)), None);
        assert_eq!(reported.assertions.lock().len(), 1);

        bridge.receive(Envelope::new(REPORT, json!({"type": "bogus"})));
        assert!(reported.violated.is_cancelled());
        assert!(matches!(reported.violation_error(), RunError::Protocol(_)));
    }

    #[test]
    fn inject_rejects_empty_and_dedups() {
        let mut session = Session::new(Config::default());
        session.inject("a.js").unwrap().inject("a.js").unwrap();
        assert!(session.inject("").is_err());
        assert_eq!(session.inject.len(), 1);
    }
}
