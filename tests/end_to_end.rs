//! Host and sandbox wired together in one process: the sandbox's callback
//! calls straight into the host bridge instead of going through stdio.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use sandrun::bridge::{HostCallback, INTERACTION, REPORT, TESTSUITE};
use sandrun::events::lifecycle::{
    lifecycle_bus, AFTER_FEATURE, AFTER_SCENARIO, AFTER_STEP, BEFORE_FEATURE, BEFORE_SCENARIO,
    BEFORE_STEP,
};
use sandrun::protocol::{Progress, TestBody};
use sandrun::{
    Bridge, ChildState, ControlMessage, Envelope, Executor, Feature, Lifecycle, Message,
    OutcomeTracker, Renderer, RunOutcome, RunReport, SandboxError, SandboxOptions, SandboxPeer,
    SandboxRunner, Scenario, StepLibrary,
};

/// Page double: logs every call, answers scripts with `answer`.
#[derive(Default)]
struct Page {
    calls: Mutex<Vec<String>>,
    answer: Value,
    unreachable: bool,
}

#[async_trait]
impl Renderer for Page {
    async fn navigate(&self, url: &str) -> Result<(), SandboxError> {
        self.calls.lock().push(format!("navigate {url}"));
        if self.unreachable {
            return Err(SandboxError::Renderer(format!("{url} unreachable")));
        }
        Ok(())
    }
    async fn evaluate(&self, script: &str) -> Result<Value, SandboxError> {
        self.calls.lock().push(format!("evaluate {script}"));
        Ok(self.answer.clone())
    }
    async fn inject_script(&self, path: &Path) -> Result<(), SandboxError> {
        self.calls.lock().push(format!("inject {}", path.display()));
        Ok(())
    }
    async fn screenshot(&self, file: &str) -> Result<(), SandboxError> {
        self.calls.lock().push(format!("screenshot {file}"));
        Ok(())
    }
    async fn send_event(&self, event: &str, params: &[Value]) -> Result<(), SandboxError> {
        self.calls.lock().push(format!("{event} {}", Value::Array(params.to_vec())));
        Ok(())
    }
}

/// Callback straight into the host; states land in the host's tracker.
struct InProcess {
    host: Arc<Bridge>,
    tracker: Arc<OutcomeTracker>,
}

impl HostCallback for InProcess {
    fn call(&mut self, envelope: Envelope) -> Result<Option<Envelope>, SandboxError> {
        Ok(self.host.receive(envelope))
    }
    fn notify(&mut self, state: ChildState) -> Result<(), SandboxError> {
        self.tracker.apply(&state);
        Ok(())
    }
}

struct Rig {
    host: Arc<Bridge>,
    tracker: Arc<OutcomeTracker>,
    runner: SandboxRunner<Page, InProcess>,
}

fn rig(page: Page) -> Rig {
    let host = Arc::new(Bridge::new());
    let tracker = Arc::new(OutcomeTracker::new());
    let peer = Arc::new(SandboxPeer::new(InProcess {
        host: Arc::clone(&host),
        tracker: Arc::clone(&tracker),
    }));
    let options = SandboxOptions::parse(["--pollInterval", "2"]).unwrap();
    let runner = SandboxRunner::new(page, peer, options);
    Rig { host, tracker, runner }
}

async fn open(runner: &mut SandboxRunner<Page, InProcess>, url: &str) {
    let open = ControlMessage::Open { url: url.into(), inject_files: vec![] };
    assert_eq!(runner.handle_control(open).await.unwrap(), None);
}

async fn run(runner: &mut SandboxRunner<Page, InProcess>) -> ChildState {
    runner
        .handle_control(ControlMessage::Run { testsuite: Value::Null })
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn step_action_reaches_the_page_and_finish_succeeds() {
    let mut rig = rig(Page::default());
    open(&mut rig.runner, "http://example.test/").await;

    let mut steps = StepLibrary::new(Arc::clone(&rig.host));
    steps.when("^click enter$", json!(["key", "enter"])).unwrap();
    let features = [Feature::new("Search").scenario(Scenario::new("Enter").step("click enter"))];
    Executor::new(Arc::new(lifecycle_bus("public-api")))
        .run(&features, &steps)
        .await
        .unwrap();

    assert_eq!(rig.host.pending(), 1);
    rig.host.send_object(INTERACTION, Message::Finish.to_value());

    let state = run(&mut rig.runner).await;
    assert!(matches!(state, ChildState::BrowserFinished { success: true, .. }));
    assert!(rig.tracker.current().is_success());

    let calls = rig.runner.driver().renderer().calls.lock().clone();
    assert_eq!(calls, vec!["navigate http://example.test/", r#"keypress ["enter"]"#]);
}

#[tokio::test]
async fn action_payload_is_substituted_before_queueing() {
    let host = Arc::new(Bridge::new());
    let mut steps = StepLibrary::new(Arc::clone(&host));
    steps
        .when(r"^I type (\w+) into (\w+)$", json!({"action": ["keypress", "$arg1", {"field": "$arg2"}]}))
        .unwrap();
    let features = [Feature::new("F").scenario(Scenario::new("S").step("I type rust into search"))];
    Executor::new(Arc::new(lifecycle_bus("public-api")))
        .run(&features, &steps)
        .await
        .unwrap();

    let queued = host.drain();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].channel(), INTERACTION);
    assert_eq!(
        *queued[0].payload(),
        json!({"type": "action", "action": ["keypress", "rust", {"field": "search"}]})
    );
}

#[tokio::test]
async fn lifecycle_order_over_the_whole_run() {
    let events = Arc::new(lifecycle_bus("public-api"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    for name in [BEFORE_FEATURE, AFTER_FEATURE, BEFORE_SCENARIO, AFTER_SCENARIO, BEFORE_STEP, AFTER_STEP] {
        let seen = Arc::clone(&seen);
        events
            .on(name, move |p: &Lifecycle| seen.lock().push(format!("{name}({})", p.subject())))
            .unwrap();
    }

    let host = Arc::new(Bridge::new());
    let mut steps = StepLibrary::new(Arc::clone(&host));
    steps.when("^s", json!(["click", 1, 1])).unwrap();
    let features = [Feature::new("F")
        .scenario(Scenario::new("S1").step("s1a").step("s1b"))
        .scenario(Scenario::new("S2").step("s2a"))];
    Executor::new(events).run(&features, &steps).await.unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            "beforeFeature(F)",
            "beforeScenario(S1)",
            "beforeStep(s1a)",
            "afterStep(s1a)",
            "beforeStep(s1b)",
            "afterStep(s1b)",
            "afterScenario(S1)",
            "beforeScenario(S2)",
            "beforeStep(s2a)",
            "afterStep(s2a)",
            "afterScenario(S2)",
            "afterFeature(F)",
        ]
    );
    assert_eq!(host.pending(), 3);
}

#[tokio::test]
async fn expectation_outcome_and_progress_come_back() {
    let mut rig = rig(Page { answer: json!({"success": true}), ..Page::default() });

    let assertions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&assertions);
    rig.host
        .register_receiver(REPORT)
        .on_message(move |payload: &Value| {
            if let Ok(Message::Test { test: TestBody::Outcome(a) }) = Message::parse(payload) {
                sink.lock().push(a);
            }
        })
        .unwrap();
    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);
    rig.host
        .register_receiver(TESTSUITE)
        .on_message(move |payload: &Value| {
            sink.lock().push(serde_json::from_value::<Progress>(payload.clone()).unwrap());
        })
        .unwrap();

    open(&mut rig.runner, "http://example.test/").await;
    let mut steps = StepLibrary::new(Arc::clone(&rig.host));
    steps
        .then(r"^I see a (\w+) saying (\w+)$", json!(["expectExistence", "$arg1", "$arg2"]))
        .unwrap();
    let features = [Feature::new("F").scenario(Scenario::new("S").step("I see a button saying Go"))];
    Executor::new(Arc::new(lifecycle_bus("public-api")))
        .run(&features, &steps)
        .await
        .unwrap();
    rig.host.send_object(INTERACTION, Message::Finish.to_value());

    let state = run(&mut rig.runner).await;
    assert!(matches!(state, ChildState::BrowserFinished { success: true, .. }));

    let assertions = assertions.lock();
    assert_eq!(assertions.len(), 1);
    assert!(assertions[0].passed());
    assert_eq!(assertions[0].what, "expectExistence");
    assert_eq!(assertions[0].expected, json!(["button", "Go"]));
    assert_eq!(
        *progress.lock(),
        vec![Progress::Started, Progress::Finished { success: true }]
    );
}

#[tokio::test]
async fn unreachable_page_fails_and_later_states_are_ignored() {
    let mut rig = rig(Page { unreachable: true, ..Page::default() });
    open(&mut rig.runner, "http://example.test/").await;

    let state = run(&mut rig.runner).await;
    assert!(matches!(state, ChildState::BrowserFailed { .. }));

    let late = ChildState::BrowserFinished { message: "late".into(), success: true };
    assert!(!rig.tracker.apply(&late));
    let outcome = rig.tracker.current();
    assert!(matches!(outcome, RunOutcome::Failed(_)));

    let report = RunReport { outcome, exit_status: Some(0) };
    assert_ne!(report.exit_code(), 0);
}

#[tokio::test]
async fn run_before_open_is_rejected() {
    let mut rig = rig(Page::default());
    let err = rig
        .runner
        .handle_control(ControlMessage::Run { testsuite: Value::Null })
        .await
        .unwrap_err();
    assert_eq!(err.as_label(), "sandbox_not_opened");
}

#[test]
fn unregistered_channel_is_dropped_without_reply() {
    let host = Bridge::new();
    host.send_object(INTERACTION, json!({"type": "finish"}));
    assert_eq!(host.receive(Envelope::new("nowhere", json!({"x": 1}))), None);
    assert_eq!(host.pending(), 1);
}
