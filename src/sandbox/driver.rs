//! Applies bridge messages to a [`Renderer`].

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::SandboxError;
use crate::protocol::{Action, Assertion, AssertionState, Message, TestBody};
use crate::renderer::Renderer;

/// Page-side entry point that checks an expectation and returns its outcome.
const CHECK_HOOK: &str = "window.testsuiteRunner.check";

/// What applying one message produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Executed; nothing to report.
    Done,
    /// An assertion was checked.
    Checked(Assertion),
    /// `finish` arrived.
    Finished,
}

/// Executes `action`/`test`/`finish` messages and records assertion outcomes.
pub struct MessageDriver<R> {
    renderer: R,
    assertions: Vec<Assertion>,
}

impl<R: Renderer> MessageDriver<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer, assertions: Vec::new() }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn failed(&self) -> usize {
        self.assertions.iter().filter(|a| !a.passed()).count()
    }

    pub async fn apply(&mut self, message: &Message) -> Result<Applied, SandboxError> {
        match message {
            Message::Action { action } => {
                self.act(Action::from_parts(action)?).await?;
                Ok(Applied::Done)
            }
            Message::Test { test: TestBody::Outcome(assertion) } => Ok(self.record(assertion.clone())),
            Message::Test { test: TestBody::Expectation(expectation) } => {
                let script = format!("{CHECK_HOOK}({})", Value::Object(expectation.clone()));
                let result = self.renderer.evaluate(&script).await?;
                match verdict(expectation, result) {
                    Some(assertion) => Ok(self.record(assertion)),
                    None => {
                        debug!(?expectation, "expectation produced no verdict");
                        Ok(Applied::Done)
                    }
                }
            }
            Message::Finish => Ok(Applied::Finished),
        }
    }

    async fn act(&self, action: Action) -> Result<(), SandboxError> {
        debug!(?action, "apply");
        match action {
            Action::Navigate(url) => self.renderer.navigate(&url).await,
            Action::Input { event, params } => self.renderer.send_event(&event, &params).await,
            Action::Screenshot(suffix) => {
                let file = Action::screenshot_file(suffix.as_deref());
                info!(%file, "screenshot");
                self.renderer.screenshot(&file).await
            }
            Action::Evaluate(script) => {
                let result = self.renderer.evaluate(&script).await?;
                debug!(%result, "evaluated");
                Ok(())
            }
            Action::Inject(path) => self.renderer.inject_script(&path).await,
        }
    }

    fn record(&mut self, assertion: Assertion) -> Applied {
        info!(passed = assertion.passed(), "{}", assertion.describe());
        self.assertions.push(assertion.clone());
        Applied::Checked(assertion)
    }
}

/// Reads the page's answer to an expectation: a full assertion, or
/// `{"success": bool}` which is attributed to the expectation's first entry.
fn verdict(expectation: &Map<String, Value>, result: Value) -> Option<Assertion> {
    if let Ok(assertion) = serde_json::from_value::<Assertion>(result.clone()) {
        return Some(assertion);
    }
    let success = result.get("success")?.as_bool()?;
    let (what, expected) = expectation.iter().next()?;
    Some(Assertion {
        what: what.clone(),
        expected: expected.clone(),
        actual: None,
        state: if success { AssertionState::Ok } else { AssertionState::Fail },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::Recorder;
    use serde_json::json;

    fn parse(v: Value) -> Message {
        Message::parse(&v).unwrap()
    }

    #[tokio::test]
    async fn actions_reach_the_renderer() {
        let mut driver = MessageDriver::new(Recorder::default());
        for m in [
            json!({"type": "action", "action": ["open", "http://a/"]}),
            json!({"type": "action", "action": ["click", 10, 20]}),
            json!({"type": "action", "action": ["screenshot", "home"]}),
            json!({"type": "action", "action": ["inject", "extra.js"]}),
        ] {
            assert_eq!(driver.apply(&parse(m)).await.unwrap(), Applied::Done);
        }
        assert_eq!(
            *driver.renderer().calls.lock(),
            vec![
                "navigate http://a/",
                "click [10,20]",
                "screenshot screenshot-home.png",
                "inject extra.js",
            ]
        );
    }

    #[tokio::test]
    async fn unknown_verb_is_a_protocol_error() {
        let mut driver = MessageDriver::new(Recorder::default());
        let err = driver
            .apply(&parse(json!({"type": "action", "action": ["teleport"]})))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "sandbox_protocol");
    }

    #[tokio::test]
    async fn expectation_is_checked_in_the_page() {
        let renderer = Recorder::default();
        *renderer.answer.lock() = json!({"success": false});
        let mut driver = MessageDriver::new(renderer);

        let applied = driver
            .apply(&parse(json!({"type": "test", "test": {"expectResult": ["rust"]}})))
            .await
            .unwrap();

        let Applied::Checked(a) = applied else { panic!("expected a verdict") };
        assert_eq!(a.what, "expectResult");
        assert_eq!(a.state, AssertionState::Fail);
        assert_eq!(driver.failed(), 1);
        assert!(driver.renderer().calls.lock()[0].starts_with("evaluate window.testsuiteRunner.check("));
    }

    #[tokio::test]
    async fn silent_page_gives_no_verdict() {
        let mut driver = MessageDriver::new(Recorder::default());
        let applied = driver
            .apply(&parse(json!({"type": "test", "test": {"expectExistence": ["button"]}})))
            .await
            .unwrap();
        assert_eq!(applied, Applied::Done);
        assert!(driver.assertions().is_empty());
    }

    #[tokio::test]
    async fn finish_ends_the_run() {
        let mut driver = MessageDriver::new(Recorder::default());
        assert_eq!(driver.apply(&Message::Finish).await.unwrap(), Applied::Finished);
    }
}
