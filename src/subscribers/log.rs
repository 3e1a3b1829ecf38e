//! # LogWriter: lifecycle events through `tracing`.
//!
//! ## Example output
//! ```text
//! INFO  sandrun::lifecycle: [feature] title="Search"
//! INFO  sandrun::lifecycle: [scenario] feature="Search" title="Find the crate"
//! DEBUG sandrun::lifecycle: [step] scenario="Find the crate" text="When I enter 'rust'"
//! DEBUG sandrun::lifecycle: [step-done] scenario="Find the crate" text="When I enter 'rust'"
//! INFO  sandrun::lifecycle: [finished] ok=true steps=3 assertions=1 failed=0
//! ERROR sandrun::lifecycle: [finished] ok=false failure="step failed: ..."
//! ```

use tracing::{debug, error, info};

use super::Subscribe;
use crate::events::lifecycle::{
    AFTER_FEATURE, AFTER_SCENARIO, AFTER_STEP, BEFORE_FEATURE, BEFORE_SCENARIO, BEFORE_STEP,
};
use crate::events::Lifecycle;

const TARGET: &str = "sandrun::lifecycle";

/// Lifecycle writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for LogWriter {
    fn on_event(&self, event: &str, payload: &Lifecycle) {
        match (event, payload) {
            (BEFORE_FEATURE, Lifecycle::Feature { title }) => {
                info!(target: TARGET, "[feature] title={title:?}");
            }
            (AFTER_FEATURE, Lifecycle::Feature { title }) => {
                debug!(target: TARGET, "[feature-done] title={title:?}");
            }
            (BEFORE_SCENARIO, Lifecycle::Scenario { feature, title }) => {
                info!(target: TARGET, "[scenario] feature={feature:?} title={title:?}");
            }
            (AFTER_SCENARIO, Lifecycle::Scenario { feature, title }) => {
                debug!(target: TARGET, "[scenario-done] feature={feature:?} title={title:?}");
            }
            (BEFORE_STEP, Lifecycle::Step { scenario, text }) => {
                debug!(target: TARGET, "[step] scenario={scenario:?} text={text:?}");
            }
            (AFTER_STEP, Lifecycle::Step { scenario, text }) => {
                debug!(target: TARGET, "[step-done] scenario={scenario:?} text={text:?}");
            }
            (_, Lifecycle::Finished(report)) if report.ok => {
                info!(
                    target: TARGET,
                    "[finished] ok=true steps={} assertions={} failed={}",
                    report.steps,
                    report.assertions.len(),
                    report.failed_assertions()
                );
            }
            (_, Lifecycle::Finished(report)) => {
                error!(
                    target: TARGET,
                    "[finished] ok=false failure={:?} failed={}",
                    report.failure.as_deref().unwrap_or("assertions failed"),
                    report.failed_assertions()
                );
            }
            (other, payload) => {
                debug!(target: TARGET, "[{other}] subject={:?}", payload.subject());
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
