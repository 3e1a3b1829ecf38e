use parking_lot::Mutex;

use super::Subscribe;
use crate::events::lifecycle::TESTSUITE_FINISHED;
use crate::events::{Lifecycle, Report};

/// Keeps the [`Report`] delivered through `testsuiteFinished`.
#[derive(Default)]
pub struct ReportCollector {
    report: Mutex<Option<Report>>,
    deliveries: Mutex<usize>,
}

impl ReportCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last delivered report.
    pub fn report(&self) -> Option<Report> {
        self.report.lock().clone()
    }

    /// How many times `testsuiteFinished` fired.
    pub fn deliveries(&self) -> usize {
        *self.deliveries.lock()
    }
}

impl Subscribe for ReportCollector {
    fn on_event(&self, _: &str, payload: &Lifecycle) {
        if let Lifecycle::Finished(report) = payload {
            *self.report.lock() = Some(report.clone());
            *self.deliveries.lock() += 1;
        }
    }

    fn name(&self) -> &'static str {
        "ReportCollector"
    }

    fn events(&self) -> &'static [&'static str] {
        &[TESTSUITE_FINISHED]
    }
}
