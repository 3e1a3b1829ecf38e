//! One-shot step completion.

use tokio::sync::oneshot;

/// Signals the end of one step. Consumed on use, so it fires at most once;
/// dropping it unfired fails the step.
#[derive(Debug)]
#[must_use = "an unfired completion fails the step"]
pub struct Completion {
    tx: oneshot::Sender<Result<(), String>>,
}

/// The executor's end of a [`Completion`].
#[derive(Debug)]
pub struct PendingCompletion {
    rx: oneshot::Receiver<Result<(), String>>,
}

impl Completion {
    pub fn pair() -> (Completion, PendingCompletion) {
        let (tx, rx) = oneshot::channel();
        (Completion { tx }, PendingCompletion { rx })
    }

    pub fn succeed(self) {
        self.finish(Ok(()));
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.finish(Err(reason.into()));
    }

    pub fn finish(self, outcome: Result<(), String>) {
        // the executor may have given up on the step already
        let _ = self.tx.send(outcome);
    }
}

impl PendingCompletion {
    /// Waits for the step outcome.
    pub async fn wait(self) -> Result<(), String> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err("step completion dropped without being fired".to_string()),
        }
    }
}
