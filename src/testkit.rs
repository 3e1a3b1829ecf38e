//! In-process fakes shared by unit tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::bridge::{Bridge, Envelope, HostCallback};
use crate::error::SandboxError;
use crate::protocol::ChildState;
use crate::renderer::Renderer;

/// Renderer that records every call and answers `evaluate` with `answer`.
#[derive(Default)]
pub(crate) struct Recorder {
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) answer: Mutex<Value>,
    /// Fails `navigate` when set.
    pub(crate) broken: Mutex<bool>,
}

#[async_trait]
impl Renderer for Recorder {
    async fn navigate(&self, url: &str) -> Result<(), SandboxError> {
        self.calls.lock().push(format!("navigate {url}"));
        if *self.broken.lock() {
            return Err(SandboxError::Renderer(format!("cannot load {url}")));
        }
        Ok(())
    }
    async fn evaluate(&self, script: &str) -> Result<Value, SandboxError> {
        self.calls.lock().push(format!("evaluate {script}"));
        Ok(self.answer.lock().clone())
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

/// Callback wired straight into a host [`Bridge`]; states are recorded.
pub(crate) struct Direct {
    pub(crate) host: Arc<Bridge>,
    pub(crate) states: Vec<ChildState>,
}

impl Direct {
    pub(crate) fn new(host: &Arc<Bridge>) -> Self {
        Self { host: Arc::clone(host), states: Vec::new() }
    }
}

impl HostCallback for Direct {
    fn call(&mut self, envelope: Envelope) -> Result<Option<Envelope>, SandboxError> {
        Ok(self.host.receive(envelope))
    }
    fn notify(&mut self, state: ChildState) -> Result<(), SandboxError> {
        self.states.push(state);
        Ok(())
    }
}
