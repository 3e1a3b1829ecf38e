//! # Core subscriber trait.
//!
//! Handlers run synchronously inside `dispatch`, on the executor's task.
//! Keep them short; hand slow work to a channel.

use std::sync::Arc;

use crate::error::BusError;
use crate::events::lifecycle::LIFECYCLE_EVENTS;
use crate::events::{EventBus, Lifecycle};

/// Contract for lifecycle subscribers.
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event; `event` is the lifecycle name (`beforeStep`, ...).
    fn on_event(&self, event: &str, payload: &Lifecycle);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Events this subscriber listens to. Defaults to all seven.
    fn events(&self) -> &'static [&'static str] {
        &LIFECYCLE_EVENTS
    }
}

/// Subscribes `sub` to each of its declared events on `bus`.
pub fn attach(bus: &EventBus<Lifecycle>, sub: Arc<dyn Subscribe>) -> Result<(), BusError> {
    for &event in sub.events() {
        let s = Arc::clone(&sub);
        bus.on(event, move |payload: &Lifecycle| s.on_event(event, payload))?;
    }
    tracing::debug!(subscriber = sub.name(), "attached");
    Ok(())
}
