//! Events: the closed-vocabulary bus and the run lifecycle vocabulary.
//!
//! ## Contents
//! - [`EventBus`] typed publish/subscribe with bounded-invocation listeners
//! - [`Invocations`] how many times a listener may run
//! - [`Lifecycle`], [`Report`] payloads of the seven lifecycle events
//!
//! ## Quick reference
//! - **Publishers**: the [`Executor`](crate::exec::Executor) (before/after
//!   feature, scenario, step) and the [`Session`](crate::Session)
//!   (`testsuiteFinished`); the [`Bridge`](crate::Bridge) publishes
//!   `messageReceived` on per-channel buses.
//! - **Consumers**: test-author listeners, [`LogWriter`](crate::subscribers::LogWriter),
//!   [`ReportCollector`](crate::subscribers::ReportCollector).

mod bus;
pub mod lifecycle;

pub use bus::{EventBus, Handler, Invocations};
pub use lifecycle::{Lifecycle, Report};
