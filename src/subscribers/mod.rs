//! # Lifecycle subscribers.
//!
//! A [`Subscribe`] implementation observes lifecycle events of a run. It is
//! wired onto a lifecycle [`EventBus`](crate::EventBus) with [`attach`], one
//! listener per event it declares.
//!
//! ```text
//! Executor ── dispatch(beforeStep, ..) ──► EventBus<Lifecycle>
//!                                            ├──► user handlers (Session::register)
//!                                            ├──► LogWriter      (tracing)
//!                                            └──► ReportCollector (final Report)
//! ```
//!
//! ## Implementing custom subscribers
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use sandrun::events::Lifecycle;
//! use sandrun::subscribers::Subscribe;
//!
//! #[derive(Default)]
//! struct StepCounter(AtomicUsize);
//!
//! impl Subscribe for StepCounter {
//!     fn on_event(&self, event: &str, _: &Lifecycle) {
//!         if event == "afterStep" {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod report;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use report::ReportCollector;
pub use subscribe::{attach, Subscribe};
