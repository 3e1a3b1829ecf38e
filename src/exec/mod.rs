//! # Feature → scenario → step execution.
//!
//! [`Executor`] walks already-parsed [`Feature`]s strictly in order and
//! emits the lifecycle events on a shared [`EventBus`](crate::EventBus).
//! Each step is handed to a [`StepInterpreter`] together with a
//! [`Completion`]; the executor suspends until that completion fires.
//!
//! ```text
//! Idle ─► RunningFeature ─► RunningScenario ─► RunningStep ─┐
//!              ▲                   ▲                        │
//!              └───────────────────┴──── next entity ◄──────┘
//!                                                           │
//!                            Done ◄── all features ok ──────┤
//!                         Aborted ◄── step failure ─────────┘
//! ```

mod completion;
mod executor;
mod model;

pub use completion::{Completion, PendingCompletion};
pub use executor::{ExecState, ExecSummary, Executor, StepInterpreter};
pub use model::{Feature, Scenario, Step};
