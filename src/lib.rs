//! # sandrun
//!
//! **sandrun** drives acceptance tests against a page loaded in a sandboxed,
//! poll-only browser process.
//!
//! The host side walks features, scenarios and steps, turns each step into a
//! bridge message and queues it. The sandboxed process cannot be called into:
//! it polls the host over its stdio, executes what it receives against a
//! [`Renderer`], and reports assertion outcomes and its own state back.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌────────────────────────── host process ──────────────────────────┐
//!  │                                                                  │
//!  │  Session ──► Executor ──► StepLibrary ──► Bridge (Mailbox)       │
//!  │     │           │                           ▲   │                │
//!  │     │           ▼                           │   │ reply          │
//!  │     │     EventBus<Lifecycle>          call │   ▼                │
//!  │     │     (beforeStep, ..., testsuiteFinished)                   │
//!  │     ▼                                                            │
//!  │  Supervisor ──► pump ◄──────── child stdout / stdin ────────┐    │
//!  │     └─► OutcomeTracker (Pending → Started → Finished|Failed) │    │
//!  └──────────────────────────────────────────────────────────────┼────┘
//!                                                                 │
//!  ┌────────────────────── sandboxed process ─────────────────────┼────┐
//!  │  SandboxRunner ──► SandboxPeer ──poll──► LineCallback ────────┘    │
//!  │       │                 │                                         │
//!  │       ▼                 ▼                                         │
//!  │  MessageDriver ──► Renderer (navigate, evaluate, inject, ...)     │
//!  └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Run sequence
//! ```text
//! host                                   sandbox
//!  │ ── {"action":"open","url":..} ────► │ stores url, extends inject list
//!  │ ── {"action":"run","testsuite":..} ► │ browserStarted, inject, navigate
//!  │ ◄── {"call":["polling",null]} ───── │
//!  │ ── {"reply":["interaction",msg]} ──► │ MessageDriver::apply(msg)
//!  │ ◄── {"call":["report",outcome]} ─── │
//!  │ ...                                  │
//!  │ ── {"reply":["interaction",finish]} ►│
//!  │ ◄── {"state":"browserFinished"} ─── │
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Events**        | Closed-vocabulary buses with bounded listeners.          | [`EventBus`], [`Invocations`]               |
//! | **Bridge**        | Channel routing over one mailbox, host and sandbox side. | [`Bridge`], [`SandboxPeer`], [`Envelope`]   |
//! | **Execution**     | Feature/scenario/step walk with lifecycle events.        | [`Executor`], [`StepInterpreter`]           |
//! | **Steps**         | Regex step definitions with `$argN` substitution.        | [`StepLibrary`]                             |
//! | **Sandbox**       | Runner executed inside the sandboxed process.            | [`SandboxRunner`], [`Renderer`]             |
//! | **Supervision**   | Child process, control messages, sticky outcome.         | [`Supervisor`], [`RunOutcome`]              |
//! | **Facade**        | Test-author API.                                         | [`Session`]                                 |
//! | **Errors**        | Typed errors per layer.                                  | [`RunError`], [`SandboxError`], ...         |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`] and [`telemetry::init`].

pub mod bridge;
pub mod collections;
mod core;
mod error;
pub mod events;
pub mod exec;
pub mod protocol;
pub mod renderer;
pub mod sandbox;
mod session;
pub mod steps;
pub mod subscribers;

#[cfg(feature = "logging")]
pub mod telemetry;

#[cfg(test)]
mod testkit;

// ---- Public re-exports ----

pub use bridge::{Bridge, Envelope, SandboxPeer};
pub use crate::core::{Config, FailureCause, OutcomeTracker, RunOutcome, RunReport, SupervisedRun, Supervisor};
pub use error::{BusError, CollectionError, ProtocolError, RunError, SandboxError, StepError};
pub use events::{EventBus, Invocations, Lifecycle, Report};
pub use exec::{Completion, Executor, Feature, Scenario, Step, StepInterpreter};
pub use protocol::{Assertion, ChildState, ControlMessage, Message};
pub use renderer::{PageEvent, Renderer};
pub use sandbox::{SandboxOptions, SandboxRunner};
pub use session::Session;
pub use steps::StepLibrary;
pub use subscribers::{ReportCollector, Subscribe};

#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
