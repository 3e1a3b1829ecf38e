//! # Code that runs inside the sandboxed process.
//!
//! ```text
//! host ── open ──► SandboxRunner: remember url, extend inject list
//! host ── run ───► SandboxRunner: browserStarted
//!                                 inject scripts (insertion order)
//!                                 navigate
//!                                 poll ◄──► MessageDriver ──► Renderer
//!                                 finish ──► browserFinished
//!                                 failure ──► browserFailed
//! ```

mod driver;
mod options;
mod runner;

pub use driver::{Applied, MessageDriver};
pub use options::SandboxOptions;
pub use runner::SandboxRunner;
