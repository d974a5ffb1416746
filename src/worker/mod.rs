//! Child process execution engine.
//!
//! This module turns one validated request into one supervised child
//! process:
//!
//! - **Execution**: [`Executor`] spawns the command in its own process
//!   group with the worker's environment plus the request's overrides
//! - **Capture**: [`output::OutputBuffer`] merges stdout, stderr and
//!   runner annotations under one mutex
//! - **Classification**: [`status::Termination`] maps the wait status to
//!   the plain exit-code protocol (`128 + signal` for signal deaths)
//!
//! # Execution flow
//!
//! 1. Spawn with both stdio streams piped and `process_group(0)`
//! 2. A reaper task waits for the child and the pipe pumps
//! 3. The supervisor waits on reaper / deadline / drain, whichever is
//!    ready first; the deadline and drain paths SIGKILL the whole group
//! 4. The wait status is classified and reported

pub mod executor;
pub mod output;
pub mod status;

pub use executor::{ExecStatus, ExecutionReport, Executor};
