//! Command Line Interface (CLI) layer for HPFSHARP.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) that loads the inputs, runs the
//! fusion pipeline and writes the run report. It wires user-provided options
//! to the library functionality exposed via `hpfsharp::api`.
//!
//! If you are embedding HPFSHARP into another application, prefer using
//! the high-level `hpfsharp::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
