//! Scripted command playback for device regression testing.
//!
//! A script is a named, ordered list of commands loaded from a
//! `test_*.yaml` file. [`ScriptRunner`] replays one script at a time
//! through any [`devlink_frame::CommandExchange`], reporting every step and
//! carrying on past failed ones.

pub mod config;
pub mod error;
pub mod library;
pub mod runner;

pub use config::LibraryConfig;
pub use error::{Result, RunError, ScriptError};
pub use library::{ScriptLibrary, TestScript};
pub use runner::{RunObserver, RunReport, ScriptRunner, StepOutcome};
