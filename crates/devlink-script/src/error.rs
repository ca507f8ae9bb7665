use std::path::PathBuf;

/// Errors that can occur while loading script definitions.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// A script file or directory could not be read.
    #[error("failed to load scripts: {0}")]
    LoadFailed(String),

    /// A script file is not valid YAML or has the wrong shape.
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// No script files were found.
    #[error("no test scripts found in {}", .0.display())]
    NoScripts(PathBuf),
}

/// Reasons a script run could not start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    /// Another script is still running on this runner.
    #[error("test in progress, please wait")]
    Busy,

    /// The selected script does not exist.
    #[error("script index {index} out of range ({len} scripts loaded)")]
    IndexOutOfRange { index: usize, len: usize },

    /// No script carries the requested name.
    #[error("no script named {0:?}")]
    UnknownScript(String),
}

pub type Result<T> = std::result::Result<T, ScriptError>;
