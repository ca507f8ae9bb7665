use devlink_frame::FrameError;
use devlink_script::RunError;

/// Errors that can occur while discovering the command catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A marker-prefixed line did not hold exactly a command and a description.
    #[error("invalid cmd syntax: {line}")]
    Malformed { line: String },

    /// The discovery exchange itself failed.
    #[error("discovery exchange failed: {0}")]
    Exchange(#[from] FrameError),
}

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Command exchange error.
    #[error("exchange error: {0}")]
    Frame(#[from] FrameError),

    /// Catalog discovery error.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// A script run could not start.
    #[error("script error: {0}")]
    Run(#[from] RunError),

    /// The channel handed to the log ingestor is not open.
    #[error("log channel is not open")]
    NotOpen,

    /// The ingest thread could not be started.
    #[error("failed to start log ingestion: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
