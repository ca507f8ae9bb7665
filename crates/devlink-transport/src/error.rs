/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("failed to open {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// A read or write was attempted on a channel that is not open.
    #[error("channel is not open")]
    NotOpen,

    /// An I/O error occurred on the open connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A terminator string was empty.
    #[error("{0} terminator must not be empty")]
    EmptyTerminator(&'static str),

    /// A line parameter was out of range.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
}

impl TransportError {
    /// True when the error is the transport's read/write timeout elapsing.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            TransportError::Io(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                )
        )
    }

    /// True when the peer closed the stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(
            self,
            TransportError::Io(err) if err.kind() == std::io::ErrorKind::UnexpectedEof
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
