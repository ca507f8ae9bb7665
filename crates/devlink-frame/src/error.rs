use devlink_transport::TransportError;

/// Errors that can occur during a framed exchange.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The exchange was attempted before the channel was opened.
    #[error("channel is not open")]
    NotOpen,

    /// Opening or closing the channel failed.
    #[error("channel error: {0}")]
    Channel(#[from] TransportError),

    /// The transport failed mid-exchange. `partial` holds what was read.
    #[error("exchange interrupted after {} bytes: {source}", .partial.len())]
    Interrupted {
        partial: Vec<u8>,
        source: TransportError,
    },

    /// The destination filled up before the terminator arrived.
    #[error("buffer full ({capacity} bytes) before terminator")]
    BufferFull { capacity: usize },
}

impl FrameError {
    /// The incomplete response read before the failure, if any.
    pub fn partial_response(&self) -> Option<String> {
        match self {
            FrameError::Interrupted { partial, .. } if !partial.is_empty() => {
                Some(String::from_utf8_lossy(partial).into_owned())
            }
            _ => None,
        }
    }

    /// True when the underlying transport read timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            FrameError::Interrupted { source, .. } | FrameError::Channel(source) => {
                source.is_timeout()
            }
            _ => false,
        }
    }

    /// True when the peer closed the stream mid-read.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, FrameError::Interrupted { source, .. } if source.is_end_of_stream())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
