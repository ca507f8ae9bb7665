use std::fmt;
use std::io;

use devlink_frame::FrameError;
use devlink_script::{RunError, ScriptError};
use devlink_session::{CatalogError, SessionError};
use devlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const SCRIPT_FAILURES: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { address, source } => {
            io_error(&format!("{context}: {address}"), source)
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::EmptyTerminator(_) | TransportError::InvalidConfig(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Channel(err) => transport_error(context, err),
        FrameError::Interrupted { source, .. } => transport_error(context, source),
        FrameError::BufferFull { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::NotOpen => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn run_error(context: &str, err: RunError) -> CliError {
    match err {
        RunError::Busy => CliError::new(FAILURE, format!("{context}: {err}")),
        RunError::IndexOutOfRange { .. } | RunError::UnknownScript(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
    }
}

pub fn script_error(context: &str, err: ScriptError) -> CliError {
    match err {
        ScriptError::NoScripts(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ScriptError::Parse { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ScriptError::LoadFailed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Catalog(CatalogError::Exchange(err)) => frame_error(context, err),
        SessionError::Catalog(err @ CatalogError::Malformed { .. }) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::Run(err) => run_error(context, err),
        SessionError::NotOpen => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        SessionError::Spawn(source) => io_error(context, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = frame_error(
            "exchange failed",
            FrameError::Interrupted {
                partial: b"half".to_vec(),
                source: TransportError::Io(io::ErrorKind::TimedOut.into()),
            },
        );
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("exchange failed: "));
    }

    #[test]
    fn missing_device_is_a_transport_error() {
        let err = transport_error(
            "open failed",
            TransportError::Connect {
                address: "/dev/ttyNONE".to_string(),
                source: io::ErrorKind::NotFound.into(),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.contains("/dev/ttyNONE"));
    }

    #[test]
    fn malformed_catalog_is_invalid_data() {
        let err = session_error(
            "discover failed",
            SessionError::Catalog(CatalogError::Malformed {
                line: "`x".to_string(),
            }),
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn busy_runner_is_a_plain_failure() {
        assert_eq!(run_error("run", RunError::Busy).code, FAILURE);
        assert_eq!(
            run_error("run", RunError::UnknownScript("x".into())).code,
            USAGE
        );
    }
}
