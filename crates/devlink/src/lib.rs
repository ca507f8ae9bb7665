//! Command, log and scripted-test link to embedded devices.
//!
//! devlink talks to a device over a byte-stream transport (usually a serial
//! line): it sends terminator-framed commands, discovers the device's command
//! catalog from its `help` answer, ingests an unsolicited log stream from a
//! second port, and replays YAML test scripts.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial and stream connections, line settings, terminators
//! - [`frame`]: terminator-framed request/response exchange
//! - [`script`]: test script loading and single-flight playback
//! - [`session`]: command catalog, log ingestion and the per-device session

/// Re-export transport types.
pub mod transport {
    pub use devlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use devlink_frame::*;
}

/// Re-export script types.
pub mod script {
    pub use devlink_script::*;
}

/// Re-export session types.
pub mod session {
    pub use devlink_session::*;
}
