//! Byte-stream transport channels for talking to embedded devices.
//!
//! This is the lowest layer of devlink. It knows how to open a connection
//! described by a [`TransportConfig`], write raw bytes, and read one byte at
//! a time. It carries the [`TerminatorPair`] for the channel but does no
//! framing itself; that lives in `devlink-frame`.
//!
//! Connections are produced by a [`Connector`]:
//! - [`SerialConnector`] opens a serial device (UART, USB CDC)
//! - [`StreamConnector`] hands out an already-connected stream

pub mod channel;
pub mod config;
pub mod connector;
pub mod error;

pub use channel::TransportChannel;
pub use config::{DataBits, Parity, StopBits, TerminatorPair, TransportConfig, DEFAULT_TIMEOUT};
pub use connector::{ByteStream, Connector, SerialConnector, StreamConnector};
pub use error::{Result, TransportError};
