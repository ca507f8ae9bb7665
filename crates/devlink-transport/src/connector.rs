use std::io::{Read, Write};
use std::sync::Mutex;

use tracing::debug;

use crate::config::TransportConfig;

/// A connected byte stream: anything that implements Read + Write.
///
/// Serial ports, sockets and in-memory pipes all qualify.
pub trait ByteStream: Read + Write + Send {}

impl<T: Read + Write + Send> ByteStream for T {}

/// Produces a connection for a [`TransportConfig`].
pub trait Connector: Send {
    /// Establish the connection described by `config`.
    fn connect(&self, config: &TransportConfig) -> std::io::Result<Box<dyn ByteStream>>;

    /// Connector name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Opens serial devices (UART, USB CDC-ACM) with the configured line settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn connect(&self, config: &TransportConfig) -> std::io::Result<Box<dyn ByteStream>> {
        let port = serialport::new(config.address.as_str(), config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .timeout(config.timeout)
            .open()
            .map_err(std::io::Error::from)?;
        debug!(
            address = %config.address,
            settings = %config.line_settings(),
            "serial port opened"
        );
        Ok(Box::new(port))
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}

/// Hands out a single pre-connected stream.
///
/// Useful for sockets, pty pairs and tests. The stream can be handed out
/// once; opening the channel a second time fails with `NotConnected`.
pub struct StreamConnector {
    stream: Mutex<Option<Box<dyn ByteStream>>>,
}

impl StreamConnector {
    pub fn new<S: ByteStream + 'static>(stream: S) -> Self {
        Self {
            stream: Mutex::new(Some(Box::new(stream))),
        }
    }
}

impl Connector for StreamConnector {
    fn connect(&self, _config: &TransportConfig) -> std::io::Result<Box<dyn ByteStream>> {
        let mut slot = self
            .stream
            .lock()
            .map_err(|_| std::io::Error::other("stream connector lock poisoned"))?;
        slot.take().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "pre-connected stream already consumed",
            )
        })
    }

    fn name(&self) -> &'static str {
        "stream"
    }
}

impl std::fmt::Debug for StreamConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let available = self.stream.lock().map(|s| s.is_some()).unwrap_or(false);
        f.debug_struct("StreamConnector")
            .field("available", &available)
            .finish()
    }
}
