use std::io::{BufReader, ErrorKind, Read, Write};

use tracing::debug;

use crate::config::{TerminatorPair, TransportConfig};
use crate::connector::{ByteStream, Connector, SerialConnector};
use crate::error::{Result, TransportError};

/// An owned connection to a byte-stream transport.
///
/// Created closed. [`open`](Self::open) establishes the connection through
/// the channel's [`Connector`]; every read and write before that fails with
/// [`TransportError::NotOpen`]. Only raw primitives are exposed here;
/// framing is the caller's job.
pub struct TransportChannel {
    config: TransportConfig,
    terminators: TerminatorPair,
    connector: Box<dyn Connector>,
    stream: Option<BufReader<Box<dyn ByteStream>>>,
}

impl TransportChannel {
    /// Create a closed channel that will connect through `connector`.
    pub fn new(
        config: TransportConfig,
        terminators: TerminatorPair,
        connector: impl Connector + 'static,
    ) -> Self {
        Self {
            config,
            terminators,
            connector: Box::new(connector),
            stream: None,
        }
    }

    /// Create a closed channel backed by a serial device.
    pub fn serial(config: TransportConfig, terminators: TerminatorPair) -> Self {
        Self::new(config, terminators, SerialConnector)
    }

    /// Establish the connection. Re-opening drops the previous handle first.
    pub fn open(&mut self) -> Result<()> {
        if self.stream.take().is_some() {
            debug!(address = %self.config.address, "re-opening channel");
        }
        let stream =
            self.connector
                .connect(&self.config)
                .map_err(|source| TransportError::Connect {
                    address: self.config.address.clone(),
                    source,
                })?;
        self.stream = Some(BufReader::new(stream));
        debug!(
            address = %self.config.address,
            connector = self.connector.name(),
            "channel opened"
        );
        Ok(())
    }

    /// Release the connection. Closing a closed channel does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        debug!(address = %self.config.address, "channel closed");
        stream.get_mut().flush().map_err(TransportError::Io)
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write all of `bytes` and flush.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let writer = stream.get_mut();
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Read exactly one byte (blocking up to the transport timeout).
    ///
    /// End of stream is reported as an `UnexpectedEof` I/O error.
    pub fn read_byte(&mut self) -> Result<u8> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let mut byte = [0u8; 1];
        loop {
            match stream.read(&mut byte) {
                Ok(0) => return Err(TransportError::Io(ErrorKind::UnexpectedEof.into())),
                Ok(_) => return Ok(byte[0]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn terminators(&self) -> &TerminatorPair {
        &self.terminators
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }
}

impl std::fmt::Debug for TransportChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportChannel")
            .field("address", &self.config.address)
            .field("connector", &self.connector.name())
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::os::unix::net::UnixStream;

    use super::*;
    use crate::connector::StreamConnector;

    fn terminators() -> TerminatorPair {
        TerminatorPair::new("\n", "\r\n").unwrap()
    }

    fn channel_over(stream: impl ByteStream + 'static) -> TransportChannel {
        TransportChannel::new(
            TransportConfig::new("test", 9600),
            terminators(),
            StreamConnector::new(stream),
        )
    }

    #[test]
    fn primitives_fail_before_open() {
        let mut channel = channel_over(Cursor::new(b"x".to_vec()));
        assert!(!channel.is_open());
        assert!(matches!(channel.read_byte(), Err(TransportError::NotOpen)));
        assert!(matches!(
            channel.write_raw(b"ping"),
            Err(TransportError::NotOpen)
        ));
    }

    #[test]
    fn write_and_read_over_socket_pair() {
        let (local, mut peer) = UnixStream::pair().unwrap();
        let mut channel = channel_over(local);
        channel.open().unwrap();

        channel.write_raw(b"status\n").unwrap();
        let mut received = [0u8; 7];
        peer.read_exact(&mut received).unwrap();
        assert_eq!(&received, b"status\n");

        peer.write_all(b"ok").unwrap();
        assert_eq!(channel.read_byte().unwrap(), b'o');
        assert_eq!(channel.read_byte().unwrap(), b'k');
    }

    #[test]
    fn end_of_stream_is_an_io_error() {
        let mut channel = channel_over(Cursor::new(b"a".to_vec()));
        channel.open().unwrap();
        assert_eq!(channel.read_byte().unwrap(), b'a');
        let err = channel.read_byte().unwrap_err();
        assert!(matches!(err, TransportError::Io(ref e) if e.kind() == ErrorKind::UnexpectedEof));
        assert!(err.is_end_of_stream());
        assert!(!err.is_timeout());
    }

    #[test]
    fn read_timeout_is_reported_as_timeout() {
        let (local, _peer) = UnixStream::pair().unwrap();
        local
            .set_read_timeout(Some(std::time::Duration::from_millis(10)))
            .unwrap();
        let mut channel = channel_over(local);
        channel.open().unwrap();

        let err = channel.read_byte().unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn close_is_idempotent() {
        let mut never_opened = channel_over(Cursor::new(Vec::new()));
        assert!(never_opened.close().is_ok());

        let mut channel = channel_over(Cursor::new(Vec::new()));
        channel.open().unwrap();
        assert!(channel.close().is_ok());
        assert!(!channel.is_open());
        assert!(channel.close().is_ok());
        assert!(matches!(channel.read_byte(), Err(TransportError::NotOpen)));
    }

    #[test]
    fn open_failure_is_a_connect_error() {
        let mut channel = TransportChannel::serial(
            TransportConfig::new("/nonexistent/devlink-tty", 9600),
            terminators(),
        );
        let err = channel.open().unwrap_err();
        assert!(
            matches!(&err, TransportError::Connect { address, .. } if address == "/nonexistent/devlink-tty")
        );
        assert!(!channel.is_open());
    }

    #[test]
    fn second_open_of_consumed_stream_fails_cleanly() {
        let mut channel = channel_over(Cursor::new(Vec::new()));
        channel.open().unwrap();
        let err = channel.open().unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(!channel.is_open());
    }
}
