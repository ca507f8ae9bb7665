use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::{BufMut, BytesMut};
use devlink_transport::{TerminatorPair, TransportChannel};
use tracing::{debug, trace};

use crate::error::{FrameError, Result};

const INITIAL_RESPONSE_CAPACITY: usize = 256;

/// Upper bound on the text gathered by [`FramedExchange::collect_listing`].
pub const MAX_LISTING_SIZE: usize = 1024 * 1024;

/// Something that can send a command and return the device's response.
///
/// Implemented by [`FramedExchange`]; catalog discovery and script playback
/// are written against this trait.
pub trait CommandExchange {
    /// Send `command` and wait for one terminated response.
    fn exchange(&self, command: &str) -> Result<String>;

    /// Send `command` and gather every response frame until the device goes quiet.
    fn collect_listing(&self, command: &str) -> Result<String> {
        self.exchange(command)
    }
}

/// Request/response framing over an exclusively owned [`TransportChannel`].
///
/// Every operation holds the channel lock from the first write to the last
/// read, so concurrent callers are serialized rather than interleaved.
pub struct FramedExchange {
    channel: Mutex<TransportChannel>,
}

impl FramedExchange {
    pub fn new(channel: TransportChannel) -> Self {
        Self {
            channel: Mutex::new(channel),
        }
    }

    /// Open the underlying channel.
    pub fn open(&self) -> Result<()> {
        self.lock().open().map_err(FrameError::Channel)
    }

    /// Close the underlying channel. Closing twice is fine.
    pub fn close(&self) -> Result<()> {
        self.lock().close().map_err(FrameError::Channel)
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_open()
    }

    pub fn address(&self) -> String {
        self.lock().address().to_string()
    }

    pub fn terminators(&self) -> TerminatorPair {
        self.lock().terminators().clone()
    }

    /// Write `command` + tx terminator, then read until the rx terminator.
    ///
    /// The returned text includes the rx terminator. On a read failure the
    /// bytes received so far travel in [`FrameError::Interrupted`].
    pub fn exchange(&self, command: &str) -> Result<String> {
        let mut channel = self.lock();
        if !channel.is_open() {
            return Err(FrameError::NotOpen);
        }

        send_command(&mut channel, command)?;
        let rx = channel.terminators().rx().as_bytes().to_vec();
        let mut response = BytesMut::with_capacity(INITIAL_RESPONSE_CAPACITY);
        read_until_terminator(&mut channel, &rx, &mut response, usize::MAX)?;

        debug!(command, bytes = response.len(), "exchange complete");
        Ok(String::from_utf8_lossy(&response).into_owned())
    }

    /// Read into `buf` until its filled prefix ends with the rx terminator.
    ///
    /// Returns the number of bytes written to `buf`, terminator included.
    pub fn read_framed(&self, buf: &mut [u8]) -> Result<usize> {
        let mut channel = self.lock();
        if !channel.is_open() {
            return Err(FrameError::NotOpen);
        }

        let rx = channel.terminators().rx().as_bytes().to_vec();
        let mut filled = 0usize;
        while !buf[..filled].ends_with(&rx) {
            if filled == buf.len() {
                return Err(FrameError::BufferFull {
                    capacity: buf.len(),
                });
            }
            match channel.read_byte() {
                Ok(byte) => {
                    buf[filled] = byte;
                    filled += 1;
                }
                Err(source) => {
                    return Err(FrameError::Interrupted {
                        partial: buf[..filled].to_vec(),
                        source,
                    });
                }
            }
        }
        Ok(filled)
    }

    /// Send `command`, then gather response frames until a read times out
    /// or the peer closes the stream.
    ///
    /// Meant for devices that answer one command with many terminated lines
    /// (a `help` listing). Either end keeps any trailing bytes without a
    /// terminator. Other read errors fail the call.
    pub fn collect_listing(&self, command: &str) -> Result<String> {
        let mut channel = self.lock();
        if !channel.is_open() {
            return Err(FrameError::NotOpen);
        }

        send_command(&mut channel, command)?;
        let rx = channel.terminators().rx().as_bytes().to_vec();
        let mut listing = BytesMut::with_capacity(INITIAL_RESPONSE_CAPACITY);
        let mut frames = 0usize;
        loop {
            match read_until_terminator(&mut channel, &rx, &mut listing, MAX_LISTING_SIZE) {
                Ok(()) => frames += 1,
                Err(err) if err.is_timeout() || err.is_end_of_stream() => break,
                Err(FrameError::Interrupted { source, .. }) => {
                    return Err(FrameError::Interrupted {
                        partial: listing.to_vec(),
                        source,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        debug!(command, frames, bytes = listing.len(), "listing complete");
        Ok(String::from_utf8_lossy(&listing).into_owned())
    }

    fn lock(&self) -> MutexGuard<'_, TransportChannel> {
        // A panic mid-exchange leaves the channel usable; the next frame resyncs on the terminator.
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CommandExchange for FramedExchange {
    fn exchange(&self, command: &str) -> Result<String> {
        FramedExchange::exchange(self, command)
    }

    fn collect_listing(&self, command: &str) -> Result<String> {
        FramedExchange::collect_listing(self, command)
    }
}

impl std::fmt::Debug for FramedExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedExchange")
            .field("channel", &*self.lock())
            .finish()
    }
}

fn send_command(channel: &mut TransportChannel, command: &str) -> Result<()> {
    let tx = channel.terminators().tx();
    let mut outbound = BytesMut::with_capacity(command.len() + tx.len());
    outbound.put_slice(command.as_bytes());
    outbound.put_slice(tx.as_bytes());
    channel
        .write_raw(&outbound)
        .map_err(|source| FrameError::Interrupted {
            partial: Vec::new(),
            source,
        })
}

/// Append bytes to `acc` until the bytes added by this call end with `rx`.
fn read_until_terminator(
    channel: &mut TransportChannel,
    rx: &[u8],
    acc: &mut BytesMut,
    limit: usize,
) -> Result<()> {
    let start = acc.len();
    while !acc[start..].ends_with(rx) {
        if acc.len() >= limit {
            return Err(FrameError::BufferFull { capacity: limit });
        }
        match channel.read_byte() {
            Ok(byte) => acc.put_u8(byte),
            Err(source) => {
                trace!(received = acc.len() - start, error = %source, "terminator scan aborted");
                return Err(FrameError::Interrupted {
                    partial: acc[start..].to_vec(),
                    source,
                });
            }
        }
    }
    Ok(())
}
