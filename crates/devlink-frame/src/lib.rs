//! Terminator-framed request/response exchanges.
//!
//! Devices on a serial line have no length prefix: a command is the text
//! followed by the channel's tx terminator, and a response is everything up
//! to and including the rx terminator. Frames are found by matching the
//! terminator against the tail of the accumulated bytes, one byte at a time.
//!
//! [`FramedExchange`] owns the channel behind a mutex so only one exchange
//! is ever in flight on it.

pub mod error;
pub mod exchange;
pub mod observer;

pub use error::{FrameError, Result};
pub use exchange::{CommandExchange, FramedExchange, MAX_LISTING_SIZE};
pub use observer::{notify, ExchangeObserver, NoopObserver};
