//! Device session management.
//!
//! A [`Session`] owns the command channel of one device together with the
//! state built on top of it: the [`Catalog`] of commands the device
//! advertises, the loaded scripts, and the single-flight script runner.
//! The unsolicited log stream runs separately through [`LogIngestor`] on
//! its own channel and thread.

pub mod catalog;
pub mod error;
pub mod ingest;
pub mod session;

pub use catalog::{
    parse_catalog, Catalog, Command, DiscoveryMode, CATALOG_MARKER, DISCOVERY_COMMAND,
};
pub use error::{CatalogError, Result, SessionError};
pub use ingest::{LogIngestor, LogStream, DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_DELAY};
pub use session::Session;
