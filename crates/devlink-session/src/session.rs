use std::sync::{PoisonError, RwLock};

use devlink_frame::{notify, ExchangeObserver, FramedExchange};
use devlink_script::{RunError, RunObserver, RunReport, ScriptLibrary, ScriptRunner};
use devlink_transport::TransportChannel;
use tracing::{debug, info};

use crate::catalog::{Catalog, DiscoveryMode};
use crate::error::Result;

/// Everything bound to one device's command channel.
///
/// Shared by reference between the interactive loop and script runs; all
/// methods take `&self`. Exchanges are serialized by the underlying
/// [`FramedExchange`], and at most one script runs at a time.
#[derive(Debug)]
pub struct Session {
    exchange: FramedExchange,
    catalog: RwLock<Catalog>,
    scripts: ScriptLibrary,
    runner: ScriptRunner,
}

impl Session {
    /// Create a session over a closed command channel.
    pub fn new(channel: TransportChannel, scripts: ScriptLibrary) -> Self {
        Self {
            exchange: FramedExchange::new(channel),
            catalog: RwLock::new(Catalog::new()),
            scripts,
            runner: ScriptRunner::new(),
        }
    }

    pub fn open(&self) -> Result<()> {
        self.exchange.open()?;
        info!(address = %self.exchange.address(), "session opened");
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.exchange.close()?;
        debug!(address = %self.exchange.address(), "session closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.exchange.is_open()
    }

    pub fn exchange(&self) -> &FramedExchange {
        &self.exchange
    }

    /// Send one command and report the outcome to `observer`.
    pub fn send<O>(&self, command: &str, observer: &mut O) -> Result<String>
    where
        O: ExchangeObserver + ?Sized,
    {
        let result = self.exchange.exchange(command);
        notify(observer, command, &result);
        Ok(result?)
    }

    /// Rebuild the catalog from the device's `help` answer.
    ///
    /// The catalog lock is not held during I/O; readers see either the old
    /// or the new catalog, never a mix.
    pub fn discover(&self, mode: DiscoveryMode) -> Result<usize> {
        let mut fresh = Catalog::new();
        let count = fresh.discover(&self.exchange, mode)?;
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        info!(count, "command catalog updated");
        Ok(count)
    }

    /// Snapshot of the current catalog.
    pub fn catalog(&self) -> Catalog {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn recognizes(&self, input: &str) -> bool {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .recognizes(input)
    }

    pub fn scripts(&self) -> &ScriptLibrary {
        &self.scripts
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }

    /// Play back the script at `index`.
    pub fn run_script<O>(&self, index: usize, observer: &mut O) -> Result<RunReport>
    where
        O: RunObserver + ?Sized,
    {
        Ok(self
            .runner
            .run(&self.scripts, index, &self.exchange, observer)?)
    }

    /// Play back the script whose file name is `name`.
    pub fn run_script_named<O>(&self, name: &str, observer: &mut O) -> Result<RunReport>
    where
        O: RunObserver + ?Sized,
    {
        let (index, _) = self
            .scripts
            .find(name)
            .ok_or_else(|| RunError::UnknownScript(name.to_string()))?;
        self.run_script(index, observer)
    }
}
