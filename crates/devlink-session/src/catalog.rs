use devlink_frame::CommandExchange;
use tracing::{debug, warn};

use crate::error::CatalogError;

/// Command the device answers with its catalog listing.
pub const DISCOVERY_COMMAND: &str = "help";

/// Delimiter framing the command text in a catalog line.
///
/// A catalog line looks like `` `led on`Turn the LED on ``.
pub const CATALOG_MARKER: char = '`';

/// One device command with its human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub text: String,
    pub description: String,
}

/// How the discovery response is gathered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// The whole listing arrives as one frame ending in the rx terminator.
    SingleFrame,
    /// Each listing line is its own frame; the listing ends when the device goes quiet.
    #[default]
    Listing,
}

/// Parse a discovery response into commands, in order of appearance.
///
/// Lines not starting with [`CATALOG_MARKER`] (banners, echoes, prompts)
/// are ignored. A marker line must split into exactly three pieces on the
/// marker; anything else fails the whole parse.
pub fn parse_catalog(text: &str) -> Result<Vec<Command>, CatalogError> {
    let mut commands = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if !line.starts_with(CATALOG_MARKER) {
            continue;
        }
        let pieces: Vec<&str> = line.split(CATALOG_MARKER).collect();
        let [_, text, description] = pieces.as_slice() else {
            return Err(CatalogError::Malformed {
                line: line.to_string(),
            });
        };
        commands.push(Command {
            text: (*text).to_string(),
            description: description.trim().to_string(),
        });
    }
    Ok(commands)
}

/// The commands a device advertises.
///
/// Empty until the first successful [`discover`](Self::discover); each
/// later success replaces the contents wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    commands: Vec<Command>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_commands(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    /// Query the device and rebuild the catalog from its answer.
    ///
    /// On failure the catalog keeps its previous contents.
    pub fn discover<E>(&mut self, exchange: &E, mode: DiscoveryMode) -> Result<usize, CatalogError>
    where
        E: CommandExchange + ?Sized,
    {
        let response = match mode {
            DiscoveryMode::SingleFrame => exchange.exchange(DISCOVERY_COMMAND),
            DiscoveryMode::Listing => exchange.collect_listing(DISCOVERY_COMMAND),
        };
        let response = response.inspect_err(|err| {
            warn!(error = %err, "catalog discovery exchange failed");
        })?;

        let commands = parse_catalog(&response).inspect_err(|err| {
            warn!(error = %err, "catalog response rejected");
        })?;
        debug!(count = commands.len(), ?mode, "catalog discovered");
        self.commands = commands;
        Ok(self.commands.len())
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Whether the first word of `input` starts with the first word of a
    /// known command. Blank input is never recognized.
    pub fn recognizes(&self, input: &str) -> bool {
        let Some(typed) = input.split_whitespace().next() else {
            return false;
        };
        self.commands.iter().any(|command| {
            command
                .text
                .split_whitespace()
                .next()
                .is_some_and(|head| typed.starts_with(head))
        })
    }
}
