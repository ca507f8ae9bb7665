use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use devlink_transport::{
    DataBits, Parity, StopBits, TerminatorPair, TransportChannel, TransportConfig,
};
use serde::Deserialize;
use tracing::debug;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, USAGE};

/// Looked up in the working directory when no config path is given.
pub const DEFAULTS_FILE: &str = "defaults.yaml";

/// Line settings for the command and log ports.
///
/// Line parameters missing from the file keep their built-in values.
/// Terminators never do: a file without them leaves the key unset, and
/// building a channel for that port fails.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub cli_baud: u32,
    pub cli_data_bits: u8,
    pub cli_stop_bits: u8,
    pub cli_parity: String,
    #[serde(default)]
    pub cli_tx_terminator: Option<String>,
    #[serde(default)]
    pub cli_rx_terminator: Option<String>,
    pub logs_baud: u32,
    pub logs_data_bits: u8,
    pub logs_stop_bits: u8,
    pub logs_parity: String,
    #[serde(default)]
    pub logs_tx_terminator: Option<String>,
    #[serde(default)]
    pub logs_rx_terminator: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            cli_baud: 9600,
            cli_data_bits: 8,
            cli_stop_bits: 1,
            cli_parity: "N".to_string(),
            cli_tx_terminator: Some("\n".to_string()),
            cli_rx_terminator: Some("\r\n".to_string()),
            logs_baud: 115_200,
            logs_data_bits: 8,
            logs_stop_bits: 1,
            logs_parity: "N".to_string(),
            logs_tx_terminator: Some("\n".to_string()),
            logs_rx_terminator: Some("\n".to_string()),
        }
    }
}

/// Which device port a channel is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    Command,
    Log,
}

impl PortRole {
    fn key_prefix(self) -> &'static str {
        match self {
            PortRole::Command => "cli",
            PortRole::Log => "logs",
        }
    }
}

impl Defaults {
    /// Load the defaults file.
    ///
    /// An explicit path must exist. Without one, `defaults.yaml` in the
    /// working directory is used if present, else the built-in values.
    pub fn load(explicit: Option<&Path>) -> CliResult<Self> {
        let path = match explicit {
            Some(path) => path,
            None if Path::new(DEFAULTS_FILE).is_file() => Path::new(DEFAULTS_FILE),
            None => {
                debug!("no defaults file, using built-in line settings");
                return Ok(Self::default());
            }
        };
        let text = std::fs::read_to_string(path).map_err(|err| {
            let context = format!("failed reading {}", path.display());
            if err.kind() == std::io::ErrorKind::NotFound {
                CliError::new(USAGE, format!("{context}: {err}"))
            } else {
                io_error(&context, err)
            }
        })?;
        let defaults = Self::parse(&text)
            .map_err(|err| CliError::new(err.code, format!("{}: {}", path.display(), err)))?;
        debug!(path = %path.display(), "defaults loaded");
        Ok(defaults)
    }

    /// Parse a defaults file. Terminators come only from the file, so an
    /// empty file sets none.
    pub fn parse(text: &str) -> CliResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self {
                cli_tx_terminator: None,
                cli_rx_terminator: None,
                logs_tx_terminator: None,
                logs_rx_terminator: None,
                ..Self::default()
            });
        }
        serde_saphyr::from_str(text)
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid defaults file: {err}")))
    }

    /// Build a closed channel for `role`.
    ///
    /// `spec` is a device path with an optional `:BAUD` suffix; `baud`
    /// overrides both the suffix and the file.
    pub fn channel(
        &self,
        role: PortRole,
        spec: &str,
        baud: Option<u32>,
        timeout: Duration,
    ) -> CliResult<TransportChannel> {
        let (address, suffix_baud) = split_port_spec(spec);
        let settings = self.settings(role);
        let prefix = role.key_prefix();

        let data_bits = DataBits::try_from(settings.data_bits)
            .map_err(|err| invalid(&format!("{prefix}_data_bits"), err))?;
        let stop_bits = StopBits::try_from(settings.stop_bits)
            .map_err(|err| invalid(&format!("{prefix}_stop_bits"), err))?;
        let parity = Parity::from_str(settings.parity)
            .map_err(|err| invalid(&format!("{prefix}_parity"), err))?;
        let tx = settings
            .tx
            .ok_or_else(|| missing(&format!("{prefix}_tx_terminator")))?;
        let rx = settings
            .rx
            .ok_or_else(|| missing(&format!("{prefix}_rx_terminator")))?;
        let terminators = TerminatorPair::new(tx, rx)
            .map_err(|err| invalid(&format!("{prefix} terminators"), err))?;

        let config = TransportConfig::new(address, baud.or(suffix_baud).unwrap_or(settings.baud))
            .with_data_bits(data_bits)
            .with_stop_bits(stop_bits)
            .with_parity(parity)
            .with_timeout(timeout);
        debug!(
            role = prefix,
            address = %config.address,
            settings = %config.line_settings(),
            "channel configured"
        );
        Ok(TransportChannel::serial(config, terminators))
    }

    fn settings(&self, role: PortRole) -> PortSettings<'_> {
        match role {
            PortRole::Command => PortSettings {
                baud: self.cli_baud,
                data_bits: self.cli_data_bits,
                stop_bits: self.cli_stop_bits,
                parity: &self.cli_parity,
                tx: self.cli_tx_terminator.as_deref(),
                rx: self.cli_rx_terminator.as_deref(),
            },
            PortRole::Log => PortSettings {
                baud: self.logs_baud,
                data_bits: self.logs_data_bits,
                stop_bits: self.logs_stop_bits,
                parity: &self.logs_parity,
                tx: self.logs_tx_terminator.as_deref(),
                rx: self.logs_rx_terminator.as_deref(),
            },
        }
    }
}

struct PortSettings<'a> {
    baud: u32,
    data_bits: u8,
    stop_bits: u8,
    parity: &'a str,
    tx: Option<&'a str>,
    rx: Option<&'a str>,
}

fn invalid(key: &str, err: impl std::fmt::Display) -> CliError {
    CliError::new(DATA_INVALID, format!("invalid {key}: {err}"))
}

fn missing(key: &str) -> CliError {
    CliError::new(DATA_INVALID, format!("missing {key} in defaults file"))
}

/// Split `/dev/ttyUSB0:115200` into the path and baud. A suffix that is not
/// a number stays part of the path.
fn split_port_spec(spec: &str) -> (&str, Option<u32>) {
    match spec.rsplit_once(':') {
        Some((address, baud)) if !address.is_empty() => match baud.parse() {
            Ok(baud) => (address, Some(baud)),
            Err(_) => (spec, None),
        },
        _ => (spec, None),
    }
}
