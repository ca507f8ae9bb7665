use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use devlink_transport::{TransportChannel, DEFAULT_TIMEOUT};

use crate::config::{Defaults, PortRole};
use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod console;
pub mod discover;
pub mod logs;
pub mod run;
pub mod scripts;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one command and print the response.
    Send(SendArgs),
    /// Ask the device for its command catalog.
    Discover(DiscoverArgs),
    /// List the test scripts in a directory.
    Scripts(ScriptsArgs),
    /// Play a test script back against the device.
    Run(RunArgs),
    /// Stream the device's log port.
    Logs(LogsArgs),
    /// Interactive command console with optional log streaming.
    Console(ConsoleArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format, &Defaults::load(config)?),
        Command::Discover(args) => discover::run(args, format, &Defaults::load(config)?),
        Command::Scripts(args) => scripts::run(args, format),
        Command::Run(args) => run::run(args, format, &Defaults::load(config)?),
        Command::Logs(args) => logs::run(args, format, &Defaults::load(config)?),
        Command::Console(args) => console::run(args, format, &Defaults::load(config)?),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Clone)]
pub struct PortArgs {
    /// Serial device, optionally with a baud suffix (e.g. /dev/ttyUSB0:115200).
    pub port: String,
    /// Baud rate. Overrides the defaults file and any port suffix.
    #[arg(long)]
    pub baud: Option<u32>,
    /// Read timeout, which also ends a multi-line listing (e.g. 1s, 250ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

impl PortArgs {
    pub fn channel(&self, defaults: &Defaults, role: PortRole) -> CliResult<TransportChannel> {
        defaults.channel(role, &self.port, self.baud, self.read_timeout()?)
    }

    pub fn read_timeout(&self) -> CliResult<Duration> {
        self.timeout
            .as_deref()
            .map_or(Ok(DEFAULT_TIMEOUT), parse_duration)
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Command to send; words are joined with single spaces. Put `--` first
    /// when the command starts with a hyphen.
    #[arg(required = true, num_args = 1..)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Expect the whole listing in one terminated response.
    #[arg(long)]
    pub single_frame: bool,
}

#[derive(Args, Debug)]
pub struct ScriptsArgs {
    /// Directory searched for test_*.yaml scripts.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Script file name (e.g. test_led.yaml) or index from `devlink scripts`.
    pub script: String,
    /// Directory searched for test_*.yaml scripts.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Exit after N complete log lines.
    #[arg(long)]
    pub lines: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ConsoleArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Log port streamed alongside the console.
    #[arg(long, value_name = "PORT")]
    pub log_port: Option<String>,
    /// Baud rate for the log port.
    #[arg(long)]
    pub log_baud: Option<u32>,
    /// Directory searched for test_*.yaml scripts.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
    /// Skip catalog discovery at startup.
    #[arg(long)]
    pub no_discover: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration(" ").is_err());
    }

    #[test]
    fn port_timeout_defaults_to_transport_default() {
        let args = PortArgs {
            port: "/dev/ttyUSB0".to_string(),
            baud: None,
            timeout: None,
        };
        assert_eq!(args.read_timeout().unwrap(), DEFAULT_TIMEOUT);
    }
}
