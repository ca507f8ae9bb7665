use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devlink_session::{LogIngestor, LogStream};
use serde::Serialize;

use crate::cmd::{install_ctrlc_handler, LogsArgs};
use crate::config::{Defaults, PortRole};
use crate::exit::{session_error, transport_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: LogsArgs, format: OutputFormat, defaults: &Defaults) -> CliResult<i32> {
    let mut channel = args.port.channel(defaults, PortRole::Log)?;
    channel
        .open()
        .map_err(|err| transport_error("open failed", err))?;
    let stream = LogIngestor::new()
        .spawn(channel)
        .map_err(|err| session_error("log ingestion failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let mut lines = LogLines::default();
    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        for line in poll(&stream, &mut lines) {
            print_log_line(&line, format);
            printed = printed.saturating_add(1);
            if args.lines.is_some_and(|limit| printed >= limit) {
                finish(stream);
                return Ok(SUCCESS);
            }
        }
        if !stream.is_alive() {
            break;
        }
    }

    if let Some(rest) = lines.flush() {
        print_log_line(&rest, format);
    }
    finish(stream);
    Ok(SUCCESS)
}

/// Wait briefly for log bytes and return the lines they complete.
pub(crate) fn poll(stream: &LogStream, lines: &mut LogLines) -> Vec<String> {
    let mut complete = Vec::new();
    if let Some(first) = stream.recv_timeout(POLL_INTERVAL) {
        for byte in std::iter::once(first).chain(stream.drain()) {
            complete.extend(lines.push(byte));
        }
    }
    complete
}

pub(crate) fn finish(stream: LogStream) {
    if let Some(mut channel) = stream.stop() {
        if let Err(err) = channel.close() {
            tracing::debug!(error = %err, "closing log channel failed");
        }
    }
}

#[derive(Serialize)]
struct LogLineOutput<'a> {
    line: &'a str,
    timestamp_ms: u128,
}

pub(crate) fn print_log_line(line: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = LogLineOutput {
                line,
                timestamp_ms: std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_millis())
                    .unwrap_or(0),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("{line}"),
    }
}

/// Splits the raw log byte stream into lines.
///
/// Lines end at `\n`; a trailing `\r` is dropped. Invalid UTF-8 is replaced.
#[derive(Debug, Default)]
pub(crate) struct LogLines {
    pending: Vec<u8>,
}

impl LogLines {
    pub(crate) fn push(&mut self, byte: u8) -> Option<String> {
        if byte != b'\n' {
            self.pending.push(byte);
            return None;
        }
        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whatever arrived after the last newline.
    pub(crate) fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}
