use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use devlink_script::{ScriptError, ScriptLibrary};
use devlink_session::{DiscoveryMode, LogIngestor, LogStream, Session};
use tracing::{debug, info, warn};

use crate::cmd::logs::{finish, poll, print_log_line, LogLines};
use crate::cmd::run::run_selected;
use crate::cmd::{install_ctrlc_handler, ConsoleArgs};
use crate::config::{Defaults, PortRole};
use crate::exit::{io_error, script_error, session_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_catalog, print_scripts, OutputFormat, Printer};

const INPUT_POLL: Duration = Duration::from_millis(100);

/// One line typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleInput {
    Empty,
    Quit,
    Help,
    Scripts,
    Catalog,
    Discover,
    History,
    Run(String),
    UnknownMeta(String),
    Command(String),
}

fn parse_console_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    let Some(meta) = line.strip_prefix(':') else {
        return ConsoleInput::Command(line.to_string());
    };
    let (name, rest) = meta
        .split_once(char::is_whitespace)
        .map_or((meta, ""), |(name, rest)| (name, rest.trim()));
    match name {
        "q" | "quit" | "exit" => ConsoleInput::Quit,
        "help" => ConsoleInput::Help,
        "scripts" => ConsoleInput::Scripts,
        "catalog" => ConsoleInput::Catalog,
        "discover" => ConsoleInput::Discover,
        "history" => ConsoleInput::History,
        "run" if !rest.is_empty() => ConsoleInput::Run(rest.to_string()),
        other => ConsoleInput::UnknownMeta(other.to_string()),
    }
}

pub fn run(args: ConsoleArgs, format: OutputFormat, defaults: &Defaults) -> CliResult<i32> {
    // Every channel is configured before any is opened.
    let command_channel = args.port.channel(defaults, PortRole::Command)?;
    let log_channel = match &args.log_port {
        Some(spec) => Some(defaults.channel(
            PortRole::Log,
            spec,
            args.log_baud,
            args.port.read_timeout()?,
        )?),
        None => None,
    };
    let library = load_library(&args.dir)?;

    let session = Session::new(command_channel, library);
    session
        .open()
        .map_err(|err| session_error("open failed", err))?;
    if !args.no_discover {
        discover(&session);
    }

    let log_stream = match log_channel {
        Some(mut channel) => {
            channel
                .open()
                .map_err(|err| transport_error("log port open failed", err))?;
            Some(
                LogIngestor::new()
                    .spawn(channel)
                    .map_err(|err| session_error("log ingestion failed", err))?,
            )
        }
        None => None,
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;
    let input = spawn_input_reader()?;
    let mut printer = Printer::new(format);

    thread::scope(|scope| {
        let log_printer = log_stream.map(|stream| {
            let running = &running;
            scope.spawn(move || {
                stream_logs(&stream, running, format);
                stream
            })
        });

        let mut history: Vec<String> = Vec::new();
        while running.load(Ordering::SeqCst) {
            let line = match input.recv_timeout(INPUT_POLL) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let parsed = parse_console_line(&line);
            if parsed != ConsoleInput::Empty {
                history.push(line.trim().to_string());
            }

            match parsed {
                ConsoleInput::Empty => {}
                ConsoleInput::Quit => break,
                ConsoleInput::Help => print_help(),
                ConsoleInput::Scripts => print_scripts(session.scripts(), format),
                ConsoleInput::Catalog => print_catalog(&session.catalog(), format),
                ConsoleInput::Discover => discover(&session),
                ConsoleInput::History => {
                    for (number, entry) in history.iter().enumerate() {
                        println!("{:>4}  {entry}", number + 1);
                    }
                }
                ConsoleInput::Run(selector) => {
                    let session = &session;
                    scope.spawn(move || {
                        let mut printer = printer;
                        if let Err(err) = run_selected(session, &selector, &mut printer) {
                            eprintln!("error: {}", session_error("run failed", err));
                        }
                    });
                }
                ConsoleInput::UnknownMeta(name) => {
                    eprintln!("error: unknown console command :{name} (try :help)");
                }
                ConsoleInput::Command(command) => {
                    if !session.recognizes(&command) && !session.catalog().is_empty() {
                        eprintln!("warning: {command:?} is not in the device catalog");
                    }
                    // Failures are already printed by the observer.
                    let _ = session.send(&command, &mut printer);
                }
            }
        }

        running.store(false, Ordering::SeqCst);
        if let Some(handle) = log_printer {
            match handle.join() {
                Ok(stream) => finish(stream),
                Err(_) => warn!("log printer panicked"),
            }
        }
    });

    if let Err(err) = session.close() {
        debug!(error = %err, "closing command channel failed");
    }
    Ok(SUCCESS)
}

fn load_library(dir: &Path) -> CliResult<ScriptLibrary> {
    match ScriptLibrary::from_directory(dir) {
        Ok(library) => Ok(library),
        Err(ScriptError::NoScripts(dir)) => {
            debug!(dir = %dir.display(), "no test scripts found");
            Ok(ScriptLibrary::default())
        }
        Err(err) => Err(script_error("loading scripts failed", err)),
    }
}

fn discover(session: &Session) {
    match session.discover(DiscoveryMode::Listing) {
        Ok(count) => info!(count, "command catalog discovered"),
        Err(err) => warn!(error = %err, "command catalog discovery failed"),
    }
}

fn stream_logs(stream: &LogStream, running: &AtomicBool, format: OutputFormat) {
    let mut lines = LogLines::default();
    while running.load(Ordering::SeqCst) {
        for line in poll(stream, &mut lines) {
            match format {
                OutputFormat::Json => print_log_line(&line, format),
                OutputFormat::Table | OutputFormat::Pretty => println!("[log] {line}"),
            }
        }
    }
}

/// Read stdin lines on a detached thread so Ctrl-C is seen between lines.
fn spawn_input_reader() -> CliResult<Receiver<String>> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("devlink-console-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|err| io_error("console input failed", err))?;
    Ok(receiver)
}

fn print_help() {
    println!("Commands are sent to the device as typed. Console commands:");
    println!("  :run <script|index>  play back a test script");
    println!("  :scripts             list test scripts");
    println!("  :catalog             show the device command catalog");
    println!("  :discover            refresh the catalog from the device");
    println!("  :history             show commands entered this session");
    println!("  :quit                leave the console (also Ctrl-D)");
}
