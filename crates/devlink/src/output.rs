use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use devlink_frame::{ExchangeObserver, FrameError};
use devlink_script::{RunObserver, RunReport, ScriptLibrary, TestScript};
use devlink_session::Catalog;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Prints exchanges and script progress as they happen.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    format: OutputFormat,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl ExchangeObserver for Printer {
    fn on_exchange_complete(&mut self, command: &str, response: &str, error: Option<&FrameError>) {
        print_exchange(command, response, error, self.format);
    }
}

impl RunObserver for Printer {
    fn on_run_started(&mut self, script: &TestScript) {
        if self.format == OutputFormat::Pretty {
            println!("== {} ({} steps)", script.name(), script.commands().len());
        }
    }

    fn on_run_finished(&mut self, report: &RunReport) {
        print_run_summary(report, self.format);
    }
}

#[derive(Serialize)]
struct ExchangeOutput<'a> {
    command: &'a str,
    response: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: String,
}

/// Print one completed (or failed) exchange. On failure `response` holds
/// whatever partial text arrived.
pub fn print_exchange(
    command: &str,
    response: &str,
    error: Option<&FrameError>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = ExchangeOutput {
                command,
                response,
                ok: error.is_none(),
                error: error.map(ToString::to_string),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let status = match error {
                None => "ok".to_string(),
                Some(err) => err.to_string(),
            };
            let mut table = new_table(vec!["COMMAND", "STATUS", "RESPONSE"]);
            table.add_row(vec![command.to_string(), status, display_text(response)]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("> {command}");
            let text = display_text(response);
            if !text.is_empty() {
                println!("{text}");
            }
            if let Some(err) = error {
                println!("! {err}");
            }
        }
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    command: &'a str,
    description: &'a str,
}

pub fn print_catalog(catalog: &Catalog, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let commands: Vec<CommandOutput<'_>> = catalog
                .iter()
                .map(|command| CommandOutput {
                    command: &command.text,
                    description: &command.description,
                })
                .collect();
            print_json(&commands);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["COMMAND", "DESCRIPTION"]);
            for command in catalog.iter() {
                table.add_row(vec![command.text.clone(), command.description.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let width = catalog
                .iter()
                .map(|command| command.text.len())
                .max()
                .unwrap_or(0);
            for command in catalog.iter() {
                println!("{:<width$}  {}", command.text, command.description);
            }
        }
    }
}

#[derive(Serialize)]
struct ScriptOutput<'a> {
    index: usize,
    name: &'a str,
    steps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

pub fn print_scripts(library: &ScriptLibrary, format: OutputFormat) {
    let scripts: Vec<ScriptOutput<'_>> = library
        .iter()
        .enumerate()
        .map(|(index, script)| ScriptOutput {
            index,
            name: script.name(),
            steps: script.commands().len(),
            description: script.description(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&scripts),
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "SCRIPT", "STEPS", "DESCRIPTION"]);
            for script in &scripts {
                table.add_row(vec![
                    script.index.to_string(),
                    script.name.to_string(),
                    script.steps.to_string(),
                    script.description.unwrap_or_default().to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for script in &scripts {
                match script.description {
                    Some(description) => println!(
                        "{:>3}  {} ({} steps): {description}",
                        script.index, script.name, script.steps
                    ),
                    None => println!(
                        "{:>3}  {} ({} steps)",
                        script.index, script.name, script.steps
                    ),
                }
            }
        }
    }
}

#[derive(Serialize)]
struct RunSummaryOutput<'a> {
    script: &'a str,
    steps: usize,
    failures: usize,
    passed: bool,
}

pub fn print_run_summary(report: &RunReport, format: OutputFormat) {
    let out = RunSummaryOutput {
        script: &report.script,
        steps: report.steps.len(),
        failures: report.failures(),
        passed: report.succeeded(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["SCRIPT", "STEPS", "FAILURES", "RESULT"]);
            table.add_row(vec![
                out.script.to_string(),
                out.steps.to_string(),
                out.failures.to_string(),
                pass_fail(out.passed).to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "{}: {} steps, {} failed: {}",
            out.script,
            out.steps,
            out.failures,
            pass_fail(out.passed)
        ),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn pass_fail(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

/// Response text without its trailing line terminator.
fn display_text(response: &str) -> String {
    response.trim_end_matches(['\r', '\n']).to_string()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_text_drops_line_terminator_only() {
        assert_eq!(display_text("ok\r\n"), "ok");
        assert_eq!(display_text("  spaced \n"), "  spaced ");
        assert_eq!(display_text("a\r\nb\r\n"), "a\r\nb");
    }

    #[test]
    fn exchange_json_omits_error_on_success() {
        let out = ExchangeOutput {
            command: "status",
            response: "ok\r\n",
            ok: true,
            error: None,
            timestamp: "0".to_string(),
        };
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["ok"], true);
        assert!(value.get("error").is_none());
    }
}
