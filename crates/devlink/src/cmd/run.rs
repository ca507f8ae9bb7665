use devlink_script::{RunReport, ScriptLibrary};
use devlink_session::{Session, SessionError};

use crate::cmd::RunArgs;
use crate::config::{Defaults, PortRole};
use crate::exit::{script_error, session_error, CliResult, SCRIPT_FAILURES, SUCCESS};
use crate::output::{OutputFormat, Printer};

pub fn run(args: RunArgs, format: OutputFormat, defaults: &Defaults) -> CliResult<i32> {
    let library = ScriptLibrary::from_directory(&args.dir)
        .map_err(|err| script_error("loading scripts failed", err))?;
    let channel = args.port.channel(defaults, PortRole::Command)?;
    let session = Session::new(channel, library);
    session
        .open()
        .map_err(|err| session_error("open failed", err))?;

    let result = run_selected(&session, &args.script, &mut Printer::new(format));
    if let Err(err) = session.close() {
        tracing::debug!(error = %err, "close after run failed");
    }
    let report = result.map_err(|err| session_error("run failed", err))?;

    Ok(exit_code(&report))
}

/// Run `selector` as a script name, falling back to an index.
pub(crate) fn run_selected(
    session: &Session,
    selector: &str,
    printer: &mut Printer,
) -> Result<RunReport, SessionError> {
    if session.scripts().find(selector).is_none() {
        if let Ok(index) = selector.parse::<usize>() {
            return session.run_script(index, printer);
        }
    }
    session.run_script_named(selector, printer)
}

fn exit_code(report: &RunReport) -> i32 {
    if report.succeeded() {
        SUCCESS
    } else {
        SCRIPT_FAILURES
    }
}

#[cfg(test)]
mod tests {
    use devlink_frame::FrameError;
    use devlink_script::StepOutcome;

    use super::*;

    fn report(results: Vec<Result<String, FrameError>>) -> RunReport {
        RunReport {
            script: "test_x.yaml".to_string(),
            steps: results
                .into_iter()
                .map(|result| StepOutcome {
                    command: "cmd".to_string(),
                    result,
                })
                .collect(),
        }
    }

    #[test]
    fn any_failed_step_fails_the_run() {
        assert_eq!(exit_code(&report(vec![Ok("ok".into())])), SUCCESS);
        assert_eq!(
            exit_code(&report(vec![Ok("ok".into()), Err(FrameError::NotOpen)])),
            SCRIPT_FAILURES
        );
    }
}
