use devlink_script::ScriptLibrary;
use devlink_session::Session;

use crate::cmd::SendArgs;
use crate::config::{Defaults, PortRole};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{OutputFormat, Printer};

pub fn run(args: SendArgs, format: OutputFormat, defaults: &Defaults) -> CliResult<i32> {
    let channel = args.port.channel(defaults, PortRole::Command)?;
    let session = Session::new(channel, ScriptLibrary::default());
    session
        .open()
        .map_err(|err| session_error("open failed", err))?;

    let command = args.command.join(" ");
    let result = session.send(&command, &mut Printer::new(format));
    if let Err(err) = session.close() {
        tracing::debug!(error = %err, "close after send failed");
    }
    result.map_err(|err| session_error("exchange failed", err))?;

    Ok(SUCCESS)
}
