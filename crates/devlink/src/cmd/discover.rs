use devlink_script::ScriptLibrary;
use devlink_session::{DiscoveryMode, Session};

use crate::cmd::DiscoverArgs;
use crate::config::{Defaults, PortRole};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_catalog, OutputFormat};

pub fn run(args: DiscoverArgs, format: OutputFormat, defaults: &Defaults) -> CliResult<i32> {
    let channel = args.port.channel(defaults, PortRole::Command)?;
    let session = Session::new(channel, ScriptLibrary::default());
    session
        .open()
        .map_err(|err| session_error("open failed", err))?;

    let mode = if args.single_frame {
        DiscoveryMode::SingleFrame
    } else {
        DiscoveryMode::Listing
    };
    let result = session.discover(mode);
    if let Err(err) = session.close() {
        tracing::debug!(error = %err, "close after discovery failed");
    }
    let count = result.map_err(|err| session_error("discovery failed", err))?;

    tracing::info!(count, "catalog received");
    print_catalog(&session.catalog(), format);
    Ok(SUCCESS)
}
