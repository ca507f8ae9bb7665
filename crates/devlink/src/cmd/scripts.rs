use devlink_script::ScriptLibrary;

use crate::cmd::ScriptsArgs;
use crate::exit::{script_error, CliResult, SUCCESS};
use crate::output::{print_scripts, OutputFormat};

pub fn run(args: ScriptsArgs, format: OutputFormat) -> CliResult<i32> {
    let library = ScriptLibrary::from_directory(&args.dir)
        .map_err(|err| script_error("loading scripts failed", err))?;
    print_scripts(&library, format);
    Ok(SUCCESS)
}
