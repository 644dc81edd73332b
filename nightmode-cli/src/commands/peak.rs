//! Implementation of the 'peak' subcommand.

use crate::cli::PeakArgs;
use crate::error::CliResult;

use nightmode_core::external::Tool;
use nightmode_core::utils::display_name;
use nightmode_core::{CoreError, SystemToolRunner, check_dependency, measure_peak};

pub fn run_peak(args: PeakArgs) -> CliResult<()> {
    if !args.input_file.is_file() {
        return Err(CoreError::InputNotFound(args.input_file));
    }
    check_dependency(Tool::Ffmpeg)?;

    let peak = measure_peak(&SystemToolRunner::new(), &args.input_file)?;
    println!("{}: {} dB", display_name(&args.input_file), peak);
    Ok(())
}
