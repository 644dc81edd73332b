//! Implementation of the 'plan' subcommand.
//!
//! Scans a directory, asks the operator which tracks to keep and which to
//! fold down, and writes the job database for a later `batch` run.

use crate::cli::PlanArgs;
use crate::error::CliResult;
use crate::terminal::{self, TermPrompter};

use nightmode_core::external::Tool;
use nightmode_core::{
    CoreConfig, CoreError, Plan, Prompter, SystemToolRunner, ToolRunner, check_dependency,
    enumerate_jobs,
};
use std::fs;
use std::path::Path;

pub fn run_plan(args: PlanArgs) -> CliResult<()> {
    let config = args.processing.to_config()?;
    if !args.input_dir.is_dir() {
        return Err(CoreError::InputNotFound(args.input_dir));
    }
    check_dependency(Tool::Ffprobe)?;

    let runner = SystemToolRunner::new();
    let mut prompter = TermPrompter::new();
    plan_batch(&args.input_dir, &runner, &mut prompter, &config)?;
    Ok(())
}

/// Runs the planning phase into `config.state_dir` and reports the outcome.
pub fn plan_batch<R, P>(
    input_dir: &Path,
    runner: &R,
    prompter: &mut P,
    config: &CoreConfig,
) -> CliResult<Plan>
where
    R: ToolRunner + ?Sized,
    P: Prompter + ?Sized,
{
    terminal::print_section("Planning");
    terminal::print_status("Input directory", &input_dir.display().to_string());
    terminal::print_status("State directory", &config.state_dir.display().to_string());
    fs::create_dir_all(&config.state_dir)?;

    let plan = enumerate_jobs(input_dir, runner, prompter, config)?;

    terminal::print_status("Jobs", &plan.jobs.len().to_string());
    terminal::print_status("Rejected files", &plan.rejected.len().to_string());
    terminal::print_success(&format!(
        "Job database written to {}",
        config.jobs_database_path().display()
    ));
    Ok(plan)
}
