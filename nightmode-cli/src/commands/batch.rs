//! Implementation of the 'batch' subcommand.
//!
//! Offers to resume saved state, otherwise plans a new batch from the given
//! directory, then processes every pending job under the resume ledger. A
//! batch that runs to completion removes its job database so the next run
//! starts clean.

use crate::cli::BatchArgs;
use crate::commands::plan::plan_batch;
use crate::error::{CliErrorContext, CliResult};
use crate::terminal::{self, CountdownGate, TermPrompter};

use nightmode_core::jobs::planner::{ask_until, parse_yes_no};
use nightmode_core::temp_files::remove_if_exists;
use nightmode_core::utils::display_name;
use nightmode_core::{
    CoreConfig, CoreError, JobResult, ResumeLedger, SystemToolRunner, check_all_dependencies,
    format_duration, load_jobs_database, process_jobs,
};

use std::path::Path;
use std::time::{Duration, Instant};

pub const RESUME_QUESTION: &str = "Want to resume? (y or n): ";

const MISSING_INPUT: &str =
    "an input directory is required unless resuming (usage: nightmode batch [OPTIONS] <DIR>)";

pub fn run_batch(args: BatchArgs) -> CliResult<()> {
    let total_start_time = Instant::now();
    let config = args.processing.to_config()?;
    let mut prompter = TermPrompter::new();

    let resume =
        config.has_saved_state() && ask_until(&mut prompter, RESUME_QUESTION, parse_yes_no)?;
    let input_dir = select_input(resume, args.input_dir.as_deref())?;
    if let Some(dir) = input_dir {
        if !dir.is_dir() {
            return Err(CoreError::InputNotFound(dir.to_path_buf()));
        }
    }

    check_all_dependencies()?;
    let runner = SystemToolRunner::new().with_progress(console::Term::stderr().is_term());

    if let Some(dir) = input_dir {
        ResumeLedger::reset(&config)?;
        plan_batch(dir, &runner, &mut prompter, &config)?;
    }

    let jobs_path = config.jobs_database_path();
    let jobs = load_jobs_database(&jobs_path)?;
    if jobs.is_empty() {
        log::info!("No jobs to process");
        finish_batch(&config)?;
        return Ok(());
    }

    let ledger = ResumeLedger::load_or_init(&config, &jobs)?;
    terminal::print_section("Processing");
    terminal::print_status("Pending jobs", &ledger.pending().len().to_string());
    terminal::print_status("Work directory", &config.work_dir.display().to_string());

    let mut gate = CountdownGate::new();
    let results = process_jobs(&runner, &mut gate, &config, ledger)?;
    finish_batch(&config)?;

    print_summary(&results, total_start_time.elapsed());
    Ok(())
}

/// Directory to plan from, or `None` when resuming saved state.
fn select_input(resume: bool, input_dir: Option<&Path>) -> CliResult<Option<&Path>> {
    match (resume, input_dir) {
        (true, Some(dir)) => {
            log::warn!("Resuming the saved batch, ignoring {}", dir.display());
            Ok(None)
        }
        (true, None) => Ok(None),
        (false, Some(dir)) => Ok(Some(dir)),
        (false, None) => Err(CoreError::Config(MISSING_INPUT.to_string())),
    }
}

fn finish_batch(config: &CoreConfig) -> CliResult<()> {
    ResumeLedger::reset(config)?;
    let jobs_path = config.jobs_database_path();
    remove_if_exists(&jobs_path)
        .cli_with_context(|| format!("Failed to remove {}", jobs_path.display()))
}

fn print_summary(results: &[JobResult], total: Duration) {
    terminal::print_section("Summary");
    for result in results {
        terminal::print_status(
            &display_name(&result.source_file),
            &format!(
                "{} tracks added in {}",
                result.generated_tracks,
                format_duration(result.duration.as_secs_f64())
            ),
        );
    }
    terminal::print_status("Files updated", &results.len().to_string());
    terminal::print_status("Total time", &format_duration(total.as_secs_f64()));
}
