//! Implementation of the 'create' subcommand.
//!
//! Folds one surround audio file down to stereo and writes the plain,
//! loudness-normalized and DRC variants next to it (or into `--output-dir`)
//! as FLAC, AAC, or both.

use crate::cli::CreateArgs;
use crate::error::{CliErrorContext, CliResult};
use crate::terminal;

use nightmode_core::external::Tool;
use nightmode_core::{CoreError, SystemToolRunner, check_dependency, create_nightmode_tracks};

use std::path::{Path, PathBuf};
use std::time::Instant;

pub fn run_create(args: CreateArgs) -> CliResult<()> {
    let start_time = Instant::now();
    let config = args.to_config()?;
    if !args.input_file.is_file() {
        return Err(CoreError::InputNotFound(args.input_file));
    }
    let output_dir = output_dir_for(&args.input_file, args.output_dir.as_deref())?;

    check_dependency(Tool::Ffmpeg)?;
    if args.samplerate.is_none() {
        check_dependency(Tool::Ffprobe)?;
    }
    let runner = SystemToolRunner::new().with_progress(console::Term::stderr().is_term());

    terminal::print_section("Night-mode tracks");
    terminal::print_status("Input", &args.input_file.display().to_string());
    terminal::print_status("Codec", &args.codec.to_string());
    let sample_rate = args.samplerate.map(|rate| rate.to_string());
    if let Some(rate) = &sample_rate {
        terminal::print_status("Sample rate", rate);
    }

    let written = create_nightmode_tracks(
        &runner,
        &args.input_file,
        &output_dir,
        args.codec,
        sample_rate.as_deref(),
        &config,
    )?;
    for path in &written {
        terminal::print_success(&path.display().to_string());
    }
    terminal::print_status(
        "Elapsed",
        &nightmode_core::format_duration(start_time.elapsed().as_secs_f64()),
    );
    Ok(())
}

/// Explicit output directory, or the directory containing `input`.
fn output_dir_for(input: &Path, explicit: Option<&Path>) -> CliResult<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    let parent = input.parent().cli_with_context(|| {
        format!("Could not determine parent directory for {}", input.display())
    })?;
    Ok(if parent.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        parent.to_path_buf()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_defaults_to_input_directory() {
        assert_eq!(
            output_dir_for(Path::new("/audio/movie.dts"), None).unwrap(),
            PathBuf::from("/audio")
        );
        assert_eq!(
            output_dir_for(Path::new("movie.dts"), None).unwrap(),
            PathBuf::from(".")
        );
        assert_eq!(
            output_dir_for(Path::new("/audio/movie.dts"), Some(Path::new("/out"))).unwrap(),
            PathBuf::from("/out")
        );
    }
}
