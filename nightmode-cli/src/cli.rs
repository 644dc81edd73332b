// nightmode-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use nightmode_core::config::{
    DEFAULT_CENTER_GAIN, DEFAULT_LFE_GAIN, DEFAULT_REPLACE_DELAY, DEFAULT_SURROUND_GAIN,
    DEFAULT_TARGET_PEAK_DB,
};
use nightmode_core::{CoreConfig, CoreConfigBuilder, CoreError, OutputCodecs};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CliResult;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Nightmode: stereo night-mode tracks for Matroska files",
    long_about = "Adds normalized and dynamic-range-compressed stereo downmixes of \
                  surround tracks to .mkv files using ffmpeg, ffprobe and mkvmerge."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Optional: Directory for a timestamped log file
    #[arg(long, global = true, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plans (or resumes) a batch and adds night-mode tracks to every job
    Batch(BatchArgs),
    /// Scans a directory and writes the job database without processing
    Plan(PlanArgs),
    /// Creates standalone night-mode tracks for a single audio file
    Create(CreateArgs),
    /// Prints the peak volume of an audio file
    Peak(PeakArgs),
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory searched recursively for .mkv files (required unless resuming)
    #[arg(value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    #[command(flatten)]
    pub processing: ProcessingArgs,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Directory searched recursively for .mkv files
    #[arg(value_name = "DIR")]
    pub input_dir: PathBuf,

    #[command(flatten)]
    pub processing: ProcessingArgs,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Surround audio file to fold down
    #[arg(value_name = "FILE")]
    pub input_file: PathBuf,

    /// Codec of the generated tracks: flac, aac, or both (FLAC plus an AAC copy)
    #[arg(short, long, value_name = "CODEC", value_parser = parse_codecs, default_value = "flac")]
    pub codec: OutputCodecs,

    /// Optional: Sample rate of the generated tracks (measured from the input when omitted)
    #[arg(short = 'r', long, value_name = "HZ", value_parser = clap::value_parser!(u32).range(1..))]
    pub samplerate: Option<u32>,

    /// Optional: Directory for the generated tracks (defaults to the input's directory)
    #[arg(short, long, value_name = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub mix: MixArgs,
}

impl CreateArgs {
    /// Builds and validates the core configuration. Standalone tracks keep
    /// no state, so only the level and downmix settings apply.
    pub fn to_config(&self) -> CliResult<CoreConfig> {
        let config = self.mix.apply(CoreConfigBuilder::new()).build();
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct PeakArgs {
    /// Audio or video file to measure
    #[arg(value_name = "FILE")]
    pub input_file: PathBuf,
}

/// Options of the commands that run batches.
#[derive(Args, Debug, Clone)]
pub struct ProcessingArgs {
    /// Directory holding the job database and resume state
    #[arg(long, value_name = "STATE_DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// Optional: Directory for intermediate files (defaults to STATE_DIR/work)
    #[arg(long, value_name = "WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    #[command(flatten)]
    pub mix: MixArgs,

    /// Seconds to wait before a verified file replaces its source
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_REPLACE_DELAY.as_secs())]
    pub replace_delay: u64,
}

impl ProcessingArgs {
    /// Builds and validates the core configuration.
    pub fn to_config(&self) -> CliResult<CoreConfig> {
        let work_dir = self
            .work_dir
            .clone()
            .unwrap_or_else(|| self.state_dir.join("work"));

        let builder = CoreConfigBuilder::new()
            .state_dir(self.state_dir.clone())
            .work_dir(work_dir)
            .replace_delay(Duration::from_secs(self.replace_delay));
        let config = self.mix.apply(builder).build();
        config.validate()?;
        Ok(config)
    }
}

/// Level and downmix options shared by every command that creates tracks.
#[derive(Args, Debug, Clone)]
pub struct MixArgs {
    /// Peak level in dB that every generated track is normalized to
    #[arg(long, value_name = "DB", allow_hyphen_values = true, default_value_t = DEFAULT_TARGET_PEAK_DB)]
    pub target_peak: f64,

    /// Downmix gain of the surround channels
    #[arg(long, value_name = "GAIN", default_value_t = DEFAULT_SURROUND_GAIN)]
    pub surround_gain: f64,

    /// Downmix gain of the center channel
    #[arg(long, value_name = "GAIN", default_value_t = DEFAULT_CENTER_GAIN)]
    pub center_gain: f64,

    /// Downmix gain of the LFE channel
    #[arg(long, value_name = "GAIN", default_value_t = DEFAULT_LFE_GAIN)]
    pub lfe_gain: f64,
}

impl MixArgs {
    fn apply(&self, builder: CoreConfigBuilder) -> CoreConfigBuilder {
        builder
            .target_peak_db(self.target_peak)
            .surround_gain(self.surround_gain)
            .center_gain(self.center_gain)
            .lfe_gain(self.lfe_gain)
    }
}

fn parse_codecs(value: &str) -> Result<OutputCodecs, String> {
    value.parse().map_err(|e: CoreError| e.to_string())
}
