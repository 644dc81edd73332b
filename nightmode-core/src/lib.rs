//! Core library for adding night-mode stereo tracks to Matroska files using
//! ffmpeg, ffprobe and mkvmerge.
//!
//! Work is split into an interactive planning phase, which produces a job
//! database, and a non-interactive execution phase, which processes the jobs
//! under a resumable ledger.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use nightmode_core::{AutoProceed, CoreConfig, ResumeLedger, SystemToolRunner};
//! use nightmode_core::{load_jobs_database, process_jobs};
//! use std::path::PathBuf;
//!
//! let config = CoreConfig::new(PathBuf::from("/srv/nightmode"), PathBuf::from("/scratch"));
//! config.validate().unwrap();
//!
//! let jobs = load_jobs_database(&config.jobs_database_path()).unwrap();
//! let ledger = ResumeLedger::load_or_init(&config, &jobs).unwrap();
//! let runner = SystemToolRunner::new();
//!
//! let results = process_jobs(&runner, &mut AutoProceed, &config, ledger).unwrap();
//! println!("{} files updated", results.len());
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod external;
pub mod jobs;
pub mod processing;
pub mod temp_files;
pub mod utils;

// Re-exports for public API
pub use config::{CoreConfig, CoreConfigBuilder, DownmixGains};
pub use discovery::find_container_files;
pub use error::{CoreError, CoreResult};
pub use external::{
    ProbedStream, SystemToolRunner, Tool, ToolCommand, ToolOutput, ToolRunner, TrackDescriptor,
    check_all_dependencies, check_dependency,
};
pub use jobs::ledger::{ResumeLedger, Stage};
pub use jobs::planner::{Plan, Prompter, enumerate_jobs, plan_jobs};
pub use jobs::{AudioCodec, Job, SurroundTrack, TrackId, load_jobs_database};
pub use processing::audio::{OutputCodecs, create_nightmode_tracks, measure_peak, normalize};
pub use processing::{
    AutoProceed, GateDecision, JobResult, ReplaceGate, WorkFiles, next_stage, process_jobs,
};
pub use utils::format_duration;
