//! Configuration structures and constants for the nightmode-core library.
//!
//! The configuration is built once at process start (normally by the CLI)
//! and passed explicitly to every stage. Nothing in the library reads
//! ambient global state.

mod builder;

use crate::error::{CoreError, CoreResult};

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use builder::CoreConfigBuilder;

// Default constants

/// Peak level, in dBFS, every generated track is normalized to.
pub const DEFAULT_TARGET_PEAK_DB: f64 = -0.5;

/// Gain applied to the non-center channels when folding down to stereo.
/// 0.707 is the standard -3 dB pan law.
pub const DEFAULT_SURROUND_GAIN: f64 = 0.707;

/// Gain applied to the center channel before it is split across both sides.
pub const DEFAULT_CENTER_GAIN: f64 = 1.0;

/// Gain applied to the LFE channel before it is split across both sides.
pub const DEFAULT_LFE_GAIN: f64 = 1.0;

/// Bitrate used when the target codec is AAC.
pub const DEFAULT_AAC_BITRATE: &str = "256k";

/// FLAC compression level for every lossless intermediate and output.
pub const FLAC_COMPRESSION_LEVEL: u8 = 8;

/// Ratio of the dynamic range compressor. Fixed at 4:1.
pub const DRC_RATIO: u8 = 4;

/// How long the replace window stays open before the source is overwritten.
pub const DEFAULT_REPLACE_DELAY: Duration = Duration::from_secs(15);

/// File names of the persisted state, relative to the state directory.
pub const JOBS_DATABASE_FILE: &str = "jobs_database.json";
pub const RESUME_DATABASE_FILE: &str = "resume_database.json";
pub const RESUME_STAGE_FILE: &str = "resume.txt";
pub const REJECTED_FILES_FILE: &str = "rejected_files.txt";

/// Channel gains of the surround-to-stereo fold-down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownmixGains {
    pub surround: f64,
    pub lfe: f64,
    pub center: f64,
}

impl Default for DownmixGains {
    fn default() -> Self {
        Self {
            surround: DEFAULT_SURROUND_GAIN,
            lfe: DEFAULT_LFE_GAIN,
            center: DEFAULT_CENTER_GAIN,
        }
    }
}

/// Main configuration structure for the nightmode-core library.
///
/// All fields have defaults; only the two directories usually need to be
/// chosen. `state_dir` holds the job database and resume files, `work_dir`
/// holds the per-job scratch files (the source copy, extracted audio,
/// generated tracks and the remuxed container).
///
/// # Examples
///
/// ```rust
/// use nightmode_core::config::CoreConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = CoreConfigBuilder::new()
///     .state_dir(PathBuf::from("/tmp/nightmode"))
///     .target_peak_db(-1.0)
///     .surround_gain(0.6)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Directory holding the job database and resume files
    pub state_dir: PathBuf,

    /// Directory for per-job scratch files
    pub work_dir: PathBuf,

    /// Peak level every generated track must read after normalization
    pub target_peak_db: f64,

    /// Fold-down gains used for the night-mode tracks
    pub downmix: DownmixGains,

    /// Bitrate for AAC output
    pub aac_bitrate: String,

    /// Delay of the last-chance window before the source is replaced
    pub replace_delay: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("."),
            work_dir: PathBuf::from("."),
            target_peak_db: DEFAULT_TARGET_PEAK_DB,
            downmix: DownmixGains::default(),
            aac_bitrate: DEFAULT_AAC_BITRATE.to_string(),
            replace_delay: DEFAULT_REPLACE_DELAY,
        }
    }
}

impl CoreConfig {
    /// Creates a configuration with default settings for the given directories.
    pub fn new(state_dir: PathBuf, work_dir: PathBuf) -> Self {
        Self {
            state_dir,
            work_dir,
            ..Default::default()
        }
    }

    /// Checks the numeric settings for values the external tools would reject
    /// or that could never verify.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.target_peak_db.is_finite() || self.target_peak_db > 0.0 {
            return Err(CoreError::Config(format!(
                "target peak must be a finite level at or below 0 dB, got {}",
                self.target_peak_db
            )));
        }

        let gains = [
            ("surround", self.downmix.surround),
            ("lfe", self.downmix.lfe),
            ("center", self.downmix.center),
        ];
        for (name, gain) in gains {
            if !gain.is_finite() || !(0.0..=2.0).contains(&gain) {
                return Err(CoreError::Config(format!(
                    "{name} gain must be between 0 and 2, got {gain}"
                )));
            }
        }

        if self.aac_bitrate.trim().is_empty() {
            return Err(CoreError::Config("AAC bitrate must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn jobs_database_path(&self) -> PathBuf {
        self.state_dir.join(JOBS_DATABASE_FILE)
    }

    pub fn resume_database_path(&self) -> PathBuf {
        self.state_dir.join(RESUME_DATABASE_FILE)
    }

    pub fn resume_stage_path(&self) -> PathBuf {
        self.state_dir.join(RESUME_STAGE_FILE)
    }

    pub fn rejected_files_path(&self) -> PathBuf {
        self.state_dir.join(REJECTED_FILES_FILE)
    }

    /// True when a previous run left a job database or resume snapshot behind.
    pub fn has_saved_state(&self) -> bool {
        is_file(&self.jobs_database_path()) || is_file(&self.resume_database_path())
    }
}

fn is_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target_peak_db, -0.5);
        assert_eq!(config.downmix.surround, 0.707);
        assert_eq!(config.replace_delay, Duration::from_secs(15));
    }

    #[test]
    fn rejects_positive_target_peak() {
        let config = CoreConfig {
            target_peak_db: 0.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn rejects_out_of_range_gain() {
        let mut config = CoreConfig::default();
        config.downmix.lfe = 3.0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        config.downmix.lfe = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn state_paths_live_in_state_dir() {
        let config = CoreConfig::new(PathBuf::from("/state"), PathBuf::from("/work"));
        assert_eq!(
            config.jobs_database_path(),
            PathBuf::from("/state/jobs_database.json")
        );
        assert_eq!(config.resume_stage_path(), PathBuf::from("/state/resume.txt"));
    }
}
