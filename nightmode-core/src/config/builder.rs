// ============================================================================
// nightmode-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for CoreConfig
//
// Fluent construction of CoreConfig. Every field has a default; when no work
// directory is given the state directory doubles as the work directory.

// ---- Standard library imports ----
use std::path::PathBuf;
use std::time::Duration;

// ---- Internal crate imports ----
use super::{CoreConfig, DownmixGains};

/// Builder for creating CoreConfig instances.
#[derive(Debug, Clone)]
pub struct CoreConfigBuilder {
    state_dir: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    target_peak_db: f64,
    downmix: DownmixGains,
    aac_bitrate: String,
    replace_delay: Duration,
}

impl Default for CoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreConfigBuilder {
    /// Creates a new CoreConfigBuilder with default values.
    pub fn new() -> Self {
        Self {
            state_dir: None,
            work_dir: None,
            target_peak_db: super::DEFAULT_TARGET_PEAK_DB,
            downmix: DownmixGains::default(),
            aac_bitrate: super::DEFAULT_AAC_BITRATE.to_string(),
            replace_delay: super::DEFAULT_REPLACE_DELAY,
        }
    }

    /// Sets the directory holding the job database and resume files.
    pub fn state_dir(mut self, state_dir: PathBuf) -> Self {
        self.state_dir = Some(state_dir);
        self
    }

    /// Sets the scratch directory for per-job files.
    pub fn work_dir(mut self, work_dir: PathBuf) -> Self {
        self.work_dir = Some(work_dir);
        self
    }

    /// Sets the peak level generated tracks are normalized to.
    pub fn target_peak_db(mut self, target: f64) -> Self {
        self.target_peak_db = target;
        self
    }

    pub fn surround_gain(mut self, gain: f64) -> Self {
        self.downmix.surround = gain;
        self
    }

    pub fn center_gain(mut self, gain: f64) -> Self {
        self.downmix.center = gain;
        self
    }

    pub fn lfe_gain(mut self, gain: f64) -> Self {
        self.downmix.lfe = gain;
        self
    }

    pub fn aac_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.aac_bitrate = bitrate.into();
        self
    }

    /// Sets how long the replace window waits before overwriting a source.
    pub fn replace_delay(mut self, delay: Duration) -> Self {
        self.replace_delay = delay;
        self
    }

    /// Builds a CoreConfig instance from the builder.
    pub fn build(self) -> CoreConfig {
        let state_dir = self.state_dir.unwrap_or_else(|| PathBuf::from("."));
        let work_dir = self.work_dir.unwrap_or_else(|| state_dir.clone());

        CoreConfig {
            state_dir,
            work_dir,
            target_peak_db: self.target_peak_db,
            downmix: self.downmix,
            aac_bitrate: self.aac_bitrate,
            replace_delay: self.replace_delay,
        }
    }
}
