// ============================================================================
// nightmode-core/src/jobs/mod.rs
// ============================================================================
//
// JOBS: The Persisted Work Description
//
// A Job names one source container, the audio tracks to keep, the surround
// tracks night-mode tracks are derived from, and the output codec. Jobs are
// written once by the planner into jobs_database.json and never mutated
// afterwards; the resume ledger only tracks which of them are still pending.
//
// The JSON shape is kept stable for existing databases: track ids are
// strings, surround tracks are two element arrays, keys are camelCase.

pub mod ledger;
pub mod planner;

use crate::error::{CoreError, CoreResult};
use crate::temp_files::write_atomic;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Identifier of a stream inside a container.
///
/// Serialized as a decimal string (`"2"`); parsed once when a database is
/// loaded so invalid ids never reach a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackId(u32);

impl TrackId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl FromStr for TrackId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<u32>()
            .map(TrackId)
            .map_err(|_| CoreError::InvalidTrackId(s.to_string()))
    }
}

impl TryFrom<String> for TrackId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TrackId> for String {
    fn from(id: TrackId) -> Self {
        id.0.to_string()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A surround track and the language tag its night-mode tracks carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurroundTrack(pub TrackId, pub String);

impl SurroundTrack {
    pub fn new(id: TrackId, language: impl Into<String>) -> Self {
        Self(id, language.into())
    }

    pub fn id(&self) -> TrackId {
        self.0
    }

    pub fn language(&self) -> &str {
        &self.1
    }
}

/// Codec of the generated night-mode tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Flac,
    Aac,
}

impl AudioCodec {
    /// File extension (without dot) of tracks in this codec.
    pub fn extension(self) -> &'static str {
        match self {
            AudioCodec::Flac => "flac",
            AudioCodec::Aac => "m4a",
        }
    }

    /// Name used in track titles.
    pub fn display_name(self) -> &'static str {
        match self {
            AudioCodec::Flac => "FLAC",
            AudioCodec::Aac => "AAC",
        }
    }
}

impl FromStr for AudioCodec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flac" => Ok(AudioCodec::Flac),
            "aac" => Ok(AudioCodec::Aac),
            other => Err(CoreError::Config(format!(
                "unknown codec '{other}', expected flac or aac"
            ))),
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AudioCodec::Flac => "flac",
            AudioCodec::Aac => "aac",
        })
    }
}

/// One container to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub source_file: PathBuf,
    pub keep_tracks: Vec<TrackId>,
    pub surround_tracks: Vec<SurroundTrack>,
    pub codec: AudioCodec,
}

impl Job {
    /// Checks the invariants every stage relies on.
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |reason: &str| CoreError::InvalidJob {
            source_file: self.source_file.display().to_string(),
            reason: reason.to_string(),
        };

        if self.keep_tracks.is_empty() {
            return Err(invalid("no tracks to keep"));
        }
        if self.surround_tracks.is_empty() {
            return Err(invalid("no surround tracks"));
        }
        if self
            .surround_tracks
            .iter()
            .any(|track| track.language().trim().is_empty())
        {
            return Err(invalid("surround track without a language tag"));
        }
        for (i, track) in self.surround_tracks.iter().enumerate() {
            if self.surround_tracks[..i].iter().any(|t| t.id() == track.id()) {
                return Err(invalid("surround track listed twice"));
            }
        }
        Ok(())
    }
}

/// Reads and validates `jobs_database.json`.
pub fn load_jobs_database(path: &Path) -> CoreResult<Vec<Job>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CoreError::JobDatabaseNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let jobs: Vec<Job> = serde_json::from_str(&contents)?;
    for job in &jobs {
        job.validate()?;
    }
    log::debug!("Loaded {} jobs from {}", jobs.len(), path.display());
    Ok(jobs)
}

/// Writes `jobs` as a pretty-printed JSON array.
pub fn save_jobs_database(path: &Path, jobs: &[Job]) -> CoreResult<()> {
    let json = serde_json::to_string_pretty(jobs)?;
    write_atomic(path, json.as_bytes())
}

/// Content hash of a job list: lowercase hex SHA-256 of its compact JSON.
///
/// Hashing the serialized list rather than file bytes makes the value
/// independent of formatting.
pub fn job_list_hash(jobs: &[Job]) -> CoreResult<String> {
    let json = serde_json::to_vec(jobs)?;
    Ok(hex::encode(Sha256::digest(&json)))
}
