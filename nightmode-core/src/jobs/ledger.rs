// ============================================================================
// nightmode-core/src/jobs/ledger.rs
// ============================================================================
//
// RESUME LEDGER: Persisted Progress of a Batch Run
//
// Two files in the state directory:
//
// - resume_database.json: the pending job queue, the last completed stage of
//   its head job, and two content hashes. `jobs_database_hash` ties the
//   snapshot to the job list the batch was started from, `queue_hash` covers
//   the stored queue itself. A snapshot whose hashes do not both match is
//   stale and discarded.
// - resume.txt: one line mirroring the snapshot's stage.
//
// Every write replaces the file atomically. The queue and its stage live in
// the same file so they always change together; the snapshot wins when
// resume.txt disagrees with it.

use super::{Job, job_list_hash};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::temp_files::{remove_if_exists, write_atomic};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Last completed stage of the job at the head of the queue.
///
/// The payload of the per-track stages is the position in the job's
/// surround track list, not the stream id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Stage {
    CopiedToSource,
    ExtractedAudio(usize),
    NightmodeLoudnorm(usize),
    NightmodeDrc(usize),
    CreatedNewMkv,
    CopiedNewMkv,
}

impl Stage {
    /// Surround track position the stage refers to, if any.
    pub fn track_index(self) -> Option<usize> {
        match self {
            Stage::ExtractedAudio(i) | Stage::NightmodeLoudnorm(i) | Stage::NightmodeDrc(i) => {
                Some(i)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::CopiedToSource => f.write_str("copied-to-source"),
            Stage::ExtractedAudio(i) => write!(f, "extracted-audio-{i}"),
            Stage::NightmodeLoudnorm(i) => write!(f, "nightmode-loudnorm-{i}"),
            Stage::NightmodeDrc(i) => write!(f, "nightmode-drc-{i}"),
            Stage::CreatedNewMkv => f.write_str("created-newmkv"),
            Stage::CopiedNewMkv => f.write_str("copied-newmkv"),
        }
    }
}

impl FromStr for Stage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidResumeState(format!("unknown stage '{s}'"));
        let text = s.trim();

        match text {
            "copied-to-source" => return Ok(Stage::CopiedToSource),
            "created-newmkv" => return Ok(Stage::CreatedNewMkv),
            "copied-newmkv" => return Ok(Stage::CopiedNewMkv),
            _ => {}
        }

        let indexed: [(&str, fn(usize) -> Stage); 3] = [
            ("extracted-audio-", Stage::ExtractedAudio),
            ("nightmode-loudnorm-", Stage::NightmodeLoudnorm),
            ("nightmode-drc-", Stage::NightmodeDrc),
        ];
        for (prefix, stage) in indexed {
            if let Some(index) = text.strip_prefix(prefix) {
                // Reject signs and whitespace that usize parsing would not catch.
                if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                return index.parse().map(stage).map_err(|_| invalid());
            }
        }
        Err(invalid())
    }
}

impl TryFrom<String> for Stage {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ResumeSnapshot {
    jobs_database_hash: String,
    queue_hash: String,
    #[serde(default)]
    stage: Option<Stage>,
    #[serde(rename = "jobList")]
    job_list: Vec<Job>,
}

/// Pending queue and stage marker of a batch run.
#[derive(Debug)]
pub struct ResumeLedger {
    snapshot_path: PathBuf,
    stage_path: PathBuf,
    jobs_hash: String,
    queue: Vec<Job>,
    stage: Option<Stage>,
}

impl ResumeLedger {
    /// Resumes from a valid snapshot or starts fresh from `jobs`.
    ///
    /// A fresh start discards any stage marker and immediately persists a
    /// snapshot of the full list.
    pub fn load_or_init(config: &CoreConfig, jobs: &[Job]) -> CoreResult<Self> {
        let jobs_hash = job_list_hash(jobs)?;
        let snapshot_path = config.resume_database_path();
        let stage_path = config.resume_stage_path();

        if let Some(snapshot) = read_valid_snapshot(&snapshot_path, &jobs_hash)? {
            let ledger = Self {
                snapshot_path,
                stage_path,
                jobs_hash,
                queue: snapshot.job_list,
                stage: snapshot.stage,
            };
            let marker = read_stage(&ledger.stage_path)?;
            if marker != ledger.stage {
                log::warn!(
                    "Stage marker {} does not match the resume snapshot, using {}",
                    stage_name(marker),
                    stage_name(ledger.stage)
                );
                ledger.write_marker()?;
            }
            log::info!(
                "Resuming: {} jobs pending, last completed stage: {}",
                ledger.queue.len(),
                stage_name(ledger.stage)
            );
            return Ok(ledger);
        }

        remove_if_exists(&stage_path)?;
        let ledger = Self {
            snapshot_path,
            stage_path,
            jobs_hash,
            queue: jobs.to_vec(),
            stage: None,
        };
        ledger.persist()?;
        log::info!("Starting fresh with {} jobs", ledger.queue.len());
        Ok(ledger)
    }

    /// Deletes the snapshot and the stage marker.
    pub fn reset(config: &CoreConfig) -> CoreResult<()> {
        remove_if_exists(&config.resume_database_path())?;
        remove_if_exists(&config.resume_stage_path())
    }

    pub fn pending(&self) -> &[Job] {
        &self.queue
    }

    pub fn current_job(&self) -> Option<&Job> {
        self.queue.first()
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Records `stage` as the last completed stage of the current job.
    pub fn advance(&mut self, stage: Stage) -> CoreResult<()> {
        if self.queue.is_empty() {
            return Err(CoreError::InvalidResumeState(format!(
                "cannot record stage {stage} without a pending job"
            )));
        }
        self.stage = Some(stage);
        self.persist()?;
        log::debug!("Stage recorded: {}", stage);
        Ok(())
    }

    /// Removes the finished head job and clears its stage.
    ///
    /// The shorter queue and the cleared stage reach disk in one write.
    pub fn complete_job(&mut self) -> CoreResult<Job> {
        if self.queue.is_empty() {
            return Err(CoreError::InvalidResumeState(
                "no pending job to complete".to_string(),
            ));
        }
        let job = self.queue.remove(0);
        self.stage = None;
        self.persist()?;
        Ok(job)
    }

    /// Deletes all resume state once every job is done.
    pub fn finish(self) -> CoreResult<()> {
        if !self.queue.is_empty() {
            return Err(CoreError::InvalidResumeState(format!(
                "{} jobs are still pending",
                self.queue.len()
            )));
        }
        remove_if_exists(&self.snapshot_path)?;
        remove_if_exists(&self.stage_path)?;
        log::debug!("Resume state removed");
        Ok(())
    }

    // Snapshot first: a crash before the marker is rewritten leaves a
    // marker that load_or_init overrides.
    fn persist(&self) -> CoreResult<()> {
        let snapshot = ResumeSnapshot {
            jobs_database_hash: self.jobs_hash.clone(),
            queue_hash: job_list_hash(&self.queue)?,
            stage: self.stage,
            job_list: self.queue.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        write_atomic(&self.snapshot_path, json.as_bytes())?;
        self.write_marker()
    }

    fn write_marker(&self) -> CoreResult<()> {
        match self.stage {
            Some(stage) => write_atomic(&self.stage_path, stage.to_string().as_bytes()),
            None => remove_if_exists(&self.stage_path),
        }
    }
}

fn stage_name(stage: Option<Stage>) -> String {
    stage.map_or_else(|| "none".to_string(), |s| s.to_string())
}

// Returns the snapshot when it exists, parses and both hashes match.
fn read_valid_snapshot(path: &Path, jobs_hash: &str) -> CoreResult<Option<ResumeSnapshot>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let snapshot: ResumeSnapshot = match serde_json::from_str(&contents) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::warn!("Discarding unreadable resume snapshot: {}", e);
            return Ok(None);
        }
    };

    if snapshot.jobs_database_hash != jobs_hash {
        log::warn!("Resume snapshot belongs to a different job list, starting fresh");
        return Ok(None);
    }
    if snapshot.queue_hash != job_list_hash(&snapshot.job_list)? {
        log::warn!("Resume snapshot queue does not match its hash, starting fresh");
        return Ok(None);
    }
    Ok(Some(snapshot))
}

fn read_stage(path: &Path) -> CoreResult<Option<Stage>> {
    match fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(None),
        Ok(text) => text.parse().map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
