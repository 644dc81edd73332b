//! Batch execution: runs every pending job through its stage sequence.
//!
//! Each job moves through a fixed sequence of stages:
//!
//! ```text
//! copied-to-source
//!   -> extracted-audio-0 -> nightmode-loudnorm-0 -> nightmode-drc-0
//!   -> extracted-audio-1 -> ...                  -> nightmode-drc-(n-1)
//!   -> created-newmkv -> copied-newmkv
//! ```
//!
//! After every stage the ledger records it, so an interrupted run picks up
//! at the stage after the last recorded one. Execution never prompts; the
//! only operator interaction is the [`ReplaceGate`] consulted before a
//! source file is overwritten.

/// Peak normalization and night-mode track generation
pub mod audio;

/// mkvmerge remux, verification and source replacement
pub mod remux;

pub use audio::{NightmodeOptions, NightmodeVariant};
pub use remux::{AutoProceed, GateDecision, GeneratedTrack, ReplaceGate};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::external::ToolRunner;
use crate::jobs::ledger::{ResumeLedger, Stage};
use crate::jobs::{AudioCodec, Job};
use crate::temp_files::remove_if_exists;
use crate::utils::display_name;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Names of the per-job scratch files inside the work directory.
#[derive(Debug, Clone)]
pub struct WorkFiles {
    dir: PathBuf,
}

impl WorkFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Working copy of the source container.
    pub fn source(&self) -> PathBuf {
        self.dir.join("source.mkv")
    }

    /// Extracted surround track.
    pub fn audio(&self) -> PathBuf {
        self.dir.join("audio.flac")
    }

    /// Remuxed container.
    pub fn output(&self) -> PathBuf {
        self.dir.join("output.mkv")
    }

    /// Generated track `variant` of surround track number `index`.
    pub fn nightmode(
        &self,
        variant: NightmodeVariant,
        index: usize,
        language: &str,
        codec: AudioCodec,
    ) -> PathBuf {
        self.dir.join(format!(
            "nightmode-{}-{}-{}.{}",
            variant.file_tag(),
            index,
            language,
            codec.extension()
        ))
    }

    /// Every generated track of `job`, in mux order.
    pub fn generated(&self, job: &Job) -> Vec<GeneratedTrack> {
        job.surround_tracks
            .iter()
            .enumerate()
            .flat_map(|(index, track)| {
                remux::JOB_VARIANTS.iter().map(move |variant| GeneratedTrack {
                    path: self.nightmode(*variant, index, track.language(), job.codec),
                    source: track.id(),
                    language: track.language().to_string(),
                    variant: *variant,
                })
            })
            .collect()
    }

    /// Removes the scratch files of `job`. Nothing else in the directory is touched.
    pub fn cleanup(&self, job: &Job) -> CoreResult<()> {
        let mut files = vec![
            self.source(),
            self.audio(),
            self.dir.join(audio::PRENORM_FILE),
            self.output(),
        ];
        for track in self.generated(job) {
            // A FLAC intermediate is left behind if an AAC transcode was interrupted.
            files.push(track.path.with_extension(AudioCodec::Flac.extension()));
            files.push(track.path);
        }
        for file in files {
            remove_if_exists(&file)?;
        }
        Ok(())
    }
}

/// Outcome of one completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub source_file: PathBuf,
    pub generated_tracks: usize,
    pub duration: Duration,
}

/// Stage that follows `current` for `job`, or `None` once the job is done.
pub fn next_stage(job: &Job, current: Option<Stage>) -> CoreResult<Option<Stage>> {
    let tracks = job.surround_tracks.len();
    if let Some(index) = current.and_then(Stage::track_index) {
        if index >= tracks {
            return Err(CoreError::InvalidResumeState(format!(
                "stage {} refers to surround track {}, but {} has only {}",
                current.map_or_else(String::new, |s| s.to_string()),
                index,
                job.source_file.display(),
                tracks
            )));
        }
    }

    let next = match current {
        None => Some(Stage::CopiedToSource),
        Some(Stage::CopiedToSource) => Some(if tracks == 0 {
            Stage::CreatedNewMkv
        } else {
            Stage::ExtractedAudio(0)
        }),
        Some(Stage::ExtractedAudio(i)) => Some(Stage::NightmodeLoudnorm(i)),
        Some(Stage::NightmodeLoudnorm(i)) => Some(Stage::NightmodeDrc(i)),
        Some(Stage::NightmodeDrc(i)) if i + 1 < tracks => Some(Stage::ExtractedAudio(i + 1)),
        Some(Stage::NightmodeDrc(_)) => Some(Stage::CreatedNewMkv),
        Some(Stage::CreatedNewMkv) => Some(Stage::CopiedNewMkv),
        Some(Stage::CopiedNewMkv) => None,
    };
    Ok(next)
}

/// Runs every pending job of `ledger` to completion.
///
/// The first failure ends the run; the ledger keeps the last completed stage
/// so the next run resumes there.
pub fn process_jobs<R, G>(
    runner: &R,
    gate: &mut G,
    config: &CoreConfig,
    mut ledger: ResumeLedger,
) -> CoreResult<Vec<JobResult>>
where
    R: ToolRunner + ?Sized,
    G: ReplaceGate + ?Sized,
{
    let work = WorkFiles::new(&config.work_dir);
    fs::create_dir_all(work.dir())?;

    let total = ledger.pending().len();
    let mut results = Vec::new();

    while let Some(job) = ledger.current_job().cloned() {
        log::info!(
            "({} out of {}) Processing {}",
            results.len() + 1,
            total,
            display_name(&job.source_file)
        );
        let start = Instant::now();

        // ====================================================================
        // STEP 1: RUN REMAINING STAGES
        // ====================================================================
        while let Some(stage) = next_stage(&job, ledger.stage())? {
            run_stage(runner, gate, config, &work, &job, stage)?;
            ledger.advance(stage)?;
        }

        // ====================================================================
        // STEP 2: CLEAN UP AND DEQUEUE
        // ====================================================================
        log::info!("Cleaning up work files");
        work.cleanup(&job)?;
        ledger.complete_job()?;

        let result = JobResult {
            source_file: job.source_file.clone(),
            generated_tracks: job.surround_tracks.len() * remux::JOB_VARIANTS.len(),
            duration: start.elapsed(),
        };
        log::info!(
            "Finished {} ({} tracks added)",
            display_name(&result.source_file),
            result.generated_tracks
        );
        results.push(result);
    }

    ledger.finish()?;
    log::info!("All jobs complete");
    Ok(results)
}

fn run_stage<R, G>(
    runner: &R,
    gate: &mut G,
    config: &CoreConfig,
    work: &WorkFiles,
    job: &Job,
    stage: Stage,
) -> CoreResult<()>
where
    R: ToolRunner + ?Sized,
    G: ReplaceGate + ?Sized,
{
    log::info!("Stage: {}", stage);
    match stage {
        Stage::CopiedToSource => {
            if !job.source_file.is_file() {
                return Err(CoreError::InputNotFound(job.source_file.clone()));
            }
            log::info!(
                "Copying {} to {}",
                job.source_file.display(),
                work.source().display()
            );
            fs::copy(&job.source_file, work.source())?;
        }
        Stage::ExtractedAudio(i) => {
            let track = &job.surround_tracks[i];
            log::info!("Extracting surround track {}", track.id());
            audio::extract_track(runner, &work.source(), track.id(), &work.audio())?;
        }
        Stage::NightmodeLoudnorm(i) => {
            generate_track(runner, config, work, job, i, NightmodeVariant::Loudnorm)?;
        }
        Stage::NightmodeDrc(i) => {
            generate_track(runner, config, work, job, i, NightmodeVariant::DrcLoudnorm)?;
        }
        Stage::CreatedNewMkv => {
            let output = work.output();
            remux::remux(runner, job, &work.source(), &work.generated(job), &output)?;
            remux::verify_remux(runner, job, &output)?;
        }
        Stage::CopiedNewMkv => {
            let output = work.output();
            let streams = remux::verify_remux(runner, job, &output)?;
            match gate.confirm(&output, &streams, config.replace_delay)? {
                GateDecision::Proceed => remux::replace_source(&output, &job.source_file)?,
                GateDecision::Abort => {
                    log::warn!("Replacement of {} aborted", job.source_file.display());
                    return Err(CoreError::Aborted(job.source_file.clone()));
                }
            }
        }
    }
    Ok(())
}

fn generate_track<R: ToolRunner + ?Sized>(
    runner: &R,
    config: &CoreConfig,
    work: &WorkFiles,
    job: &Job,
    index: usize,
    variant: NightmodeVariant,
) -> CoreResult<()> {
    let track = &job.surround_tracks[index];
    log::info!(
        "Creating nightmode {} track for {}",
        variant.title_label(),
        track.id()
    );
    let output = work.nightmode(variant, index, track.language(), job.codec);
    let options = NightmodeOptions::for_variant(variant, job.codec, config);
    audio::nightmode_track(runner, &work.audio(), &output, &options)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{SurroundTrack, TrackId};

    fn job(surround: usize) -> Job {
        Job {
            source_file: PathBuf::from("/media/a.mkv"),
            keep_tracks: vec![TrackId::new(1)],
            surround_tracks: (0..surround)
                .map(|i| SurroundTrack::new(TrackId::new(2 + i as u32), "eng"))
                .collect(),
            codec: AudioCodec::Flac,
        }
    }

    fn sequence(job: &Job) -> Vec<Stage> {
        let mut stages = Vec::new();
        let mut current = None;
        while let Some(stage) = next_stage(job, current).unwrap() {
            stages.push(stage);
            current = Some(stage);
        }
        stages
    }

    #[test]
    fn single_surround_sequence() {
        assert_eq!(
            sequence(&job(1)),
            vec![
                Stage::CopiedToSource,
                Stage::ExtractedAudio(0),
                Stage::NightmodeLoudnorm(0),
                Stage::NightmodeDrc(0),
                Stage::CreatedNewMkv,
                Stage::CopiedNewMkv,
            ]
        );
    }

    #[test]
    fn every_surround_track_gets_its_stages() {
        let stages = sequence(&job(2));
        assert_eq!(stages.len(), 2 + 3 * 2 + 1);
        assert_eq!(stages[4], Stage::ExtractedAudio(1));
        assert_eq!(stages[6], Stage::NightmodeDrc(1));
        assert_eq!(stages[7], Stage::CreatedNewMkv);
    }

    #[test]
    fn resumes_after_recorded_stage() {
        let j = job(2);
        assert_eq!(
            next_stage(&j, Some(Stage::NightmodeDrc(0))).unwrap(),
            Some(Stage::ExtractedAudio(1))
        );
        assert_eq!(next_stage(&j, Some(Stage::CopiedNewMkv)).unwrap(), None);
    }

    #[test]
    fn out_of_range_stage_is_rejected() {
        let err = next_stage(&job(1), Some(Stage::NightmodeLoudnorm(1))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidResumeState(_)));
    }

    #[test]
    fn work_file_names() {
        let work = WorkFiles::new("/work");
        assert_eq!(
            work.nightmode(NightmodeVariant::DrcLoudnorm, 1, "jpn", AudioCodec::Aac),
            PathBuf::from("/work/nightmode-drc-1-jpn.m4a")
        );
        let generated = work.generated(&job(2));
        assert_eq!(generated.len(), 4);
        assert_eq!(generated[2].source, TrackId::new(3));
        assert_eq!(generated[2].variant, NightmodeVariant::Loudnorm);
    }
}
