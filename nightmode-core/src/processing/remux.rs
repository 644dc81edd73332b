// ============================================================================
// nightmode-core/src/processing/remux.rs
// ============================================================================
//
// REMUX STAGE: Reassemble the Container with mkvmerge
//
// The source container keeps its video, chapters and the retained audio
// tracks; the generated night-mode tracks are added as extra inputs. The
// explicit --track-order places each source's generated tracks right after
// the source track itself.
//
// mkvmerge input numbering: the source is file 0, generated tracks follow in
// surround order, two per surround source (Loudnorm, then DRC+Loudnorm).
//
// Replacing the source is destructive, so it is gated: after verifying the
// new container, a ReplaceGate decides whether to proceed.

use super::audio::NightmodeVariant;
use crate::error::{CoreError, CoreResult};
use crate::external::{ProbedStream, ToolCommand, ToolRunner, probe_streams};
use crate::jobs::{AudioCodec, Job, TrackId};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Variants generated for every surround source of a job, in mux order.
pub const JOB_VARIANTS: [NightmodeVariant; 2] =
    [NightmodeVariant::Loudnorm, NightmodeVariant::DrcLoudnorm];

/// A generated track file waiting to be muxed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTrack {
    pub path: PathBuf,
    pub source: TrackId,
    pub language: String,
    pub variant: NightmodeVariant,
}

/// Operator decision taken before a source file is overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Abort,
}

/// Last-chance confirmation before the source container is replaced.
pub trait ReplaceGate {
    /// Shows the streams of the verified `output` and decides, within
    /// `delay`, whether it may replace the source.
    fn confirm(
        &mut self,
        output: &Path,
        streams: &[ProbedStream],
        delay: Duration,
    ) -> CoreResult<GateDecision>;
}

/// Gate that always proceeds immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoProceed;

impl ReplaceGate for AutoProceed {
    fn confirm(
        &mut self,
        output: &Path,
        _streams: &[ProbedStream],
        _delay: Duration,
    ) -> CoreResult<GateDecision> {
        log::debug!("Replacing without confirmation: {}", output.display());
        Ok(GateDecision::Proceed)
    }
}

/// Keep tracks plus every surround source, ascending and without duplicates.
pub fn retained_tracks(job: &Job) -> Vec<TrackId> {
    job.keep_tracks
        .iter()
        .copied()
        .chain(job.surround_tracks.iter().map(|t| t.id()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// mkvmerge `--track-order` value for `job`.
pub fn track_order(job: &Job) -> String {
    let mut order = vec!["0:0".to_string()];
    for id in retained_tracks(job) {
        order.push(format!("0:{id}"));
        if let Some(position) = job.surround_tracks.iter().position(|t| t.id() == id) {
            let first = 1 + JOB_VARIANTS.len() * position;
            order.extend((first..first + JOB_VARIANTS.len()).map(|file| format!("{file}:0")));
        }
    }
    order.join(",")
}

/// Display name of an ISO 639-2 language tag, or the tag itself.
pub fn language_name(tag: &str) -> &str {
    match tag {
        "eng" => "English",
        "jpn" => "Japanese",
        "fre" | "fra" => "French",
        "ger" | "deu" => "German",
        "spa" => "Spanish",
        "ita" => "Italian",
        "kor" => "Korean",
        "chi" | "zho" => "Chinese",
        "und" => "Undetermined",
        other => other,
    }
}

/// Title of a generated track, e.g. `English Stereo Nightmode Loudnorm (FLAC)`.
pub fn track_title(language: &str, variant: NightmodeVariant, codec: AudioCodec) -> String {
    format!(
        "{} Stereo Nightmode {} ({})",
        language_name(language),
        variant.title_label(),
        codec.display_name()
    )
}

/// Builds the mkvmerge invocation producing `output`.
///
/// `generated` must hold the job's tracks in mux order (see [`JOB_VARIANTS`]).
pub fn build_remux_command(
    job: &Job,
    source: &Path,
    generated: &[GeneratedTrack],
    output: &Path,
) -> CoreResult<ToolCommand> {
    let expected: Vec<(TrackId, NightmodeVariant)> = job
        .surround_tracks
        .iter()
        .flat_map(|t| JOB_VARIANTS.iter().map(move |v| (t.id(), *v)))
        .collect();
    let actual: Vec<(TrackId, NightmodeVariant)> =
        generated.iter().map(|g| (g.source, g.variant)).collect();
    if expected != actual {
        return Err(CoreError::OperationFailed(format!(
            "generated tracks of {} do not match its surround tracks",
            job.source_file.display()
        )));
    }

    let retained: Vec<String> = retained_tracks(job).iter().map(ToString::to_string).collect();

    let mut cmd = ToolCommand::mkvmerge("remux");
    cmd.arg("-o")
        .path(output)
        .arg("--track-order")
        .arg(track_order(job))
        .arg("--audio-tracks")
        .arg(retained.join(","))
        .path(source);

    for track in generated {
        cmd.arg("--track-name")
            .arg(format!(
                "0:{}",
                track_title(&track.language, track.variant, job.codec)
            ))
            .arg("--language")
            .arg(format!("0:{}", track.language))
            .path(&track.path);
    }
    Ok(cmd)
}

/// Runs mkvmerge for `job`.
pub fn remux<R: ToolRunner + ?Sized>(
    runner: &R,
    job: &Job,
    source: &Path,
    generated: &[GeneratedTrack],
    output: &Path,
) -> CoreResult<()> {
    let cmd = build_remux_command(job, source, generated, output)?;
    log::info!("Creating new container {}", output.display());
    runner.run(&cmd)?;
    Ok(())
}

/// Checks the stream layout of a remuxed container and returns its streams.
pub fn verify_remux<R: ToolRunner + ?Sized>(
    runner: &R,
    job: &Job,
    output: &Path,
) -> CoreResult<Vec<ProbedStream>> {
    if !output.is_file() {
        return Err(CoreError::VerificationFailed(format!(
            "{} was not created",
            output.display()
        )));
    }

    let streams = probe_streams(runner, output)?;
    if !streams.iter().any(ProbedStream::is_video) {
        return Err(CoreError::VerificationFailed(format!(
            "{} has no video stream",
            output.display()
        )));
    }

    let expected = retained_tracks(job).len() + JOB_VARIANTS.len() * job.surround_tracks.len();
    let audio = streams.iter().filter(|s| s.is_audio()).count();
    if audio != expected {
        return Err(CoreError::VerificationFailed(format!(
            "{} has {} audio streams, expected {}",
            output.display(),
            audio,
            expected
        )));
    }
    Ok(streams)
}

/// Copies the verified container over the original source file.
pub fn replace_source(output: &Path, source_file: &Path) -> CoreResult<()> {
    log::info!(
        "Copying {} to {}",
        output.display(),
        source_file.display()
    );
    fs::copy(output, source_file)?;
    Ok(())
}
