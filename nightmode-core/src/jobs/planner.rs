// ============================================================================
// nightmode-core/src/jobs/planner.rs
// ============================================================================
//
// JOB ENUMERATOR: Interactive Planning Phase
//
// Turns a directory of containers into a fully resolved job list:
//
// 1. discover every .mkv below the directory
// 2. probe each file for its audio tracks (one failure aborts everything)
// 3. ask the operator to accept or reject each file
// 4. group accepted files by identical audio track lists
// 5. ask once per group for the tracks to keep, the surround sources and
//    the codec, and emit one Job per file of the group
//
// All interaction goes through the Prompter trait, so planning runs in tests
// with scripted answers. Invalid answers are reprompted here and never turn
// into errors; only a failing Prompter (e.g. closed stdin) ends planning.

use super::{AudioCodec, Job, SurroundTrack, TrackId, save_jobs_database};
use crate::config::CoreConfig;
use crate::discovery::find_container_files;
use crate::error::CoreResult;
use crate::external::{ToolRunner, TrackDescriptor, audio_track_descriptors};
use crate::temp_files::write_atomic;
use crate::utils::display_name;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ACCEPT_FILE_QUESTION: &str = "Process this file? (y or n): ";
pub const KEEP_TRACKS_QUESTION: &str =
    "Please list tracks that will be kept, separated by a comma (e.g. 1,2): ";
pub const SURROUND_TRACKS_QUESTION: &str =
    "Select the tracks the nightmode tracks will be based on (e.g. 1:eng,2:jpn): ";
pub const CODEC_QUESTION: &str = "Select a codec for the nightmode tracks (flac or aac): ";
const INVALID_INPUT: &str = "Invalid input";

/// Line-oriented operator interaction.
pub trait Prompter {
    /// Shows an informational line.
    fn show(&mut self, line: &str) -> CoreResult<()>;

    /// Asks a question and returns the raw answer without its line ending.
    fn ask(&mut self, question: &str) -> CoreResult<String>;
}

impl<P: Prompter + ?Sized> Prompter for &mut P {
    fn show(&mut self, line: &str) -> CoreResult<()> {
        (**self).show(line)
    }

    fn ask(&mut self, question: &str) -> CoreResult<String> {
        (**self).ask(question)
    }
}

/// A container and its audio tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub path: PathBuf,
    pub tracks: Vec<TrackDescriptor>,
}

/// Result of the planning phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub jobs: Vec<Job>,
    pub rejected: Vec<PathBuf>,
}

/// Probes every file for its audio tracks.
pub fn probe_file_stats<R: ToolRunner + ?Sized>(
    runner: &R,
    files: &[PathBuf],
) -> CoreResult<Vec<FileStats>> {
    files
        .iter()
        .map(|path| {
            Ok(FileStats {
                path: path.clone(),
                tracks: audio_track_descriptors(runner, path)?,
            })
        })
        .collect()
}

/// Runs the interactive part of planning over already probed files.
pub fn plan_jobs<P: Prompter + ?Sized>(
    stats: Vec<FileStats>,
    prompter: &mut P,
) -> CoreResult<Plan> {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for stat in stats {
        if review_file(&stat, prompter)? {
            accepted.push(stat);
        } else {
            rejected.push(stat.path);
        }
    }

    let mut jobs = Vec::new();
    for group in group_by_tracks(accepted) {
        prompter.show("")?;
        show_tracks(&group.tracks, prompter)?;
        prompter.show(&format!(
            "Number of files with these audio tracks: {}",
            group.files.len()
        ))?;

        let available: BTreeSet<u32> = group.tracks.iter().map(|t| t.index).collect();
        let keep_tracks = ask_until(prompter, KEEP_TRACKS_QUESTION, |answer| {
            parse_keep_tracks(answer)
                .filter(|ids| ids.iter().all(|id| available.contains(&id.get())))
        })?;
        let surround_tracks = ask_until(prompter, SURROUND_TRACKS_QUESTION, |answer| {
            parse_surround_tracks(answer)
                .filter(|tracks| tracks.iter().all(|t| available.contains(&t.id().get())))
        })?;
        let codec = ask_until(prompter, CODEC_QUESTION, |answer| {
            AudioCodec::from_str(answer.trim()).ok()
        })?;

        for file in group.files {
            jobs.push(Job {
                source_file: file,
                keep_tracks: keep_tracks.clone(),
                surround_tracks: surround_tracks.clone(),
                codec,
            });
        }
    }

    Ok(Plan { jobs, rejected })
}

/// Full planning phase: discover, probe, ask, and persist the job database
/// and rejected-file list into the state directory.
pub fn enumerate_jobs<R, P>(
    input_dir: &Path,
    runner: &R,
    prompter: &mut P,
    config: &CoreConfig,
) -> CoreResult<Plan>
where
    R: ToolRunner + ?Sized,
    P: Prompter + ?Sized,
{
    let files = find_container_files(input_dir)?;
    log::info!("Probing {} files", files.len());
    let stats = probe_file_stats(runner, &files)?;
    let plan = plan_jobs(stats, prompter)?;

    save_jobs_database(&config.jobs_database_path(), &plan.jobs)?;
    write_atomic(
        &config.rejected_files_path(),
        rejected_list(&plan.rejected).as_bytes(),
    )?;
    log::info!(
        "Planned {} jobs, rejected {} files",
        plan.jobs.len(),
        plan.rejected.len()
    );
    Ok(plan)
}

/// Parses `1,2,3`. Every entry must be an id and at least one is required.
pub fn parse_keep_tracks(answer: &str) -> Option<Vec<TrackId>> {
    let mut ids = Vec::new();
    for part in answer.split(',') {
        let id: TrackId = part.trim().parse().ok()?;
        if ids.contains(&id) {
            return None;
        }
        ids.push(id);
    }
    Some(ids)
}

/// Parses `1:eng,2:jpn`. At least one pair is required.
pub fn parse_surround_tracks(answer: &str) -> Option<Vec<SurroundTrack>> {
    let mut tracks: Vec<SurroundTrack> = Vec::new();
    for part in answer.split(',') {
        let (id, language) = part.trim().split_once(':')?;
        let id: TrackId = id.parse().ok()?;
        let language = language.trim();
        if language.is_empty()
            || language.contains(char::is_whitespace)
            || tracks.iter().any(|t| t.id() == id)
        {
            return None;
        }
        tracks.push(SurroundTrack::new(id, language));
    }
    Some(tracks)
}

/// Parses a `y`/`n` answer, case-insensitively.
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" => Some(true),
        "n" => Some(false),
        _ => None,
    }
}

/// Asks `question` until `parse` accepts the answer.
pub fn ask_until<P, T, F>(prompter: &mut P, question: &str, parse: F) -> CoreResult<T>
where
    P: Prompter + ?Sized,
    F: Fn(&str) -> Option<T>,
{
    loop {
        let answer = prompter.ask(question)?;
        match parse(&answer) {
            Some(value) => return Ok(value),
            None => prompter.show(INVALID_INPUT)?,
        }
    }
}

struct TrackGroup {
    tracks: Vec<TrackDescriptor>,
    files: Vec<PathBuf>,
}

// Groups keep first-appearance order and files keep input order.
fn group_by_tracks(stats: Vec<FileStats>) -> Vec<TrackGroup> {
    let mut groups: Vec<TrackGroup> = Vec::new();
    for stat in stats {
        match groups.iter_mut().find(|g| g.tracks == stat.tracks) {
            Some(group) => group.files.push(stat.path),
            None => groups.push(TrackGroup {
                tracks: stat.tracks,
                files: vec![stat.path],
            }),
        }
    }
    groups
}

fn review_file<P: Prompter + ?Sized>(stat: &FileStats, prompter: &mut P) -> CoreResult<bool> {
    prompter.show(&format!("File: {}", display_name(&stat.path)))?;
    show_tracks(&stat.tracks, prompter)?;

    if stat.tracks.is_empty() {
        prompter.show("File has no audio tracks, added to rejected list.")?;
        prompter.show("")?;
        return Ok(false);
    }

    let accepted = ask_until(prompter, ACCEPT_FILE_QUESTION, parse_yes_no)?;
    if accepted {
        prompter.show("File added to process list.")?;
    } else {
        prompter.show("File added to rejected list.")?;
    }
    prompter.show("")?;
    Ok(accepted)
}

fn show_tracks<P: Prompter + ?Sized>(tracks: &[TrackDescriptor], prompter: &mut P) -> CoreResult<()> {
    for track in tracks {
        prompter.show(&track.to_string())?;
    }
    Ok(())
}

fn rejected_list(rejected: &[PathBuf]) -> String {
    rejected
        .iter()
        .map(|path| format!("{}\n", path.display()))
        .collect()
}
