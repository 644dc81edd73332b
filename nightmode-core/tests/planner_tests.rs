// nightmode-core/tests/planner_tests.rs

mod support;

use nightmode_core::config::CoreConfig;
use nightmode_core::error::CoreError;
use nightmode_core::external::Tool;
use nightmode_core::jobs::planner::{
    CODEC_QUESTION, KEEP_TRACKS_QUESTION, SURROUND_TRACKS_QUESTION, enumerate_jobs,
};
use nightmode_core::jobs::{AudioCodec, SurroundTrack, TrackId, load_jobs_database};
use std::fs::{self, File};
use std::path::Path;
use support::{MockRunner, ScriptedPrompter, container_json, file_name};
use tempfile::tempdir;

fn setup(names: &[&str]) -> Result<(tempfile::TempDir, CoreConfig), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let media = dir.path().join("media");
    fs::create_dir(&media)?;
    for name in names {
        File::create(media.join(name))?;
    }
    let state = dir.path().join("state");
    let config = CoreConfig::new(state.clone(), state);
    Ok((dir, config))
}

// a.mkv and c.mkv share a layout, b.mkv differs.
fn probe_by_name(path: &Path) -> String {
    match file_name(path).as_str() {
        "b.mkv" => container_json(&[("dts", "5.1(side)", "jpn"), ("ac3", "stereo", "eng")]),
        _ => container_json(&[("truehd", "7.1", "eng"), ("ac3", "5.1(side)", "eng")]),
    }
}

#[test]
fn test_files_with_equal_tracks_share_parameters() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, config) = setup(&["a.mkv", "b.mkv", "c.mkv"])?;
    let runner = MockRunner::new().with_probe(probe_by_name);
    let mut prompter = ScriptedPrompter::new(&[
        // accept pass, one answer per file in sorted order
        "y", "y", "y",
        // group of a.mkv and c.mkv
        "1,2", "2:eng", "flac",
        // group of b.mkv
        "1", "1:jpn", "aac",
    ]);

    let plan = enumerate_jobs(&dir.path().join("media"), &runner, &mut prompter, &config)?;

    assert_eq!(prompter.remaining(), 0);
    assert!(plan.rejected.is_empty());
    let names: Vec<String> = plan.jobs.iter().map(|j| file_name(&j.source_file)).collect();
    assert_eq!(names, ["a.mkv", "c.mkv", "b.mkv"]);

    assert_eq!(plan.jobs[0].keep_tracks, plan.jobs[1].keep_tracks);
    assert_eq!(plan.jobs[0].surround_tracks, plan.jobs[1].surround_tracks);
    assert_eq!(plan.jobs[0].codec, AudioCodec::Flac);
    assert_eq!(
        plan.jobs[2].surround_tracks,
        vec![SurroundTrack::new(TrackId::new(1), "jpn")]
    );
    assert_eq!(plan.jobs[2].codec, AudioCodec::Aac);

    // Persisted database matches the plan.
    assert_eq!(load_jobs_database(&config.jobs_database_path())?, plan.jobs);
    assert_eq!(fs::read_to_string(config.rejected_files_path())?, "");
    assert_eq!(runner.calls_of(Tool::Ffprobe).len(), 3);
    Ok(())
}

#[test]
fn test_rejecting_all_files() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, config) = setup(&["b.mkv", "a.mkv"])?;
    let runner = MockRunner::new().with_probe(probe_by_name);
    let mut prompter = ScriptedPrompter::new(&["n", "N"]);

    let plan = enumerate_jobs(&dir.path().join("media"), &runner, &mut prompter, &config)?;

    assert!(plan.jobs.is_empty());
    let rejected: Vec<String> = plan.rejected.iter().map(|p| file_name(p)).collect();
    assert_eq!(rejected, ["a.mkv", "b.mkv"]);

    let listed = fs::read_to_string(config.rejected_files_path())?;
    let expected: String = plan
        .rejected
        .iter()
        .map(|p| format!("{}\n", p.display()))
        .collect();
    assert_eq!(listed, expected);
    assert!(load_jobs_database(&config.jobs_database_path())?.is_empty());
    Ok(())
}

#[test]
fn test_invalid_answers_are_reprompted() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, config) = setup(&["a.mkv"])?;
    let runner = MockRunner::new().with_probe(probe_by_name);
    let mut prompter = ScriptedPrompter::new(&[
        "maybe", "y",
        "", "1 2", "7", "1",
        "2", "2:", "2:eng",
        "FLAC", "mp3", "aac",
    ]);

    let plan = enumerate_jobs(&dir.path().join("media"), &runner, &mut prompter, &config)?;

    assert_eq!(prompter.remaining(), 0);
    assert_eq!(prompter.invalid_count(), 8);
    let job = &plan.jobs[0];
    assert_eq!(job.keep_tracks, vec![TrackId::new(1)]);
    assert_eq!(job.surround_tracks, vec![SurroundTrack::new(TrackId::new(2), "eng")]);
    assert_eq!(job.codec, AudioCodec::Aac);

    let asked = |q: &str| prompter.asked.iter().filter(|a| *a == q).count();
    assert_eq!(asked(KEEP_TRACKS_QUESTION), 4);
    assert_eq!(asked(SURROUND_TRACKS_QUESTION), 3);
    assert_eq!(asked(CODEC_QUESTION), 3);
    Ok(())
}

#[test]
fn test_probe_failure_aborts_enumeration() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, config) = setup(&["a.mkv", "b.mkv"])?;
    let runner = MockRunner::new()
        .with_probe(probe_by_name)
        .failing_when(|cmd| {
            cmd.tool() == Tool::Ffprobe && cmd.last_arg().is_some_and(|a| a.ends_with("b.mkv"))
        });
    let mut prompter = ScriptedPrompter::new(&[]);

    let result = enumerate_jobs(&dir.path().join("media"), &runner, &mut prompter, &config);

    assert!(matches!(result, Err(CoreError::CommandFailed { .. })));
    assert!(prompter.asked.is_empty());
    assert!(!config.jobs_database_path().exists());
    Ok(())
}
