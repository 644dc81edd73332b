// nightmode-core/tests/ledger_tests.rs

use nightmode_core::config::CoreConfig;
use nightmode_core::error::CoreError;
use nightmode_core::jobs::ledger::{ResumeLedger, Stage};
use nightmode_core::jobs::{AudioCodec, Job, SurroundTrack, TrackId, job_list_hash};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn jobs(count: usize) -> Vec<Job> {
    (0..count)
        .map(|i| Job {
            source_file: PathBuf::from(format!("/media/movie{i}.mkv")),
            keep_tracks: vec![TrackId::new(1)],
            surround_tracks: vec![SurroundTrack::new(TrackId::new(2), "eng")],
            codec: AudioCodec::Flac,
        })
        .collect()
}

fn snapshot(config: &CoreConfig) -> Value {
    let text = fs::read_to_string(config.resume_database_path()).expect("snapshot exists");
    serde_json::from_str(&text).expect("snapshot parses")
}

fn stored_queue(config: &CoreConfig) -> Vec<Job> {
    serde_json::from_value(snapshot(config)["jobList"].clone()).expect("queue parses")
}

#[test]
fn test_fresh_start_persists_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = CoreConfig::new(dir.path().to_path_buf(), dir.path().to_path_buf());
    let all = jobs(3);

    let ledger = ResumeLedger::load_or_init(&config, &all)?;

    assert_eq!(ledger.pending(), all.as_slice());
    assert_eq!(ledger.stage(), None);
    let stored = snapshot(&config);
    assert_eq!(stored["jobs_database_hash"], job_list_hash(&all)?);
    assert_eq!(stored["queue_hash"], job_list_hash(&all)?);
    Ok(())
}

#[test]
fn test_complete_job_shrinks_queue_and_rehashes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = CoreConfig::new(dir.path().to_path_buf(), dir.path().to_path_buf());
    let all = jobs(3);
    let mut ledger = ResumeLedger::load_or_init(&config, &all)?;

    ledger.advance(Stage::CopiedToSource)?;
    ledger.advance(Stage::ExtractedAudio(0))?;
    assert_eq!(
        fs::read_to_string(config.resume_stage_path())?,
        "extracted-audio-0"
    );

    for expected_len in (0..3).rev() {
        let done = ledger.complete_job()?;
        assert_eq!(ledger.pending().len(), expected_len);
        assert_eq!(done, all[2 - expected_len]);

        let queue = stored_queue(&config);
        assert_eq!(queue.len(), expected_len);
        assert_eq!(snapshot(&config)["queue_hash"], job_list_hash(&queue)?);
        assert_eq!(snapshot(&config)["jobs_database_hash"], job_list_hash(&all)?);
        assert!(!config.resume_stage_path().exists());
    }

    assert!(matches!(
        ledger.complete_job(),
        Err(CoreError::InvalidResumeState(_))
    ));
    ledger.finish()?;
    assert!(!config.resume_database_path().exists());
    Ok(())
}

#[test]
fn test_resumes_from_valid_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = CoreConfig::new(dir.path().to_path_buf(), dir.path().to_path_buf());
    let all = jobs(3);

    {
        let mut ledger = ResumeLedger::load_or_init(&config, &all)?;
        ledger.complete_job()?;
        ledger.advance(Stage::NightmodeLoudnorm(0))?;
    }

    let ledger = ResumeLedger::load_or_init(&config, &all)?;
    assert_eq!(ledger.pending(), &all[1..]);
    assert_eq!(ledger.stage(), Some(Stage::NightmodeLoudnorm(0)));
    Ok(())
}

#[test]
fn test_stale_snapshot_is_discarded() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = CoreConfig::new(dir.path().to_path_buf(), dir.path().to_path_buf());
    let old = jobs(3);

    {
        let mut ledger = ResumeLedger::load_or_init(&config, &old)?;
        ledger.complete_job()?;
        ledger.advance(Stage::CreatedNewMkv)?;
    }

    let mut new = jobs(3);
    new[2].codec = AudioCodec::Aac;
    let ledger = ResumeLedger::load_or_init(&config, &new)?;

    assert_eq!(ledger.pending(), new.as_slice());
    assert_eq!(ledger.stage(), None);
    assert!(!config.resume_stage_path().exists());
    assert_eq!(snapshot(&config)["jobs_database_hash"], job_list_hash(&new)?);
    Ok(())
}

#[test]
fn test_tampered_queue_is_discarded() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = CoreConfig::new(dir.path().to_path_buf(), dir.path().to_path_buf());
    let all = jobs(3);

    {
        let mut ledger = ResumeLedger::load_or_init(&config, &all)?;
        ledger.complete_job()?;
    }

    // Drop a job from the stored queue without updating its hash.
    let mut stored = snapshot(&config);
    stored["jobList"].as_array_mut().unwrap().pop();
    fs::write(config.resume_database_path(), stored.to_string())?;

    let ledger = ResumeLedger::load_or_init(&config, &all)?;
    assert_eq!(ledger.pending(), all.as_slice());
    Ok(())
}

#[test]
fn test_unreadable_snapshot_starts_fresh() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = CoreConfig::new(dir.path().to_path_buf(), dir.path().to_path_buf());
    fs::write(config.resume_database_path(), "{ not json")?;
    fs::write(config.resume_stage_path(), "copied-to-source")?;

    let ledger = ResumeLedger::load_or_init(&config, &jobs(2))?;
    assert_eq!(ledger.pending().len(), 2);
    assert_eq!(ledger.stage(), None);
    Ok(())
}

#[test]
fn test_malformed_stage_marker_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = CoreConfig::new(dir.path().to_path_buf(), dir.path().to_path_buf());
    let all = jobs(1);
    drop(ResumeLedger::load_or_init(&config, &all)?);
    fs::write(config.resume_stage_path(), "nightmode-drc")?;

    let result = ResumeLedger::load_or_init(&config, &all);
    assert!(matches!(result, Err(CoreError::InvalidResumeState(_))));
    Ok(())
}

#[test]
fn test_finish_requires_empty_queue() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = CoreConfig::new(dir.path().to_path_buf(), dir.path().to_path_buf());
    let ledger = ResumeLedger::load_or_init(&config, &jobs(1))?;

    assert!(matches!(ledger.finish(), Err(CoreError::InvalidResumeState(_))));
    assert!(config.resume_database_path().exists());

    ResumeLedger::reset(&config)?;
    assert!(!config.resume_database_path().exists());
    Ok(())
}

#[test]
fn test_leftover_marker_of_completed_job_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = CoreConfig::new(dir.path().to_path_buf(), dir.path().to_path_buf());
    let all = jobs(3);

    {
        let mut ledger = ResumeLedger::load_or_init(&config, &all)?;
        ledger.advance(Stage::CopiedNewMkv)?;
        ledger.complete_job()?;
    }
    // Marker of the job that was just dequeued.
    fs::write(config.resume_stage_path(), "copied-newmkv")?;

    let ledger = ResumeLedger::load_or_init(&config, &all)?;
    assert_eq!(ledger.pending(), &all[1..]);
    assert_eq!(ledger.stage(), None);
    assert!(!config.resume_stage_path().exists());
    Ok(())
}

#[test]
fn test_marker_behind_snapshot_is_rewritten() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = CoreConfig::new(dir.path().to_path_buf(), dir.path().to_path_buf());
    let all = jobs(2);

    {
        let mut ledger = ResumeLedger::load_or_init(&config, &all)?;
        ledger.advance(Stage::CopiedToSource)?;
        ledger.advance(Stage::ExtractedAudio(0))?;
    }
    // Snapshot written, marker still holding the previous stage.
    fs::write(config.resume_stage_path(), "copied-to-source")?;

    let ledger = ResumeLedger::load_or_init(&config, &all)?;
    assert_eq!(ledger.pending(), all.as_slice());
    assert_eq!(ledger.stage(), Some(Stage::ExtractedAudio(0)));
    assert_eq!(
        fs::read_to_string(config.resume_stage_path())?,
        "extracted-audio-0"
    );
    assert_eq!(snapshot(&config)["stage"], "extracted-audio-0");
    Ok(())
}
