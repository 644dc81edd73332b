// nightmode-core/tests/support/mod.rs
//
// Test doubles shared by the integration tests: a ToolRunner that records
// every command and fakes the tools' side effects, and a Prompter answering
// from a script.

#![allow(dead_code)]

use nightmode_core::error::{CoreError, CoreResult};
use nightmode_core::external::{Tool, ToolCommand, ToolOutput, ToolRunner};
use nightmode_core::jobs::planner::Prompter;
use nightmode_core::processing::{GateDecision, ReplaceGate};
use nightmode_core::ProbedStream;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MKVMERGE_CONTENT: &str = "mkvmerge output";

type PeakFn = Box<dyn Fn(&Path) -> Option<f64>>;
type ProbeFn = Box<dyn Fn(&Path) -> String>;
type FailFn = Box<dyn Fn(&ToolCommand) -> bool>;

/// Records commands and fakes ffmpeg, ffprobe and mkvmerge.
///
/// - volumedetect reports the peak returned by the peak function
///   (default: -3.2 dB for `prenorm.flac`, -0.5 dB for everything else)
/// - other ffmpeg calls write a dummy file at their last argument
/// - mkvmerge writes a dummy file at the value of `-o`
/// - ffprobe answers with the JSON returned by the probe function
pub struct MockRunner {
    calls: RefCell<Vec<ToolCommand>>,
    peak: PeakFn,
    probe: ProbeFn,
    fail: Option<FailFn>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            peak: Box::new(|path| {
                if file_name(path) == "prenorm.flac" {
                    Some(-3.2)
                } else {
                    Some(-0.5)
                }
            }),
            probe: Box::new(|path| {
                if file_name(path) == "output.mkv" {
                    container_json(&[
                        ("truehd", "7.1", "eng"),
                        ("ac3", "5.1(side)", "eng"),
                        ("flac", "stereo", "eng"),
                        ("flac", "stereo", "eng"),
                    ])
                } else {
                    audio_file_json("48000")
                }
            }),
            fail: None,
        }
    }

    pub fn with_peaks(mut self, peak: impl Fn(&Path) -> Option<f64> + 'static) -> Self {
        self.peak = Box::new(peak);
        self
    }

    pub fn with_probe(mut self, probe: impl Fn(&Path) -> String + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn failing_when(mut self, fail: impl Fn(&ToolCommand) -> bool + 'static) -> Self {
        self.fail = Some(Box::new(fail));
        self
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.borrow().clone()
    }

    pub fn calls_of(&self, tool: Tool) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.tool() == tool)
            .collect()
    }

    /// ffmpeg calls other than peak measurements.
    pub fn encodes(&self) -> Vec<ToolCommand> {
        self.calls_of(Tool::Ffmpeg)
            .into_iter()
            .filter(|c| !c.has_arg("volumedetect"))
            .collect()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl ToolRunner for MockRunner {
    fn run(&self, command: &ToolCommand) -> CoreResult<ToolOutput> {
        self.calls.borrow_mut().push(command.clone());

        if self.fail.as_ref().is_some_and(|fail| fail(command)) {
            return Err(CoreError::CommandFailed {
                command: command.label(),
                status: "exit status: 1".to_string(),
                stderr: "mock failure".to_string(),
            });
        }

        match command.tool() {
            Tool::Ffmpeg if command.has_arg("volumedetect") => {
                let input = PathBuf::from(command.arg_after("-i").unwrap_or_default());
                let mut lines = vec![
                    "[Parsed_volumedetect_0 @ 0x5581] n_samples: 96000".to_string(),
                    "[Parsed_volumedetect_0 @ 0x5581] mean_volume: -21.3 dB".to_string(),
                ];
                if let Some(peak) = (self.peak)(&input) {
                    lines.push(format!("[Parsed_volumedetect_0 @ 0x5581] max_volume: {peak:.1} dB"));
                }
                Ok(ToolOutput::from_diagnostics(lines))
            }
            Tool::Ffmpeg => {
                let output = command.last_arg().unwrap_or_default();
                write_dummy(Path::new(output), &command.label());
                Ok(ToolOutput::default())
            }
            Tool::Mkvmerge => {
                let output = command.arg_after("-o").unwrap_or_default();
                write_dummy(Path::new(output), MKVMERGE_CONTENT);
                Ok(ToolOutput::from_stdout("Multiplexing took 1 second."))
            }
            Tool::Ffprobe => {
                let input = PathBuf::from(command.last_arg().unwrap_or_default());
                Ok(ToolOutput::from_stdout((self.probe)(&input)))
            }
        }
    }
}

fn write_dummy(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent of mock output");
    }
    fs::write(path, content).expect("write mock output");
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// ffprobe report of a container with one video stream and the given
/// `(codec, layout, language)` audio streams, numbered from 1.
pub fn container_json(audio: &[(&str, &str, &str)]) -> String {
    let mut streams = vec![serde_json::json!({
        "index": 0, "codec_type": "video", "codec_name": "hevc"
    })];
    for (i, (codec, layout, language)) in audio.iter().enumerate() {
        streams.push(serde_json::json!({
            "index": i + 1,
            "codec_type": "audio",
            "codec_name": codec,
            "channel_layout": layout,
            "sample_rate": "48000",
            "sample_fmt": "s32",
            "tags": {"language": language}
        }));
    }
    serde_json::json!({"streams": streams, "format": {}}).to_string()
}

/// ffprobe report of a single-stream audio file.
pub fn audio_file_json(sample_rate: &str) -> String {
    serde_json::json!({
        "streams": [{
            "index": 0,
            "codec_type": "audio",
            "codec_name": "flac",
            "channel_layout": "stereo",
            "sample_rate": sample_rate,
            "sample_fmt": "s32"
        }],
        "format": {}
    })
    .to_string()
}

/// Answers questions from a script and records the conversation.
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub shown: Vec<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            shown: Vec::new(),
            asked: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    pub fn invalid_count(&self) -> usize {
        self.shown.iter().filter(|l| *l == "Invalid input").count()
    }
}

impl Prompter for ScriptedPrompter {
    fn show(&mut self, line: &str) -> CoreResult<()> {
        self.shown.push(line.to_string());
        Ok(())
    }

    fn ask(&mut self, question: &str) -> CoreResult<String> {
        self.asked.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| CoreError::OperationFailed("prompter ran out of answers".to_string()))
    }
}

/// Gate that always aborts and remembers what it was shown.
#[derive(Default)]
pub struct AbortGate {
    pub shown_streams: usize,
}

impl ReplaceGate for AbortGate {
    fn confirm(
        &mut self,
        _output: &Path,
        streams: &[ProbedStream],
        _delay: Duration,
    ) -> CoreResult<GateDecision> {
        self.shown_streams = streams.len();
        Ok(GateDecision::Abort)
    }
}
