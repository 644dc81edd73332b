// ============================================================================
// nightmode-core/src/external/ffmpeg_executor.rs
// ============================================================================
//
// SYSTEM RUNNER: Executes ToolCommands Against the Real Binaries
//
// ffmpeg runs through ffmpeg-sidecar so its log stream arrives as parsed
// events: log lines are kept as diagnostics (volumedetect reports through
// them) and progress events drive an indicatif spinner. ffprobe and mkvmerge
// are plain std::process invocations with captured output.
//
// Failure classification happens here and nowhere else: a missing binary is
// DependencyNotFound, a start or wait error is CommandStart/CommandWait, and
// an exit code the tool does not accept is CommandFailed with the tail of the
// diagnostics attached.

use super::command::{Tool, ToolCommand, ToolOutput, ToolRunner, diagnostics_tail};
use crate::error::{
    CoreError, CoreResult, command_failed_error, command_start_error, command_wait_error,
};

use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

/// Number of diagnostic lines attached to a failure.
const ERROR_TAIL_LINES: usize = 12;

/// Runs tools installed on the system.
#[derive(Debug, Clone, Default)]
pub struct SystemToolRunner {
    show_progress: bool,
}

impl SystemToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows a spinner with ffmpeg's time/speed while it runs.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn run_ffmpeg(&self, command: &ToolCommand) -> CoreResult<ToolOutput> {
        let label = command.label();
        let mut cmd = FfmpegCommand::new();
        cmd.args(command.os_args());

        let mut child = cmd
            .spawn()
            .map_err(|e| command_start_error(label.clone(), e))?;

        let spinner = self.spinner(&label);
        let mut diagnostics = Vec::new();

        let iterator = child.iter().map_err(|e| {
            log::error!("Failed to get ffmpeg event iterator: {}", e);
            CoreError::OperationFailed(format!("{label}: {e}"))
        })?;
        for event in iterator {
            match event {
                FfmpegEvent::Log(_, line) => {
                    log::trace!("{}: {}", label, line);
                    diagnostics.push(line);
                }
                FfmpegEvent::Error(line) => {
                    log::debug!("{}: {}", label, line);
                    diagnostics.push(line);
                }
                FfmpegEvent::Progress(progress) => {
                    if let Some(bar) = &spinner {
                        bar.set_message(format!(
                            "{label}  time={} speed={:.1}x",
                            progress.time, progress.speed
                        ));
                    }
                }
                _ => {}
            }
        }

        let status = child
            .wait()
            .map_err(|e| command_wait_error(label.clone(), e))?;

        if let Some(bar) = spinner {
            bar.finish_and_clear();
        }

        if !exit_accepted(Tool::Ffmpeg, status) {
            log::error!("{} exited with {}", label, status);
            return Err(command_failed_error(
                label,
                status,
                diagnostics_tail(&diagnostics, ERROR_TAIL_LINES),
            ));
        }

        Ok(ToolOutput {
            stdout: String::new(),
            diagnostics,
        })
    }

    fn run_process(&self, command: &ToolCommand) -> CoreResult<ToolOutput> {
        let label = command.label();
        let output = Command::new(command.tool().program())
            .args(command.os_args())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| command_start_error(label.clone(), e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let diagnostics: Vec<String> = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::to_string)
            .collect();

        if !exit_accepted(command.tool(), output.status) {
            log::error!("{} exited with {}", label, output.status);
            // mkvmerge reports its errors on stdout
            let details = if diagnostics.is_empty() {
                let lines: Vec<String> = stdout.lines().map(str::to_string).collect();
                diagnostics_tail(&lines, ERROR_TAIL_LINES)
            } else {
                diagnostics_tail(&diagnostics, ERROR_TAIL_LINES)
            };
            return Err(command_failed_error(label, output.status, details));
        }

        Ok(ToolOutput {
            stdout,
            diagnostics,
        })
    }

    fn spinner(&self, label: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Some(bar)
    }
}

impl ToolRunner for SystemToolRunner {
    fn run(&self, command: &ToolCommand) -> CoreResult<ToolOutput> {
        log::debug!("Running: {}", command);
        match command.tool() {
            Tool::Ffmpeg => self.run_ffmpeg(command),
            Tool::Ffprobe | Tool::Mkvmerge => self.run_process(command),
        }
    }
}

fn exit_accepted(tool: Tool, status: ExitStatus) -> bool {
    status.code().is_some_and(|code| tool.accepts_exit_code(code))
}
