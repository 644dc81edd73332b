// ============================================================================
// nightmode-core/src/external/command.rs
// ============================================================================
//
// TOOL COMMANDS: One Abstraction for Every External Invocation
//
// Every stage describes the external call it needs as a ToolCommand (which
// tool, which arguments, a short label for logs and errors) and hands it to a
// ToolRunner. The runner is the single place that decides whether an exit
// status is a failure; stages only parse the successful output.
//
// KEY COMPONENTS:
// - Tool: the supported external programs and their exit code conventions
// - ToolCommand: argument list builder
// - ToolOutput: captured stdout and diagnostic lines
// - ToolRunner: trait implemented by the system runner and by test mocks

use crate::error::CoreResult;

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

/// External programs driven by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
    Mkvmerge,
}

impl Tool {
    /// Name of the executable looked up on the search path.
    pub fn program(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
            Tool::Mkvmerge => "mkvmerge",
        }
    }

    /// Argument that makes the tool print its version and exit.
    pub fn version_arg(self) -> &'static str {
        match self {
            Tool::Ffmpeg | Tool::Ffprobe => "-version",
            Tool::Mkvmerge => "--version",
        }
    }

    /// Whether an exit code means the tool did its job.
    ///
    /// mkvmerge exits with 1 when it only emitted warnings.
    pub fn accepts_exit_code(self, code: i32) -> bool {
        match self {
            Tool::Mkvmerge => code == 0 || code == 1,
            Tool::Ffmpeg | Tool::Ffprobe => code == 0,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// A fully described external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    tool: Tool,
    label: String,
    args: Vec<String>,
}

impl ToolCommand {
    pub fn new(tool: Tool, label: impl Into<String>) -> Self {
        Self {
            tool,
            label: label.into(),
            args: Vec::new(),
        }
    }

    pub fn ffmpeg(label: impl Into<String>) -> Self {
        Self::new(Tool::Ffmpeg, label)
    }

    pub fn ffprobe(label: impl Into<String>) -> Self {
        Self::new(Tool::Ffprobe, label)
    }

    pub fn mkvmerge(label: impl Into<String>) -> Self {
        Self::new(Tool::Mkvmerge, label)
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends a path argument. Non UTF-8 components are replaced lossily.
    pub fn path(&mut self, path: &Path) -> &mut Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Short description used in logs and error messages, e.g. `ffmpeg (volumedetect)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.tool, self.label)
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn os_args(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(OsStr::new)
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Value following `flag`, if the flag is present.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn last_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool)?;
        for arg in &self.args {
            if arg.contains(' ') || arg.is_empty() {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// What a successful invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Standard output, decoded lossily
    pub stdout: String,
    /// Diagnostic lines (stderr, or ffmpeg's parsed log stream)
    pub diagnostics: Vec<String>,
}

impl ToolOutput {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn from_diagnostics<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stdout: String::new(),
            diagnostics: lines.into_iter().map(Into::into).collect(),
        }
    }
}

/// Runs external commands.
///
/// Implementations return `Ok` only when the tool accepted its exit status
/// (see [`Tool::accepts_exit_code`]); everything else is an error.
pub trait ToolRunner {
    fn run(&self, command: &ToolCommand) -> CoreResult<ToolOutput>;
}

impl<T: ToolRunner + ?Sized> ToolRunner for &T {
    fn run(&self, command: &ToolCommand) -> CoreResult<ToolOutput> {
        (**self).run(command)
    }
}

/// Keeps the last `max_lines` diagnostic lines for error messages.
pub(crate) fn diagnostics_tail(lines: &[String], max_lines: usize) -> String {
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn builds_arguments_in_order() {
        let mut cmd = ToolCommand::ffmpeg("extract");
        cmd.arg("-i")
            .path(&PathBuf::from("source.mkv"))
            .args(["-map", "0:2"])
            .arg("-y");

        assert_eq!(cmd.tool(), Tool::Ffmpeg);
        assert_eq!(cmd.get_args(), ["-i", "source.mkv", "-map", "0:2", "-y"]);
        assert_eq!(cmd.arg_after("-map"), Some("0:2"));
        assert_eq!(cmd.last_arg(), Some("-y"));
        assert!(cmd.has_arg("-i"));
        assert_eq!(cmd.label(), "ffmpeg (extract)");
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let mut cmd = ToolCommand::mkvmerge("remux");
        cmd.args(["--track-name", "0:English Stereo Nightmode Loudnorm (FLAC)"]);
        assert_eq!(
            cmd.to_string(),
            "mkvmerge --track-name \"0:English Stereo Nightmode Loudnorm (FLAC)\""
        );
    }

    #[test]
    fn mkvmerge_warnings_are_success() {
        assert!(Tool::Mkvmerge.accepts_exit_code(1));
        assert!(!Tool::Mkvmerge.accepts_exit_code(2));
        assert!(!Tool::Ffmpeg.accepts_exit_code(1));
    }

    #[test]
    fn tail_keeps_last_lines() {
        let lines: Vec<String> = (0..5).map(|i| format!("line {i}")).collect();
        assert_eq!(diagnostics_tail(&lines, 2), "line 3\nline 4");
        assert_eq!(diagnostics_tail(&lines, 10).lines().count(), 5);
    }
}
