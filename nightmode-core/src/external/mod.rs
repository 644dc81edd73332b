// ============================================================================
// nightmode-core/src/external/mod.rs
// ============================================================================
//
// EXTERNAL TOOLS: Interactions with ffmpeg, ffprobe and mkvmerge
//
// This module encapsulates every interaction with the external command-line
// tools. Stages build ToolCommands and pass them to a ToolRunner; the system
// runner executes them, tests substitute a recording mock.
//
// KEY COMPONENTS:
// - ToolCommand / ToolRunner: the command abstraction
// - SystemToolRunner: concrete runner (ffmpeg-sidecar for ffmpeg)
// - ffprobe stream parsing into typed descriptors
// - Dependency checking

// ---- Internal crate imports ----
use crate::error::{CoreError, CoreResult};

// ---- Standard library imports ----
use std::io;
use std::process::{Command, Stdio};

// ============================================================================
// SUBMODULES
// ============================================================================

/// Command description and the runner trait
pub mod command;

/// Runner that executes commands against the installed tools
pub mod ffmpeg_executor;

/// ffprobe invocation and stream parsing
pub mod ffprobe_executor;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use command::{Tool, ToolCommand, ToolOutput, ToolRunner};
pub use ffmpeg_executor::SystemToolRunner;
pub use ffprobe_executor::{
    ProbedStream, TrackDescriptor, audio_track_descriptors, probe_sample_rate, probe_streams,
};

// ============================================================================
// DEPENDENCY CHECKING
// ============================================================================

/// Checks that `tool` is installed and starts.
///
/// The tool is run with its version argument and all output discarded. Only
/// the ability to start matters here, not the exit status.
pub fn check_dependency(tool: Tool) -> CoreResult<()> {
    let result = Command::new(tool.program())
        .arg(tool.version_arg())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(_) => {
            log::debug!("Found dependency: {}", tool);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("Dependency '{}' not found.", tool);
            Err(CoreError::DependencyNotFound(tool.program().to_string()))
        }
        Err(e) => {
            log::error!("Failed to start dependency check for '{}': {}", tool, e);
            Err(CoreError::CommandStart(tool.program().to_string(), e))
        }
    }
}

/// Checks every tool the batch pipeline needs.
pub fn check_all_dependencies() -> CoreResult<()> {
    for tool in [Tool::Ffmpeg, Tool::Ffprobe, Tool::Mkvmerge] {
        check_dependency(tool)?;
    }
    Ok(())
}
