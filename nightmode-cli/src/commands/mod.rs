//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

/// Plans or resumes a batch and processes every job.
pub mod batch;
/// Standalone night-mode tracks for one audio file.
pub mod create;
/// Peak measurement of one file.
pub mod peak;
/// Planning phase only.
pub mod plan;
