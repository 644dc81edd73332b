// nightmode-cli/src/lib.rs
//
// Library portion of the Nightmode CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod terminal;

// Re-export items needed by the binary or integration tests
pub use cli::{BatchArgs, Cli, Commands, CreateArgs, PeakArgs, PlanArgs, ProcessingArgs};
pub use commands::batch::run_batch;
pub use commands::create::run_create;
pub use commands::peak::run_peak;
pub use commands::plan::run_plan;
pub use error::{CliErrorContext, CliResult};
