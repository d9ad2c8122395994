// gymnast-cli/src/lib.rs
//
// Library portion of the Gymnast CLI application.
// Contains argument definitions, the console service and command logic.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod terminal;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, Commands, ProbeArgs, RunArgs};
pub use commands::probe::run_probe;
pub use commands::run::run_transcode;
pub use terminal::ConsoleService;
