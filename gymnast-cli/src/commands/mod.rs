//! Command implementations for the CLI.

/// `gymnast run`: transcodes every pending file.
pub mod run;

/// `gymnast probe`: shows what `run` would do with individual files.
pub mod probe;
