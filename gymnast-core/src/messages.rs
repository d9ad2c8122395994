//! Messages exchanged by the pipeline services.
//!
//! Commands have exactly one handler and return a value to the publisher.
//! Events are fire-and-forget notifications rendered by the console service.

use crate::media::{OutputMediaParams, SourceMediaInfo};
use crate::{command, event};

use std::fmt;
use std::path::PathBuf;

/// Colors available to console messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleColor {
    Yellow,
    Green,
    Red,
}

impl fmt::Display for ConsoleColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConsoleColor::Yellow => "yellow",
            ConsoleColor::Green => "green",
            ConsoleColor::Red => "red",
        })
    }
}

// ---- Commands ----

/// Transcode one file with the given parameters.
#[derive(Debug, Clone)]
pub struct RunTranscode {
    pub input_file: PathBuf,
    pub params: OutputMediaParams,
}

/// What happened to a transcoded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutcome {
    /// `false` when ffmpeg failed or the source was kept because it was smaller
    pub ok: bool,
    pub message: String,
    /// Final file in the output directory, if one was written
    pub output_file: Option<PathBuf>,
}

/// Print a line in the given color.
#[derive(Debug, Clone)]
pub struct PrintToConsole {
    pub msg: String,
    pub color: ConsoleColor,
}

command!(RunTranscode => TranscodeOutcome);
command!(PrintToConsole => ());

// ---- Events ----

/// Nothing in the input directory needs transcoding.
#[derive(Debug, Clone)]
pub struct NoFilesToTranscode {
    pub msg: String,
    pub color: ConsoleColor,
}

/// The batch about to be processed, in processing order.
#[derive(Debug, Clone)]
pub struct FilesToTranscode {
    pub files: Vec<PathBuf>,
}

/// A file was probed and its output parameters chosen.
#[derive(Debug, Clone)]
pub struct FileDataProcessed {
    pub input_file: PathBuf,
    pub source: SourceMediaInfo,
    pub params: OutputMediaParams,
}

/// A file could not be prepared; the batch continues.
#[derive(Debug, Clone)]
pub struct AppFailure {
    pub msg: String,
}

/// Progress of the current transcode in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodingProgress {
    pub percent: f64,
}

#[derive(Debug, Clone)]
pub struct TranscodingCompleted {
    pub ok: bool,
    pub msg: String,
}

event!(
    NoFilesToTranscode,
    FilesToTranscode,
    FileDataProcessed,
    AppFailure,
    TranscodingProgress,
    TranscodingCompleted,
);
