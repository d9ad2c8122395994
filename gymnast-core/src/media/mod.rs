//! Media information for source files and the parameters chosen for output.
//!
//! `probe` reads source properties through mediainfo, `params` turns them into
//! the settings handed to the transcoder.

pub mod params;
pub mod probe;

pub use params::build_media_params;
pub use probe::{MediaInfoProbe, MediaProbe};

use serde::Serialize;

/// Properties of a source file that drive output parameter selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceMediaInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Average video bitrate in bits per second, 0 when unknown
    pub video_bitrate: u64,
    /// Lowercased audio format, empty when unknown
    pub audio_codec: String,
    /// Audio bitrate in bits per second, 0 when unknown
    pub audio_bitrate: u64,
}

impl SourceMediaInfo {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Encoding settings for one output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputMediaParams {
    pub width: u32,
    pub height: u32,
    pub video_bitrate_avg: u64,
    pub video_bitrate_max: u64,
    pub video_bufsize: u64,
    /// ffmpeg audio codec name, `copy` to pass the stream through
    pub audio_codec: String,
    /// Audio bitrate in bits per second, 0 to leave it to the codec
    pub audio_bitrate: u64,
}

impl OutputMediaParams {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
