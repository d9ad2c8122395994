// ============================================================================
// gymnast-core/src/media/probe.rs
// ============================================================================
//
// MEDIA PROBING: Source Properties via MediaInfo
//
// Runs `mediainfo --Output=JSON` on a source file and extracts the handful of
// properties the parameter heuristics need from the first video track and the
// first audio track.
//
// KEY COMPONENTS:
// - MediaProbe: seam used by the pipeline, mocked in tests
// - MediaInfoProbe: implementation that shells out to mediainfo
// - parse_mediainfo_json: pure parsing step, usable without the binary

use super::SourceMediaInfo;
use crate::config::DEFAULT_FPS;
use crate::error::{CoreError, CoreResult, command_failed_error, command_start_error, probe_error};

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Something that can read source properties from a media file.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> CoreResult<SourceMediaInfo>;
}

// ---- MediaInfo JSON layout ----

#[derive(Debug, Deserialize)]
struct MediaInfoResponse {
    media: Option<MediaInfoMedia>,
}

#[derive(Debug, Deserialize)]
struct MediaInfoMedia {
    #[serde(default)]
    track: Vec<MediaInfoTrack>,
}

/// A single track. mediainfo reports numbers as strings, but some builds emit
/// bare numbers, so values are kept as raw JSON.
#[derive(Debug, Deserialize)]
struct MediaInfoTrack {
    #[serde(rename = "@type")]
    track_type: String,
    #[serde(rename = "Format")]
    format: Option<Value>,
    #[serde(rename = "CodecID")]
    codec_id: Option<Value>,
    #[serde(rename = "Width")]
    width: Option<Value>,
    #[serde(rename = "Height")]
    height: Option<Value>,
    #[serde(rename = "FrameRate")]
    frame_rate: Option<Value>,
    #[serde(rename = "BitRate")]
    bit_rate: Option<Value>,
}

/// Probe backed by the `mediainfo` command line tool.
#[derive(Debug, Clone)]
pub struct MediaInfoProbe {
    bin: PathBuf,
}

impl MediaInfoProbe {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for MediaInfoProbe {
    fn default() -> Self {
        Self::new("mediainfo")
    }
}

impl MediaProbe for MediaInfoProbe {
    fn probe(&self, path: &Path) -> CoreResult<SourceMediaInfo> {
        log::debug!("Running mediainfo on: {}", path.display());

        let output = Command::new(&self.bin)
            .arg("--Output=JSON")
            .arg(path)
            .output()
            .map_err(|e| command_start_error("mediainfo", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(command_failed_error("mediainfo", output.status, stderr.trim()));
        }

        let info = parse_mediainfo_json(path, &output.stdout)?;
        log::debug!("Source properties for {}: {:?}", path.display(), info);
        Ok(info)
    }
}

/// Extracts [`SourceMediaInfo`] from mediainfo JSON output.
///
/// Both a video and an audio track are required. A missing frame rate falls
/// back to [`DEFAULT_FPS`]; missing bitrates become 0. Width, height and a
/// present frame rate must parse.
pub fn parse_mediainfo_json(path: &Path, json: &[u8]) -> CoreResult<SourceMediaInfo> {
    let response: MediaInfoResponse = serde_json::from_slice(json)?;
    let tracks = response.media.map(|m| m.track).unwrap_or_default();

    let video = tracks.iter().find(|t| t.track_type == "Video");
    let audio = tracks.iter().find(|t| t.track_type == "Audio");
    let (Some(video), Some(audio)) = (video, audio) else {
        return Err(probe_error(path, "source needs both a video and an audio track"));
    };

    let fps = match text(&video.frame_rate) {
        Some(raw) => parse_value::<f64>("frame rate", &raw)?,
        None => DEFAULT_FPS,
    };

    let audio_codec = text(&audio.format)
        .or_else(|| text(&audio.codec_id))
        .unwrap_or_default()
        .to_lowercase();

    Ok(SourceMediaInfo {
        width: required::<u32>("width", &video.width)?,
        height: required::<u32>("height", &video.height)?,
        fps,
        video_bitrate: lenient(&video.bit_rate),
        audio_codec,
        audio_bitrate: lenient(&audio.bit_rate),
    })
}

/// Non-empty textual form of a JSON scalar.
fn text(value: &Option<Value>) -> Option<String> {
    let raw = match value.as_ref()? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!raw.is_empty()).then_some(raw)
}

fn parse_value<T: std::str::FromStr>(field: &'static str, raw: &str) -> CoreResult<T> {
    raw.parse::<T>().map_err(|_| CoreError::InvalidMediaValue {
        field,
        value: raw.to_string(),
    })
}

fn required<T: std::str::FromStr>(field: &'static str, value: &Option<Value>) -> CoreResult<T> {
    let raw = text(value).ok_or(CoreError::InvalidMediaValue {
        field,
        value: String::new(),
    })?;
    parse_value(field, &raw)
}

fn lenient(value: &Option<Value>) -> u64 {
    text(value).and_then(|raw| raw.parse().ok()).unwrap_or(0)
}
