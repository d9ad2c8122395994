// ============================================================================
// gymnast-core/src/config.rs
// ============================================================================
//
// CONFIGURATION: Core Configuration Structures and Constants
//
// Paths, external tool locations, encoder settings and the thresholds used by
// the output parameter heuristics. The CLI builds a CoreConfig from its
// arguments and registers it on the bus as the "config" dependency.
//
// KEY COMPONENTS:
// - CoreConfig: settings shared by the pipeline services
// - Default constants: resolution box, bits-per-pixel tiers, audio defaults

use crate::bus::BusConfig;
use crate::error::{CoreError, CoreResult};

use std::path::PathBuf;

// ============================================================================
// DEFAULT CONSTANTS
// ============================================================================

/// Extensions (lowercase, without the dot) treated as video input.
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "mov", "avi", "ts", "m4v", "webm", "flv", "wmv", "mpg", "mpeg", "vob", "m2ts",
    "mts", "3gp",
];

/// Landscape bounding box. Portrait and square sources use it rotated.
pub const RESOLUTION_MAX_WIDTH: u32 = 1920;
pub const RESOLUTION_MAX_HEIGHT: u32 = 1080;

/// Bits per pixel per frame for sources up to 640x480 pixels.
pub const DEFAULT_BPP_SD: f64 = 0.03;
/// Bits per pixel per frame for sources up to 1280x720 pixels.
pub const DEFAULT_BPP_720P: f64 = 0.02;
/// Bits per pixel per frame for anything larger.
pub const DEFAULT_BPP_1080P: f64 = 0.01;

/// VBV buffer size as a multiple of the average bitrate.
pub const VBV_BUFSIZE_MULTIPLIER: u64 = 2;

pub const DEFAULT_X264_PRESET: &str = "medium";
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
pub const DEFAULT_AAC_BITRATE: u64 = 128_000;

/// Frame rate assumed when the container does not report one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Arguments appended to every ffmpeg invocation.
pub const FFMPEG_GLOBAL_ARGS: &[&str] = &["-hide_banner", "-y"];

/// Marker placed before the extension of in-progress outputs.
pub const TEMP_SUFFIX: &str = "tmp";

const X264_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

// ============================================================================
// CORE CONFIGURATION
// ============================================================================

/// Settings shared by the pipeline services.
///
/// # Examples
///
/// ```rust
/// use gymnast_core::CoreConfig;
/// use std::path::PathBuf;
///
/// let mut config = CoreConfig::new(PathBuf::from("input"), PathBuf::from("output"));
/// config.x264_preset = "slow".to_string();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CoreConfig {
    // ---- Path Configuration ----
    /// Directory scanned for source videos
    pub input_dir: PathBuf,

    /// Directory receiving transcoded files
    pub output_dir: PathBuf,

    // ---- External Tools ----
    /// ffmpeg executable, resolved through PATH when relative
    pub ffmpeg_bin: PathBuf,

    /// mediainfo executable
    pub mediainfo_bin: PathBuf,

    // ---- Encoder Settings ----
    /// libx264 preset name
    pub x264_preset: String,

    /// Lowercase extensions considered video input
    pub video_extensions: Vec<String>,

    // ---- Message Bus ----
    pub bus: BusConfig,
}

impl CoreConfig {
    pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            input_dir,
            output_dir,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            mediainfo_bin: PathBuf::from("mediainfo"),
            x264_preset: DEFAULT_X264_PRESET.to_string(),
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
            bus: BusConfig::default(),
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.input_dir.as_os_str().is_empty() {
            return Err(CoreError::Config("input directory is empty".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(CoreError::Config("output directory is empty".to_string()));
        }
        if self.input_dir == self.output_dir {
            return Err(CoreError::Config(format!(
                "input and output directory must differ: {}",
                self.input_dir.display()
            )));
        }
        if !X264_PRESETS.contains(&self.x264_preset.as_str()) {
            return Err(CoreError::Config(format!(
                "unknown x264 preset '{}' (expected one of: {})",
                self.x264_preset,
                X264_PRESETS.join(", ")
            )));
        }
        if self.video_extensions.is_empty() {
            return Err(CoreError::Config(
                "at least one video extension is required".to_string(),
            ));
        }
        if let Some(bad) = self
            .video_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.') || ext.chars().any(char::is_uppercase))
        {
            return Err(CoreError::Config(format!(
                "video extensions must be lowercase and without a dot: '{bad}'"
            )));
        }
        self.bus.validate()?;
        Ok(())
    }
}
