//! Output parameter heuristics: target resolution, video bitrate and audio
//! handling derived from the source properties.

use super::{OutputMediaParams, SourceMediaInfo};
use crate::config::{
    DEFAULT_AAC_BITRATE, DEFAULT_AUDIO_CODEC, DEFAULT_BPP_1080P, DEFAULT_BPP_720P, DEFAULT_BPP_SD,
    RESOLUTION_MAX_HEIGHT, RESOLUTION_MAX_WIDTH, VBV_BUFSIZE_MULTIPLIER,
};

/// Audio codec value that tells ffmpeg to pass the stream through.
pub const AUDIO_COPY: &str = "copy";

/// Chooses every output setting for `source`.
pub fn build_media_params(source: &SourceMediaInfo) -> OutputMediaParams {
    let (width, height) = choose_target_resolution(source.width, source.height);
    let avg = choose_target_video_bitrate(width, height, source.fps, source.video_bitrate);
    let (audio_codec, audio_bitrate) = choose_audio_params(&source.audio_codec, source.audio_bitrate);

    OutputMediaParams {
        width,
        height,
        video_bitrate_avg: avg,
        video_bitrate_max: avg,
        video_bufsize: avg * VBV_BUFSIZE_MULTIPLIER,
        audio_codec,
        audio_bitrate,
    }
}

/// Fits `width`x`height` into the bounding box without upscaling.
///
/// Landscape sources use 1920x1080, portrait and square ones 1080x1920.
/// Both sides are rounded down to even numbers and never drop below 2.
pub fn choose_target_resolution(width: u32, height: u32) -> (u32, u32) {
    if width > height {
        scale_to_fit(width, height, RESOLUTION_MAX_WIDTH, RESOLUTION_MAX_HEIGHT)
    } else {
        scale_to_fit(width, height, RESOLUTION_MAX_HEIGHT, RESOLUTION_MAX_WIDTH)
    }
}

fn scale_to_fit(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (even(width), even(height));
    }
    let k = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let scaled_width = (f64::from(width) * k) as u32;
    let scaled_height = (f64::from(height) * k) as u32;
    (even(scaled_width), even(scaled_height))
}

fn even(value: u32) -> u32 {
    (value - value % 2).max(2)
}

/// Bits per pixel per frame for an output of `width`x`height`.
pub fn bits_per_pixel(width: u32, height: u32) -> f64 {
    let pixels = u64::from(width) * u64::from(height);
    if pixels <= 640 * 480 {
        DEFAULT_BPP_SD
    } else if pixels <= 1280 * 720 {
        DEFAULT_BPP_720P
    } else {
        DEFAULT_BPP_1080P
    }
}

/// Average video bitrate in bits per second, never above a known source bitrate.
pub fn choose_target_video_bitrate(width: u32, height: u32, fps: f64, source_bitrate: u64) -> u64 {
    let pixels = f64::from(width) * f64::from(height);
    let recommended = (pixels * fps * bits_per_pixel(width, height)) as u64;
    if source_bitrate > 0 {
        recommended.min(source_bitrate)
    } else {
        recommended
    }
}

/// Keeps audio that is unknown or already small AAC, re-encodes the rest.
pub fn choose_audio_params(codec: &str, bitrate: u64) -> (String, u64) {
    if codec.is_empty() || (codec == DEFAULT_AUDIO_CODEC && bitrate < DEFAULT_AAC_BITRATE) {
        return (AUDIO_COPY.to_string(), 0);
    }
    (DEFAULT_AUDIO_CODEC.to_string(), DEFAULT_AAC_BITRATE)
}
