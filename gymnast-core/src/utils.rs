//! Formatting and path helpers shared by the pipeline and the CLI.

use crate::error::{CoreError, CoreResult};

use std::path::Path;

/// Formats a byte count with decimal units, e.g. `1_500_000` -> `"1.5 MB"`.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

    if bytes < 1000 {
        return if bytes == 1 {
            "1 byte".to_string()
        } else {
            format!("{bytes} bytes")
        };
    }

    let mut value = bytes as f64 / 1000.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    format!("{} {unit}", trim_decimals(value))
}

/// Formats a bitrate in bits per second, e.g. `2_500_000` -> `"2500 kb/s"`.
#[must_use]
pub fn format_bitrate(bps: u64) -> String {
    if bps == 0 {
        "unknown".to_string()
    } else {
        format!("{} kb/s", bps / 1000)
    }
}

fn trim_decimals(value: f64) -> String {
    let fixed = format!("{value:.2}");
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Parses FFmpeg time string (HH:MM:SS.MS) to seconds. Returns None if invalid.
#[must_use]
pub fn parse_ffmpeg_time(time: &str) -> Option<f64> {
    let mut parts = time.trim().split(':');
    let hours = parts.next()?.parse::<f64>().ok()?;
    let minutes = parts.next()?.parse::<f64>().ok()?;
    let seconds = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() || hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Percentage of `elapsed` over `total`, clamped to 0..=100.
#[must_use]
pub fn progress_percent(elapsed: f64, total: f64) -> f64 {
    if total <= 0.0 || !total.is_finite() || !elapsed.is_finite() {
        return 0.0;
    }
    (elapsed / total * 100.0).clamp(0.0, 100.0)
}

/// Extracts the file name of `path` as an owned string.
pub fn get_filename_safe(path: &Path) -> CoreResult<String> {
    Ok(path
        .file_name()
        .ok_or_else(|| CoreError::PathError(format!("Failed to get filename for {}", path.display())))?
        .to_string_lossy()
        .to_string())
}
