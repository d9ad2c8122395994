// ============================================================================
// gymnast-core/src/external/mod.rs
// ============================================================================
//
// EXTERNAL TOOLS: ffmpeg Process Seam
//
// The transcoder never spawns ffmpeg directly. It goes through the
// FfmpegSpawner trait so tests can substitute a process that replays canned
// events and writes a fake output file.

/// Traits and implementations for spawning and interacting with ffmpeg processes
pub mod ffmpeg_executor;

pub use ffmpeg_executor::{FfmpegProcess, FfmpegSpawner, SidecarProcess, SidecarSpawner};
