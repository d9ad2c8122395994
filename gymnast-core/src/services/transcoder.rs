// ============================================================================
// gymnast-core/src/services/transcoder.rs
// ============================================================================
//
// TRANSCODER SERVICE: Handles RunTranscode
//
// For each command the service writes the ffmpeg output to a temporary file
// next to the final one (`clip.tmp.mp4`), reports progress as events and then
// finalizes: an output larger than its source is replaced by a copy of the
// source, anything else is renamed into place.
//
// Every failure is reported through TranscodingCompleted { ok: false } and an
// unsuccessful outcome. The temporary file never survives a failed run.

use super::CONFIG_DEPENDENCY;
use crate::bus::{BusResult, MessageBus, Requires};
use crate::config::{CoreConfig, FFMPEG_GLOBAL_ARGS, TEMP_SUFFIX};
use crate::error::{CoreError, CoreResult, command_failed_error};
use crate::external::{FfmpegProcess, FfmpegSpawner};
use crate::media::OutputMediaParams;
use crate::messages::{RunTranscode, TranscodeOutcome, TranscodingCompleted, TranscodingProgress};
use crate::utils::{format_size, get_filename_safe, parse_ffmpeg_time, progress_percent};

use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Video encoder used for every output.
pub const VIDEO_CODEC: &str = "libx264";

/// Number of ffmpeg error lines kept for the failure message.
const STDERR_TAIL: usize = 5;

pub struct TranscoderService<S> {
    bus: MessageBus,
    spawner: S,
}

impl<S> TranscoderService<S>
where
    S: FfmpegSpawner + 'static,
{
    /// Subscribes the `RunTranscode` handler. Requires the `config` dependency.
    pub fn register(bus: &MessageBus, spawner: S) -> BusResult<()> {
        let service = Arc::new(Self {
            bus: bus.clone(),
            spawner,
        });
        bus.subscribe_command::<RunTranscode, _>(Requires::from([CONFIG_DEPENDENCY]), move |cmd: RunTranscode, deps| {
            let config = deps.get::<CoreConfig>(CONFIG_DEPENDENCY)?;
            Ok(service.run(&config, cmd)?)
        })
    }

    fn run(&self, config: &CoreConfig, cmd: RunTranscode) -> BusResult<TranscodeOutcome> {
        log::debug!("Transcoding {}", cmd.input_file.display());

        let result = build_output_paths(&config.output_dir, &cmd.input_file).and_then(|(temp, output)| {
            let outcome = self
                .encode(config, &cmd.input_file, &temp, &cmd.params)
                .and_then(|()| finalize_output(&cmd.input_file, &temp, &output));
            if outcome.is_err() {
                discard_temp(&temp);
            }
            outcome
        });

        let outcome = result.unwrap_or_else(|e| {
            log::error!("Transcoding {} failed: {}", cmd.input_file.display(), e);
            TranscodeOutcome {
                ok: false,
                message: e.to_string(),
                output_file: None,
            }
        });

        self.bus.emit(TranscodingCompleted {
            ok: outcome.ok,
            msg: outcome.message.clone(),
        })?;
        Ok(outcome)
    }

    fn encode(&self, config: &CoreConfig, input: &Path, temp: &Path, params: &OutputMediaParams) -> CoreResult<()> {
        let args = build_ffmpeg_args(&config.x264_preset, input, temp, params);
        let mut cmd = FfmpegCommand::new_with_path(&config.ffmpeg_bin);
        cmd.args(&args);

        let mut process = self.spawner.spawn(cmd)?;
        let mut duration: Option<f64> = None;
        let mut last_percent = -1.0;
        let mut stderr_tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);

        let streamed = process.handle_events(|event| {
            match event {
                FfmpegEvent::ParsedDuration(parsed) => {
                    if duration.is_none() {
                        duration = Some(parsed.duration);
                    }
                }
                FfmpegEvent::Progress(progress) => {
                    if let (Some(total), Some(elapsed)) = (duration, parse_ffmpeg_time(&progress.time)) {
                        let percent = progress_percent(elapsed, total);
                        if percent > last_percent {
                            last_percent = percent;
                            self.bus.emit(TranscodingProgress { percent })?;
                        }
                    }
                }
                FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, line) | FfmpegEvent::Error(line) => {
                    log::debug!("ffmpeg: {}", line);
                    if stderr_tail.len() == STDERR_TAIL {
                        stderr_tail.pop_front();
                    }
                    stderr_tail.push_back(line);
                }
                _ => {}
            }
            Ok(())
        });
        if let Err(e) = streamed {
            stop(&mut process);
            return Err(e);
        }

        let status = process.wait()?;
        if !status.success() {
            let stderr = Vec::from(stderr_tail).join("\n");
            return Err(command_failed_error("ffmpeg", status, stderr));
        }
        self.bus.emit(TranscodingProgress { percent: 100.0 })?;
        Ok(())
    }
}

/// Kills and reaps ffmpeg after its event stream was abandoned.
fn stop<P: FfmpegProcess>(process: &mut P) {
    if let Err(e) = process.kill() {
        log::warn!("Failed to kill ffmpeg: {}", e);
    }
    if let Err(e) = process.wait() {
        log::warn!("Failed to reap ffmpeg: {}", e);
    }
}

/// Builds the ffmpeg arguments (without the binary) for one transcode.
pub fn build_ffmpeg_args(preset: &str, input: &Path, output: &Path, params: &OutputMediaParams) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-i".into(),
        input.display().to_string(),
        "-c:v".into(),
        VIDEO_CODEC.into(),
        "-preset".into(),
        preset.into(),
        "-vf".into(),
        format!("scale={}:{}:flags=lanczos", params.width, params.height),
        "-b:v".into(),
        params.video_bitrate_avg.to_string(),
        "-maxrate".into(),
        params.video_bitrate_max.to_string(),
        "-bufsize".into(),
        params.video_bufsize.to_string(),
        "-c:a".into(),
        params.audio_codec.clone(),
    ];

    let is_mp4 = output
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
    if is_mp4 {
        args.extend(["-pix_fmt", "yuv420p", "-movflags", "+faststart"].map(String::from));
    }
    if params.audio_bitrate > 0 {
        args.push("-b:a".into());
        args.push(params.audio_bitrate.to_string());
    }
    args.extend(FFMPEG_GLOBAL_ARGS.iter().map(|arg| (*arg).to_string()));
    args.push(output.display().to_string());
    args
}

/// Returns `(temporary, final)` output paths for `input` inside `output_dir`.
pub fn build_output_paths(output_dir: &Path, input: &Path) -> CoreResult<(PathBuf, PathBuf)> {
    let output = output_dir.join(get_filename_safe(input)?);
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_name = match output.extension() {
        Some(ext) => format!("{stem}.{TEMP_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{TEMP_SUFFIX}"),
    };
    Ok((output.with_file_name(temp_name), output))
}

/// Moves the finished temporary file into place, or keeps the source when
/// the transcode came out larger.
pub fn finalize_output(input: &Path, temp: &Path, output: &Path) -> CoreResult<TranscodeOutcome> {
    if !temp.exists() {
        return Err(CoreError::PathError(format!(
            "Temporary output not found: {}",
            temp.display()
        )));
    }

    let source_size = fs::metadata(input)?.len();
    let output_size = fs::metadata(temp)?.len();

    if output_size > source_size {
        log::info!(
            "{} grew from {} to {}, keeping the source",
            input.display(),
            format_size(source_size),
            format_size(output_size)
        );
        fs::remove_file(temp)?;
        fs::copy(input, output)?;
        return Ok(TranscodeOutcome {
            ok: false,
            message: "Output was larger than the source, replaced with the source".to_string(),
            output_file: Some(output.to_path_buf()),
        });
    }

    if output.exists() {
        fs::remove_file(output)?;
    }
    fs::rename(temp, output)?;

    Ok(TranscodeOutcome {
        ok: true,
        message: format!("{} ({})", get_filename_safe(output)?, format_size(output_size)),
        output_file: Some(output.to_path_buf()),
    })
}

fn discard_temp(temp: &Path) {
    if temp.exists() {
        if let Err(e) = fs::remove_file(temp) {
            log::warn!("Failed to remove {}: {}", temp.display(), e);
        }
    }
}
