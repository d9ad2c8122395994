//! `gymnast probe`: prints source properties and the parameters `run` would
//! choose, without transcoding anything.

use crate::cli::ProbeArgs;
use crate::error::CliResult;
use crate::terminal::render_panel;

use console::Style;
use gymnast_core::CoreError;
use gymnast_core::media::{MediaInfoProbe, MediaProbe, build_media_params};
use gymnast_core::utils::format_bitrate;

pub fn run_probe(args: ProbeArgs) -> CliResult<()> {
    let probe = MediaInfoProbe::new(&args.mediainfo);
    let mut failed = 0;

    for file in &args.files {
        let source = match probe.probe(file) {
            Ok(source) => source,
            Err(e) => {
                log::error!("{}: {}", file.display(), e);
                eprintln!("{}: {}", file.display(), e);
                failed += 1;
                continue;
            }
        };
        let params = build_media_params(&source);

        if args.json {
            let report = serde_json::json!({
                "file": file,
                "source": source,
                "output": params,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            let lines = vec![
                format!("Resolution: {} -> {}", source.resolution(), params.resolution()),
                format!("Frame rate: {:.3}", source.fps),
                format!(
                    "Video:      {} -> {} (max {}, buffer {})",
                    format_bitrate(source.video_bitrate),
                    format_bitrate(params.video_bitrate_avg),
                    format_bitrate(params.video_bitrate_max),
                    format_bitrate(params.video_bufsize)
                ),
                format!(
                    "Audio:      {} {} -> {} {}",
                    source.audio_codec,
                    format_bitrate(source.audio_bitrate),
                    params.audio_codec,
                    format_bitrate(params.audio_bitrate)
                ),
            ];
            let title = file.display().to_string();
            println!("{}", render_panel(&title, &lines, &Style::new().blue().bright()));
        }
    }

    if failed > 0 {
        return Err(CoreError::OperationFailed(format!(
            "{failed} of {} file(s) could not be probed",
            args.files.len()
        )));
    }
    Ok(())
}
