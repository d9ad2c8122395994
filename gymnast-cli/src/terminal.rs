// ============================================================================
// gymnast-cli/src/terminal.rs
// ============================================================================
//
// TERMINAL OUTPUT: Console Service
//
// Renders pipeline messages in the terminal. The service owns the
// PrintToConsole command and subscribes to every pipeline event; all event
// handlers run on the bus delivery worker, one at a time, so the state kept
// between events only needs a plain Mutex.
//
// KEY COMPONENTS:
// - ConsoleService: bus handlers and per-file render state
// - render_panel: rounded box used for the file list and parameter panels
// - styling: colors and symbols

use gymnast_core::bus::{BusResult, MessageBus, Requires};
use gymnast_core::messages::{
    AppFailure, ConsoleColor, FileDataProcessed, FilesToTranscode, NoFilesToTranscode, PrintToConsole,
    TranscodingCompleted, TranscodingProgress,
};
use gymnast_core::utils::format_bitrate;

use console::{Style, Term, measure_text_width, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// ============================================================================
// STYLING
// ============================================================================

pub mod styling {
    pub const DONE_LABEL: &str = "[ DONE ]";
    pub const WARNING_LABEL: &str = "[ WARNING ]";
    pub const PROGRESS_TEMPLATE: &str = "  Progress: [{bar:50.green}] {percent:>3}% ({elapsed})";
    pub const PROGRESS_CHARS: &str = "█░";
}

fn color_style(color: ConsoleColor) -> Style {
    match color {
        ConsoleColor::Yellow => Style::new().yellow().bold(),
        ConsoleColor::Green => Style::new().green().bold(),
        ConsoleColor::Red => Style::new().red().bold(),
    }
}

// ============================================================================
// PANELS
// ============================================================================

/// Draws `lines` inside a rounded box with `title` in the top border.
///
/// Widths are measured without ANSI escapes, so styled lines keep the
/// border aligned.
pub fn render_panel(title: &str, lines: &[String], border: &Style) -> String {
    let content_width = lines
        .iter()
        .map(|line| measure_text_width(line))
        .max()
        .unwrap_or(0)
        .max(measure_text_width(title) + 2);

    let mut out = String::new();
    let top_fill = content_width - measure_text_width(title) - 1;
    out.push_str(&border.apply_to(format!("╭─ {title} {}╮", "─".repeat(top_fill))).to_string());
    out.push('\n');
    for line in lines {
        let pad = content_width - measure_text_width(line);
        out.push_str(&format!(
            "{} {line}{} {}\n",
            border.apply_to("│"),
            " ".repeat(pad),
            border.apply_to("│")
        ));
    }
    out.push_str(&border.apply_to(format!("╰{}╯", "─".repeat(content_width + 2))).to_string());
    out
}

/// Lines of the file list panel.
pub fn file_list_lines(files: &[std::path::PathBuf]) -> Vec<String> {
    let mut lines: Vec<String> = files
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            format!("- {name}")
        })
        .collect();
    lines.push(format!("Total: {} file(s)", files.len()));
    lines
}

/// Lines of the per-file parameter panel.
pub fn parameter_lines(event: &FileDataProcessed) -> Vec<String> {
    let source = &event.source;
    let params = &event.params;
    vec![
        "Parameters:".to_string(),
        format!(
            "  Source: {}, {:.3} fps, video {}, audio {}",
            source.resolution(),
            source.fps,
            format_bitrate(source.video_bitrate),
            if source.audio_codec.is_empty() { "unknown" } else { source.audio_codec.as_str() }
        ),
        format!(
            "  Target: {}, video {}, audio {}",
            params.resolution(),
            format_bitrate(params.video_bitrate_avg),
            params.audio_codec
        ),
    ]
}

// ============================================================================
// CONSOLE SERVICE
// ============================================================================

#[derive(Default)]
struct RenderState {
    current: Option<String>,
    bar: Option<ProgressBar>,
}

/// Renders pipeline messages. Registered once per bus.
pub struct ConsoleService {
    term: Term,
    state: Mutex<RenderState>,
}

impl ConsoleService {
    /// Subscribes the console handlers on `bus` and returns the service.
    pub fn register(bus: &MessageBus) -> BusResult<Arc<Self>> {
        let service = Arc::new(Self {
            term: Term::stdout(),
            state: Mutex::new(RenderState::default()),
        });

        let s = Arc::clone(&service);
        bus.subscribe_command::<PrintToConsole, _>(Requires::none(), move |cmd, _| {
            s.print(&cmd.msg, cmd.color)
        })?;
        let s = Arc::clone(&service);
        bus.subscribe_event::<NoFilesToTranscode, _>(Requires::none(), move |e, _| s.print(&e.msg, e.color))?;
        let s = Arc::clone(&service);
        bus.subscribe_event::<FilesToTranscode, _>(Requires::none(), move |e, _| s.on_files(e))?;
        let s = Arc::clone(&service);
        bus.subscribe_event::<AppFailure, _>(Requires::none(), move |e, _| s.print(&e.msg, ConsoleColor::Red))?;
        let s = Arc::clone(&service);
        bus.subscribe_event::<FileDataProcessed, _>(Requires::none(), move |e, _| s.on_file_data(e))?;
        let s = Arc::clone(&service);
        bus.subscribe_event::<TranscodingProgress, _>(Requires::none(), move |e, _| {
            s.on_progress(e);
            Ok(())
        })?;
        let s = Arc::clone(&service);
        bus.subscribe_event::<TranscodingCompleted, _>(Requires::none(), move |e, _| s.on_completed(e))?;

        Ok(service)
    }

    fn state(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn print(&self, msg: &str, color: ConsoleColor) -> anyhow::Result<()> {
        self.term.write_line(&color_style(color).apply_to(msg).to_string())?;
        Ok(())
    }

    fn on_files(&self, event: &FilesToTranscode) -> anyhow::Result<()> {
        let panel = render_panel("Files:", &file_list_lines(&event.files), &Style::new().red().bright());
        self.term.write_line(&panel)?;
        Ok(())
    }

    fn on_file_data(&self, event: &FileDataProcessed) -> anyhow::Result<()> {
        let title = event
            .input_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let panel = render_panel(&title, &parameter_lines(event), &Style::new().blue().bright());
        self.term.write_line(&panel)?;
        self.state().current = Some(title);
        Ok(())
    }

    fn on_progress(&self, event: &TranscodingProgress) {
        let mut state = self.state();
        let bar = state.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(100);
            if let Ok(bar_style) = ProgressStyle::default_bar().template(styling::PROGRESS_TEMPLATE) {
                bar.set_style(bar_style.progress_chars(styling::PROGRESS_CHARS));
            }
            bar.enable_steady_tick(Duration::from_millis(250));
            bar
        });
        let position = event.percent.clamp(0.0, 100.0) as u64;
        // ffmpeg occasionally reports a time behind the last one
        if position >= bar.position() {
            bar.set_position(position);
        }
    }

    fn on_completed(&self, event: &TranscodingCompleted) -> anyhow::Result<()> {
        let mut state = self.state();
        if let Some(bar) = state.bar.take() {
            if event.ok {
                bar.finish();
            } else {
                bar.abandon();
            }
        }
        let label = if event.ok {
            style(styling::DONE_LABEL).green().bold()
        } else {
            style(styling::WARNING_LABEL).yellow().bold()
        };
        self.term.write_line(&format!("{label} {}", event.msg))?;
        if let Some(name) = state.current.take() {
            log::debug!("Finished {}", name);
        }
        Ok(())
    }
}
