// ============================================================================
// gymnast-cli/src/logging.rs
// ============================================================================
//
// LOGGING: env_logger Setup
//
// The level comes from --log-level. RUST_LOG, when present, is applied on top
// so individual modules can be turned up, e.g.
// RUST_LOG=gymnast_core::bus=trace.

use log::LevelFilter;

/// Initializes the global logger. Safe to call more than once.
pub fn init_logging(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_target(level >= LevelFilter::Debug);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
