//! Pipeline services wired together through the message bus.
//!
//! - [`pipeline`] discovers pending files, probes them and requests transcodes
//! - [`transcoder`] handles [`RunTranscode`](crate::messages::RunTranscode)
//!
//! Both read the shared [`CoreConfig`](crate::CoreConfig) registered on the bus
//! under [`CONFIG_DEPENDENCY`].

pub mod pipeline;
pub mod transcoder;

pub use pipeline::{PipelineService, PipelineSummary};
pub use transcoder::TranscoderService;

/// Bus dependency name of the shared `CoreConfig`.
pub const CONFIG_DEPENDENCY: &str = "config";
