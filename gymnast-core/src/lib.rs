//! Core library of the Gymnast batch video transcoder.
//!
//! The pipeline stages never call each other directly. They talk through an
//! in-process [`MessageBus`]: commands are handled synchronously by exactly one
//! handler and return a value, events are queued and fanned out in publish
//! order by a background worker.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use gymnast_core::bus::{MessageBus, Requires};
//! use gymnast_core::external::SidecarSpawner;
//! use gymnast_core::media::MediaInfoProbe;
//! use gymnast_core::messages::TranscodingCompleted;
//! use gymnast_core::services::{CONFIG_DEPENDENCY, PipelineService, TranscoderService};
//! use gymnast_core::CoreConfig;
//! use std::path::PathBuf;
//!
//! let config = CoreConfig::new(PathBuf::from("input"), PathBuf::from("output"));
//! config.validate().unwrap();
//!
//! let bus = MessageBus::with_config(config.bus.clone()).unwrap();
//! bus.set_dependency(CONFIG_DEPENDENCY, config.clone()).unwrap();
//! bus.subscribe_event::<TranscodingCompleted, _>(Requires::none(), |done, _| {
//!     println!("{}", done.msg);
//!     Ok(())
//! })
//! .unwrap();
//! TranscoderService::register(&bus, SidecarSpawner).unwrap();
//!
//! let summary = PipelineService::new(bus.clone(), MediaInfoProbe::default())
//!     .run(&config)
//!     .unwrap();
//! bus.shutdown();
//! println!("{} transcoded", summary.transcoded);
//! ```

pub mod bus;
pub mod config;
pub mod discovery;
pub mod error;
pub mod external;
pub mod media;
pub mod messages;
pub mod services;
pub mod utils;

// Re-exports for public API
pub use bus::{BusConfig, BusError, BusResult, MessageBus, Requires, SaturationPolicy};
pub use config::CoreConfig;
pub use discovery::{find_processable_files, pending_files, prepare_workspace};
pub use error::{CoreError, CoreResult};
pub use services::{PipelineService, PipelineSummary, TranscoderService};
pub use utils::{format_size, parse_ffmpeg_time};
