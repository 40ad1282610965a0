//! Headless bake driver: RON scenes in, EXR/HDR files and timing reports out.

pub mod config;
pub mod host;
pub mod report;

pub use config::{ConfigError, SceneFile};
pub use host::{CliHost, LoopScheduler};
pub use report::TimingReport;
