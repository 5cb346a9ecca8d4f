//! KDL configuration parsing for Pipewright.
//!
//! This crate handles parsing of:
//! - Pipeline files (pipewright.kdl): container image and raw steps
//! - Agent configuration: path roots, base URL and mirrors

pub mod error;
pub mod pipeline;
pub mod system;

mod node;

pub use error::{ConfigError, ConfigResult};
pub use pipeline::{PipelineFile, parse_pipeline_file};
pub use system::{AgentConfig, parse_agent_config};
