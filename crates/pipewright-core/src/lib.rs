//! Execution core of the Pipewright pipeline runner.
//!
//! This crate contains:
//! - Layered environments with hidden (secret) values
//! - Step trait, built-in steps and the step registry
//! - Pipeline assembly for builds and deploys
//! - Artifact records and the output/source fallback policy
//! - The container client trait and sequential step runner

pub mod artifact;
pub mod container;
pub mod environment;
pub mod error;
pub mod id;
pub mod options;
pub mod pipeline;
pub mod runner;
pub mod session;
pub mod step;

pub use artifact::{Artifact, ArtifactCollector};
pub use container::ContainerClient;
pub use environment::{EnvMap, Environment};
pub use error::{Error, Result};
pub use id::generate_docker_id;
pub use options::GlobalOptions;
pub use pipeline::{Pipeline, PipelineKind, RawPipeline};
pub use session::Session;
pub use step::{RawStep, Step, StepRegistry};
